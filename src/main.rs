use lumen::config::Config;
use lumen::server::Server;

fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log.max_level()?)
        .init();

    let mut server = Server::bind(&cfg)?;
    server.install_signal_handlers()?;
    server.run()?;

    tracing::info!("Shutdown complete");
    Ok(())
}
