use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use lumen::config::{CONFIG_ENV, Config};

#[test]
fn test_config_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.doc_root, PathBuf::from("./root"));
    assert_eq!(cfg.server.max_connections, 65536);
    assert_eq!(cfg.pool.workers, 8);
    assert_eq!(cfg.pool.max_requests, 10000);
    assert_eq!(cfg.timer.tick(), Duration::from_secs(5));
    assert_eq!(cfg.timer.idle_timeout(), Duration::from_secs(15));
    assert_eq!(cfg.log.max_level().unwrap(), tracing::Level::INFO);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_empty_document_is_default() {
    let cfg = Config::from_yaml_str("  \n").unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_partial_document() {
    let yaml = r#"
server:
  doc_root: "/srv/www"
pool:
  workers: 2
timer:
  idle_timeout_secs: 30
log:
  level: debug
"#;
    let cfg = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(cfg.server.doc_root, PathBuf::from("/srv/www"));
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.pool.workers, 2);
    assert_eq!(cfg.pool.max_requests, 10000);
    assert_eq!(cfg.timer.tick_secs, 5);
    assert_eq!(cfg.timer.idle_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.log.max_level().unwrap(), tracing::Level::DEBUG);
}

#[test]
fn test_config_invalid_document() {
    assert!(Config::from_yaml_str("pool:\n  workers: many\n").is_err());
}

#[test]
fn test_config_overrides() {
    let env: HashMap<&str, &str> = [("LISTEN", "0.0.0.0:3000"), ("DOC_ROOT", "/var/www")].into();
    let mut cfg = Config::default();
    cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.server.doc_root, PathBuf::from("/var/www"));
}

#[test]
fn test_config_no_overrides() {
    let mut cfg = Config::default();
    cfg.apply_overrides(|_| None);
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_validate_rejects_zero_sizes() {
    let mut cfg = Config::default();
    cfg.pool.workers = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.pool.max_requests = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.timer.tick_secs = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.timer.idle_timeout_secs = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_validate_rejects_unknown_level() {
    let mut cfg = Config::default();
    cfg.log.level = "loud".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_load_from_file_and_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  listen_addr: \"127.0.0.1:9000\"\npool:\n  workers: 3").unwrap();

    unsafe {
        std::env::set_var(CONFIG_ENV, file.path());
        std::env::set_var("DOC_ROOT", "/tmp/site");
        std::env::remove_var("LISTEN");
    }
    let cfg = Config::load();
    unsafe {
        std::env::remove_var(CONFIG_ENV);
        std::env::remove_var("DOC_ROOT");
    }

    let cfg = cfg.unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.server.doc_root, PathBuf::from("/tmp/site"));
    assert_eq!(cfg.pool.workers, 3);
}
