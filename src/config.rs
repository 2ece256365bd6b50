//! Server configuration.
//!
//! Configuration is read from a YAML document whose path is given by the
//! `LUMEN_CONFIG` environment variable. Every section is optional; missing
//! values fall back to the defaults below. `LISTEN` and `DOC_ROOT` override
//! the corresponding file values.
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//!   doc_root: "/srv/www"
//! pool:
//!   workers: 8
//!   max_requests: 10000
//! timer:
//!   tick_secs: 5
//!   idle_timeout_secs: 15
//! log:
//!   level: info
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "LUMEN_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub timer: TimerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listening socket binds to
    pub listen_addr: String,
    /// Directory every request target is resolved against
    pub doc_root: PathBuf,
    /// Live connections above this count are dropped on accept
    pub max_connections: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Capacity of the task queue
    pub max_requests: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Interval between two idle-timer sweeps
    pub tick_secs: u64,
    /// Idle time after which a connection is closed
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            doc_root: PathBuf::from("./root"),
            max_connections: 65536,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_requests: 10000,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 5,
            idle_timeout_secs: 15,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TimerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl LogConfig {
    /// Parses the configured level name (`trace`, `debug`, `info`, `warn`, `error`).
    pub fn max_level(&self) -> Result<tracing::Level> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| anyhow::anyhow!("invalid log level {:?}", self.level))
    }
}

impl Config {
    /// Loads the configuration from `LUMEN_CONFIG` (if set) and applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Self::from_yaml_str(&text)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        cfg.apply_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a YAML document. An empty document yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("invalid configuration document")
    }

    /// Applies `LISTEN` and `DOC_ROOT` overrides obtained through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("LISTEN") {
            self.server.listen_addr = addr;
        }
        if let Some(root) = lookup("DOC_ROOT") {
            self.server.doc_root = PathBuf::from(root);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.workers == 0 {
            bail!("pool.workers must be >= 1");
        }
        if self.pool.max_requests == 0 {
            bail!("pool.max_requests must be >= 1");
        }
        if self.timer.tick_secs == 0 {
            bail!("timer.tick_secs must be > 0");
        }
        if self.timer.idle_timeout_secs == 0 {
            bail!("timer.idle_timeout_secs must be > 0");
        }
        if self.server.max_connections == 0 {
            bail!("server.max_connections must be >= 1");
        }
        self.log.max_level()?;
        Ok(())
    }
}
