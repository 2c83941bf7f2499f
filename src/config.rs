//! Runtime configuration.
//!
//! Values come from an optional YAML file named by `HTTPWIRE_CONFIG`; the
//! `PORT` environment variable overrides the port.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "HTTPWIRE_CONFIG";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on, all interfaces
    pub port: u16,
    /// Base URL the `/httpbin/` route forwards to (plain http only)
    pub upstream: String,
    /// File served by the `/video` route
    pub video_path: String,
    pub upstream_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 42069,
            upstream: "http://httpbin.org".to_string(),
            video_path: "assets/vim.mp4".to_string(),
            upstream_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Self::from_yaml(&raw).with_context(|| format!("invalid config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            cfg.port = port
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port:?}"))?;
        }

        Ok(cfg)
    }

    /// Parses a YAML document; missing keys take their default.
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
