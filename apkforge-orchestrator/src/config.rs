//! Orchestrator configuration
//!
//! Server-level settings on top of the shared [`BuilderConfig`].

use anyhow::Context;
use apkforge_runner::BuilderConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::service::progress_stream::DEFAULT_POLL_INTERVAL;

const DEFAULT_PORT: u16 = 9741;
const DEFAULT_MAX_UPLOAD_MB: usize = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,

    /// Delay between registry polls of a progress stream
    pub poll_interval: Duration,

    /// Request body limit for submissions, in bytes
    pub max_upload_bytes: usize,

    /// Static web UI served for unmatched routes
    pub web_dir: Option<PathBuf>,

    pub builder: BuilderConfig,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// Environment variables:
    /// - APKFORGE_BIND_ADDR (optional, default: 0.0.0.0:9741)
    /// - APKFORGE_POLL_INTERVAL_MS (optional, default: 500)
    /// - APKFORGE_MAX_UPLOAD_MB (optional, default: 100)
    /// - APKFORGE_WEB_DIR (optional)
    ///
    /// plus everything [`BuilderConfig::from_env`] reads.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::with_builder(BuilderConfig::from_lookup(&lookup)?);

        if let Some(addr) = lookup("APKFORGE_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("Invalid APKFORGE_BIND_ADDR: {}", addr))?;
        }

        if let Some(value) = lookup("APKFORGE_POLL_INTERVAL_MS") {
            let millis: u64 = value
                .parse()
                .with_context(|| format!("Invalid APKFORGE_POLL_INTERVAL_MS: {}", value))?;
            config.poll_interval = Duration::from_millis(millis);
        }

        if let Some(value) = lookup("APKFORGE_MAX_UPLOAD_MB") {
            let megabytes: usize = value
                .parse()
                .with_context(|| format!("Invalid APKFORGE_MAX_UPLOAD_MB: {}", value))?;
            config.max_upload_bytes = megabytes.saturating_mul(1024 * 1024);
        }

        config.web_dir = lookup("APKFORGE_WEB_DIR").map(PathBuf::from);

        Ok(config)
    }

    /// Config for a given builder with default server settings
    pub fn with_builder(builder: BuilderConfig) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            web_dir: None,
            builder,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll interval must be greater than 0");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("upload limit must be greater than 0");
        }

        if let Some(dir) = &self.web_dir {
            if !dir.is_dir() {
                anyhow::bail!("web directory {} does not exist", dir.display());
            }
        }

        self.builder.validate()
    }
}
