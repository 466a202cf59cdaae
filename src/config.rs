//! Server configuration.
//!
//! Every option can be given as a command-line flag or through an
//! `EVENTKV_*` environment variable; the flag wins when both are set.

use crate::connection::DEFAULT_MAX_FRAME_SIZE;
use crate::storage::DEFAULT_SWEEP_INTERVAL;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("maximum frame size must be greater than zero")]
    ZeroMaxFrame,

    #[error("host must not be empty")]
    EmptyHost,
}

/// EventKV - an event-driven in-memory key-value server
#[derive(Debug, Clone, Parser)]
#[command(name = "eventkv", version, about)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "EVENTKV_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "EVENTKV_PORT", default_value_t = 6379)]
    pub port: u16,

    /// Milliseconds between expiration sweeps
    #[arg(long, env = "EVENTKV_SWEEP_INTERVAL_MS", default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Longest accepted protocol line, in bytes
    #[arg(long, env = "EVENTKV_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_bytes: usize,

    /// Log filter directive (RUST_LOG takes precedence when set)
    #[arg(long, env = "EVENTKV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the bind address as `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroMaxFrame);
        }
        Ok(())
    }
}
