//! Server configuration types
//!
//! Defines the main configuration structures for the relay server.

use super::TcpConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

/// Default per-call read/write timeout in seconds
fn default_io_timeout() -> u64 {
    10
}

/// Default outward connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

/// Default refresh hook period in seconds
fn default_refresh_interval() -> u64 {
    30
}

fn default_buffer_size() -> usize {
    crate::helper::DEFAULT_BUFFER_SIZE
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Relay server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to (e.g., "127.0.0.1:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Timeout in seconds for each handshake read or write
    #[serde(default = "default_io_timeout")]
    pub io_timeout: u64,

    /// Timeout in seconds for dialing the destination
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Period in seconds of the session refresh hook
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Buffer size used when copying relay data
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// TCP socket options
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            io_timeout: default_io_timeout(),
            connect_timeout: default_connect_timeout(),
            refresh_interval: default_refresh_interval(),
            buffer_size: default_buffer_size(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Per-call read/write timeout
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout)
    }

    /// Outward connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Refresh hook period
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid listen address: {}", self.listen_addr));
        }
        if self.io_timeout == 0 {
            return Err("io_timeout must be greater than zero".to_string());
        }
        if self.connect_timeout == 0 {
            return Err("connect_timeout must be greater than zero".to_string());
        }
        if self.refresh_interval == 0 {
            return Err("refresh_interval must be greater than zero".to_string());
        }
        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than zero".to_string());
        }
        Ok(())
    }
}
