//! # Sockrelay - SOCKS5 Relay Engine
//!
//! Sockrelay terminates inbound SOCKS5 client connections, performs the
//! RFC 1928 handshake, obtains an outward connection through a pluggable
//! [`ProxyHandler`] and relays bytes in both directions until either side
//! closes.
//!
//! ## Features
//!
//! - **No-auth SOCKS5**: greeting, method negotiation, CONNECT requests
//!   with IPv4, IPv6 and domain destinations
//! - **Timeout-bounded I/O**: every handshake read and write has a deadline
//!   and a timed-out attempt is aborted
//! - **Pluggable collaborators**: dialing, copying, refresh and cleanup are
//!   provided by a [`ProxyHandler`] implementation
//! - **Scoped cancellation**: one shutdown token drives every session and
//!   relay scope
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sockrelay::config::load_config;
//! use sockrelay::server::run_server;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let shutdown = CancellationToken::new();
//!
//!     run_server(&config.server, shutdown).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Server -> Proxy session -> ProxyHandler -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod handler;
pub mod helper;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config, ServerConfig};
pub use error::{ParseError, ReplyReason, SocksError};
pub use handler::{DirectHandler, Outbound, ProxyHandler};
pub use server::{run_server, Server};
pub use socks::Proxy;

/// Version of the Sockrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
