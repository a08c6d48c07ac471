//! SOCKS5 protocol engine
//!
//! Wire codec, handshake state machine, relay orchestrator and the
//! per-connection session driver. Dialing and byte copying are delegated
//! to a [`ProxyHandler`](crate::handler::ProxyHandler).

mod auth;
mod command;
mod consts;
mod handshake;
mod relay;
mod session;
mod types;

pub use auth::{method_selection, parse_header, select_method, AuthMethod, Header};
pub use command::{encode_reply, parse_reply, parse_request, Reply};
pub use consts::*;
pub use handshake::{send_error_reply, Handshake, State};
pub use relay::relay;
pub use session::Proxy;
pub use types::{AddressType, ProtocolVersion, Request, SocksCommand, TargetAddr};
