//! SOCKS5 command parsing module
//!
//! Handles parsing SOCKS5 requests and building replies.

mod parser;
mod reply;

pub use parser::parse_request;
pub(crate) use parser::parse_request_prefix;
pub use reply::{encode_reply, parse_reply, Reply};
