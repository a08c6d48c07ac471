//! SOCKS5 reply builder
//!
//! Constructs SOCKS5 reply messages.

use crate::error::{ParseError, ReplyReason};
use crate::socks::consts::*;
use crate::socks::types::{ensure_len, TargetAddr};
use bytes::{BufMut, Bytes, BytesMut};

/// A SOCKS5 reply
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply reason (REP)
    pub reason: ReplyReason,
    /// Bound address; `None` is sent as 0.0.0.0:0
    pub bound: Option<TargetAddr>,
}

impl Reply {
    /// Success reply carrying the local address of the outward connection
    pub fn success(bound: Option<TargetAddr>) -> Self {
        Reply {
            reason: ReplyReason::Succeeded,
            bound,
        }
    }

    /// Error reply with a zeroed bound address
    pub fn error(reason: ReplyReason) -> Self {
        Reply {
            reason,
            bound: None,
        }
    }

    /// Serialize the reply to wire format
    pub fn encode(&self) -> Bytes {
        let bound = self.bound.clone().unwrap_or_default();

        let mut buf = BytesMut::with_capacity(REQUEST_HEADER_LEN + 1 + 16 + 2);
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(self.reason.into());
        buf.put_u8(SOCKS5_RESERVED);
        bound.encode_into(&mut buf);
        buf.freeze()
    }
}

/// Build reply bytes for a bound address and reason
pub fn encode_reply(bound: Option<&TargetAddr>, reason: ReplyReason) -> Bytes {
    Reply {
        reason,
        bound: bound.cloned(),
    }
    .encode()
}

/// Parse a reply frame, as a client would receive it
pub fn parse_reply(frame: &[u8]) -> Result<Reply, ParseError> {
    ensure_len(frame, REQUEST_HEADER_LEN + 1)?;

    if frame[0] != SOCKS5_VERSION {
        return Err(ParseError::UnsupportedVersion(frame[0]));
    }
    let reason = ReplyReason::try_from(frame[1])?;
    let (bound, _end) = TargetAddr::decode(frame, REQUEST_HEADER_LEN)?;

    Ok(Reply {
        reason,
        bound: Some(bound),
    })
}
