//! SOCKS5 request parser
//!
//! Parses SOCKS5 request frames received from the client.

use crate::error::{ParseError, SocksError};
use crate::socks::consts::*;
use crate::socks::types::{ensure_len, ProtocolVersion, Request, SocksCommand, TargetAddr};

/// Parse a SOCKS5 request frame
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// A truncated frame fails with `GeneralFailure`; an unknown command or
/// address type fails with `CommandNotSupported`.
pub fn parse_request(frame: &[u8]) -> Result<Request, SocksError> {
    let (request, _) = parse_request_prefix(frame)?;
    Ok(request)
}

/// Parse the request at the start of `frame`, also returning its length
pub(crate) fn parse_request_prefix(frame: &[u8]) -> Result<(Request, usize), SocksError> {
    Ok(decode_request(frame)?)
}

fn decode_request(frame: &[u8]) -> Result<(Request, usize), ParseError> {
    ensure_len(frame, REQUEST_HEADER_LEN + 1)?;

    let version = frame[0];
    let cmd_byte = frame[1];
    let _reserved = frame[2];

    if version != SOCKS5_VERSION {
        return Err(ParseError::UnsupportedVersion(version));
    }

    let command = SocksCommand::from_byte(cmd_byte).ok_or(ParseError::UnknownCommand(cmd_byte))?;
    let (destination, end) = TargetAddr::decode(frame, REQUEST_HEADER_LEN)?;

    let request = Request {
        version: ProtocolVersion::V5,
        command,
        destination,
    };
    Ok((request, end))
}
