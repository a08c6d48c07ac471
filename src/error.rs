//! Error types for Sockrelay
//!
//! Every failure inside a session is converted, where it is discovered,
//! into a [`SocksError`]: a reply reason for the client plus a cause for
//! the logs.

use std::fmt;
use std::io;
use thiserror::Error;

/// Reply reasons carried in the REP field of a SOCKS5 reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReplyReason {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
    /// No acceptable authentication method was offered.
    ///
    /// Not part of RFC 1928's REP table; shares its value with the
    /// "no acceptable methods" method selection byte.
    MethodNotSupported = 0xFF,
}

impl ReplyReason {
    /// Human readable description, as used in logs
    pub fn description(self) -> &'static str {
        match self {
            ReplyReason::Succeeded => "succeeded",
            ReplyReason::GeneralFailure => "general SOCKS server failure",
            ReplyReason::ConnectionNotAllowed => "connection not allowed by ruleset",
            ReplyReason::NetworkUnreachable => "network unreachable",
            ReplyReason::HostUnreachable => "host unreachable",
            ReplyReason::ConnectionRefused => "connection refused",
            ReplyReason::TtlExpired => "TTL expired",
            ReplyReason::CommandNotSupported => "command not supported",
            ReplyReason::AddressTypeNotSupported => "address type not supported",
            ReplyReason::MethodNotSupported => "no acceptable authentication method",
        }
    }
}

impl fmt::Display for ReplyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<ReplyReason> for u8 {
    fn from(reason: ReplyReason) -> Self {
        reason as u8
    }
}

impl TryFrom<u8> for ReplyReason {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReplyReason::Succeeded),
            0x01 => Ok(ReplyReason::GeneralFailure),
            0x02 => Ok(ReplyReason::ConnectionNotAllowed),
            0x03 => Ok(ReplyReason::NetworkUnreachable),
            0x04 => Ok(ReplyReason::HostUnreachable),
            0x05 => Ok(ReplyReason::ConnectionRefused),
            0x06 => Ok(ReplyReason::TtlExpired),
            0x07 => Ok(ReplyReason::CommandNotSupported),
            0x08 => Ok(ReplyReason::AddressTypeNotSupported),
            0xFF => Ok(ReplyReason::MethodNotSupported),
            other => Err(ParseError::UnknownReplyReason(other)),
        }
    }
}

impl From<&io::Error> for ReplyReason {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ReplyReason::ConnectionRefused,
            io::ErrorKind::TimedOut => ReplyReason::HostUnreachable,
            io::ErrorKind::AddrNotAvailable => ReplyReason::HostUnreachable,
            io::ErrorKind::PermissionDenied => ReplyReason::ConnectionNotAllowed,
            io::ErrorKind::HostUnreachable => ReplyReason::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => ReplyReason::NetworkUnreachable,
            _ => ReplyReason::GeneralFailure,
        }
    }
}

/// Malformed or unsupported wire bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame ended before all announced fields were present
    #[error("frame truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum length the frame needed
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// Version byte is not SOCKS5
    #[error("unsupported SOCKS version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Unknown command byte
    #[error("unknown command: {0:#04x}")]
    UnknownCommand(u8),

    /// Unknown address type byte
    #[error("unknown address type: {0:#04x}")]
    UnknownAddressType(u8),

    /// Domain name is empty or not valid UTF-8
    #[error("invalid domain name")]
    InvalidDomain,

    /// Reply byte outside the known reason table
    #[error("unknown reply reason: {0:#04x}")]
    UnknownReplyReason(u8),
}

impl ParseError {
    /// Reply reason reported to the client for this parse failure
    pub fn reason(&self) -> ReplyReason {
        match self {
            ParseError::Truncated { .. } => ReplyReason::GeneralFailure,
            ParseError::UnsupportedVersion(_) => ReplyReason::CommandNotSupported,
            ParseError::UnknownCommand(_) => ReplyReason::CommandNotSupported,
            ParseError::UnknownAddressType(_) => ReplyReason::CommandNotSupported,
            ParseError::InvalidDomain => ReplyReason::GeneralFailure,
            ParseError::UnknownReplyReason(_) => ReplyReason::GeneralFailure,
        }
    }
}

/// Session failure: the reason sent to the client and the underlying cause
#[derive(Error, Debug)]
#[error("{reason}: {cause:#}")]
pub struct SocksError {
    reason: ReplyReason,
    cause: anyhow::Error,
}

impl SocksError {
    /// Create a new error from a reason and a cause
    pub fn new(reason: ReplyReason, cause: impl Into<anyhow::Error>) -> Self {
        SocksError {
            reason,
            cause: cause.into(),
        }
    }

    /// Create a new error with a plain message as cause
    pub fn msg<M>(reason: ReplyReason, message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        SocksError {
            reason,
            cause: anyhow::Error::msg(message),
        }
    }

    /// Reply reason sent to the client
    pub fn reason(&self) -> ReplyReason {
        self.reason
    }

    /// Underlying cause
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Split into reason and cause
    pub fn into_parts(self) -> (ReplyReason, anyhow::Error) {
        (self.reason, self.cause)
    }
}

impl From<ParseError> for SocksError {
    fn from(err: ParseError) -> Self {
        SocksError::new(err.reason(), err)
    }
}
