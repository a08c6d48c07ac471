//! SOCKS5 handshake and request state machine
//!
//! Drives one inbound connection from the first greeting byte up to the
//! success reply. The states only ever move forward and the first failure
//! is terminal.

use super::auth::{method_selection, parse_header, select_method, AuthMethod, Header};
use super::command::{parse_request_prefix, Reply};
use super::types::{ProtocolVersion, Request};
use crate::error::{ReplyReason, SocksError};
use crate::helper::{read_all, write_all};
use anyhow::Context;
use bytes::BytesMut;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

/// Session progress, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Nothing read yet
    Start,
    /// A SOCKS5 greeting was read and parsed
    GreetingRead,
    /// "No authentication required" was selected and acknowledged
    MethodSelected,
    /// The connection request was read and parsed
    RequestRead,
    /// The request was handed to the dial collaborator
    AwaitingDial,
    /// The success reply was written
    ReplySent,
    /// Bytes are being relayed
    Relaying,
    /// Both connections are closed
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Start => "start",
            State::GreetingRead => "greeting-read",
            State::MethodSelected => "method-selected",
            State::RequestRead => "request-read",
            State::AwaitingDial => "awaiting-dial",
            State::ReplySent => "reply-sent",
            State::Relaying => "relaying",
            State::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Handshake over a borrowed client connection
///
/// Every read and write is bounded by the per-call `timeout`.
pub struct Handshake<'a, S: ?Sized> {
    conn: &'a mut S,
    timeout: Duration,
    state: State,
    /// Bytes received after the greeting in the same frame
    pending: BytesMut,
}

impl<'a, S> Handshake<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    /// Start a handshake on `conn`
    pub fn new(conn: &'a mut S, timeout: Duration) -> Self {
        Handshake {
            conn,
            timeout,
            state: State::Start,
            pending: BytesMut::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    fn advance(&mut self, next: State) {
        debug_assert!(next > self.state, "{} -> {}", self.state, next);
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run greeting, method negotiation and request parsing
    pub async fn negotiate(&mut self) -> Result<Request, SocksError> {
        let header = self.read_greeting().await?;
        self.select_method(&header).await?;
        self.read_request().await
    }

    /// Read and validate the client greeting
    pub async fn read_greeting(&mut self) -> Result<Header, SocksError> {
        let mut frame = read_all(&mut *self.conn, self.timeout)
            .await
            .context("Failed to read greeting")
            .map_err(|e| SocksError::new(ReplyReason::ConnectionRefused, e))?;

        let header = parse_header(&frame).map_err(|e| {
            SocksError::new(
                ReplyReason::ConnectionRefused,
                anyhow::Error::new(e).context("Failed to parse greeting"),
            )
        })?;

        match ProtocolVersion::from_byte(header.version) {
            Some(ProtocolVersion::V5) => {}
            Some(ProtocolVersion::V4) => {
                return Err(SocksError::msg(
                    ReplyReason::CommandNotSupported,
                    "socks4 not yet implemented",
                ))
            }
            None => {
                return Err(SocksError::msg(
                    ReplyReason::CommandNotSupported,
                    format!("version {:#04x} not yet implemented", header.version),
                ))
            }
        }

        let consumed = header.encoded_len();
        if frame.len() > consumed {
            trace!("Keeping {} bytes sent after the greeting", frame.len() - consumed);
            self.pending = frame.split_off(consumed);
        }

        self.advance(State::GreetingRead);
        Ok(header)
    }

    /// Select "no authentication required" and acknowledge it
    pub async fn select_method(&mut self, header: &Header) -> Result<AuthMethod, SocksError> {
        let method = select_method(header).ok_or_else(|| {
            SocksError::msg(
                ReplyReason::MethodNotSupported,
                format!("no acceptable method in {:?}", header.methods),
            )
        })?;

        write_all(&mut *self.conn, &method_selection(method), self.timeout)
            .await
            .context("Failed to send method selection")
            .map_err(|e| SocksError::new(ReplyReason::GeneralFailure, e))?;

        self.advance(State::MethodSelected);
        Ok(method)
    }

    /// Read and parse the connection request
    pub async fn read_request(&mut self) -> Result<Request, SocksError> {
        let frame = if self.pending.is_empty() {
            read_all(&mut *self.conn, self.timeout)
                .await
                .context("Failed to read request")
                .map_err(|e| SocksError::new(ReplyReason::GeneralFailure, e))?
        } else {
            std::mem::take(&mut self.pending)
        };

        let (request, consumed) = parse_request_prefix(&frame)?;
        if frame.len() > consumed {
            trace!("Dropping {} bytes sent after the request", frame.len() - consumed);
        }
        debug!(
            "Request {} to {} ({:?})",
            request.command,
            request.destination,
            request.address_type()
        );

        self.advance(State::RequestRead);
        Ok(request)
    }

    /// Mark the request as handed to the dial collaborator
    pub fn begin_dial(&mut self) {
        self.advance(State::AwaitingDial);
    }

    /// Write the success reply carrying the outward local address
    pub async fn send_success(&mut self, bound: Option<SocketAddr>) -> Result<(), SocksError> {
        let reply = Reply::success(bound.map(Into::into)).encode();

        write_all(&mut *self.conn, &reply, self.timeout)
            .await
            .context("Failed to send success reply")
            .map_err(|e| SocksError::new(ReplyReason::GeneralFailure, e))?;

        self.advance(State::ReplySent);
        Ok(())
    }
}

/// Write a single error reply with a zeroed bound address
pub async fn send_error_reply<S>(
    conn: &mut S,
    reason: ReplyReason,
    timeout: Duration,
) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    write_all(conn, &Reply::error(reason).encode(), timeout).await
}
