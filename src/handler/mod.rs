//! Proxy handler module for Sockrelay
//!
//! The SOCKS engine does not dial destinations or move relay bytes by
//! itself. Those capabilities are injected through the [`ProxyHandler`]
//! trait, so policies such as traffic shaping, auditing or connection
//! pooling can be added without touching the protocol engine.
//!
//! [`DirectHandler`] is the default implementation: it dials the
//! destination directly and copies bytes as they arrive.

mod direct;

pub use direct::DirectHandler;

use crate::error::SocksError;
use crate::socks::Request;
use anyhow::Result;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A dynamic stream trait for outward connections.
///
/// It allows handlers to return any stream type (TCP, TLS, in-memory,
/// etc.) without the engine being generic over the transport.
pub trait StreamDyn: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

/// Blanket implementation: any type implementing the required traits is a StreamDyn.
impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> StreamDyn for T {}

/// Read half handed to a copy strategy
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Write half handed to a copy strategy
pub type BoxWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// An established outward connection
#[derive(Debug)]
pub struct Outbound {
    /// The connection itself
    pub stream: Box<dyn StreamDyn>,
    /// Local address of the connection, reported in the success reply
    pub local_addr: Option<SocketAddr>,
}

impl Outbound {
    /// Wrap a stream and its local address
    pub fn new<S: StreamDyn + 'static>(stream: S, local_addr: Option<SocketAddr>) -> Self {
        Outbound {
            stream: Box::new(stream),
            local_addr,
        }
    }
}

/// Capabilities the SOCKS engine depends on but does not implement.
///
/// Only [`pre_handler`](ProxyHandler::pre_handler) is required. The
/// default copy methods relay bytes with [`copy_until_cancelled`], the
/// default refresh idles until its scope is cancelled and the default
/// cleanup does nothing.
///
/// # Example
///
/// ```rust,ignore
/// use sockrelay::handler::{Outbound, ProxyHandler};
///
/// #[derive(Debug)]
/// struct Loopback;
///
/// #[async_trait::async_trait]
/// impl ProxyHandler for Loopback {
///     async fn pre_handler(&self, request: &Request) -> Result<Outbound, SocksError> {
///         let stream = TcpStream::connect("127.0.0.1:8080").await
///             .map_err(|e| SocksError::new(ReplyReason::from(&e), e))?;
///         let local = stream.local_addr().ok();
///         Ok(Outbound::new(stream, local))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ProxyHandler: Send + Sync + Debug {
    /// Produce a live outward connection for a parsed request.
    ///
    /// The reason of a returned error is sent to the client as is.
    async fn pre_handler(&self, request: &Request) -> Result<Outbound, SocksError>;

    /// Called exactly once per session at teardown, whether the session
    /// succeeded or not. Errors are logged and never reach the client.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Periodic keep-alive work for the lifetime of `scope`.
    ///
    /// Must return promptly once `scope` is cancelled.
    async fn refresh(&self, scope: CancellationToken) {
        scope.cancelled().await;
    }

    /// Relay bytes from the client to the outward connection
    async fn copy_from_client_to_remote(
        &self,
        scope: CancellationToken,
        mut client: BoxReader,
        mut remote: BoxWriter,
    ) -> Result<()> {
        copy_until_cancelled(&scope, &mut client, &mut remote, crate::helper::DEFAULT_BUFFER_SIZE)
            .await?;
        Ok(())
    }

    /// Relay bytes from the outward connection to the client
    async fn copy_from_remote_to_client(
        &self,
        scope: CancellationToken,
        mut remote: BoxReader,
        mut client: BoxWriter,
    ) -> Result<()> {
        copy_until_cancelled(&scope, &mut remote, &mut client, crate::helper::DEFAULT_BUFFER_SIZE)
            .await?;
        Ok(())
    }
}

/// Copy from `reader` to `writer` until end of stream or cancellation.
///
/// On end of stream the writer is shut down so the peer sees the half
/// close. Cancellation stops the copy without an error. Returns the
/// number of bytes copied.
pub async fn copy_until_cancelled<R, W>(
    scope: &CancellationToken,
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    let mut copied = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = scope.cancelled() => return Ok(copied),
            n = reader.read(&mut buf) => n?,
        };
        if n == 0 {
            break;
        }

        tokio::select! {
            biased;
            _ = scope.cancelled() => return Ok(copied),
            written = writer.write_all(&buf[..n]) => written?,
        }
        copied += n as u64;
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown after copy failed: {}", e);
    }

    Ok(copied)
}
