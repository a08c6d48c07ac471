//! Relay orchestrator
//!
//! Runs both copy directions and the refresh hook of a [`ProxyHandler`]
//! under one relay scope, and reduces the two copy outcomes to a single
//! session result.

use crate::error::{ReplyReason, SocksError};
use crate::handler::{BoxReader, BoxWriter, ProxyHandler, StreamDyn};
use anyhow::anyhow;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Copy direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToRemote,
    RemoteToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToRemote => f.write_str("client to remote"),
            Direction::RemoteToClient => f.write_str("remote to client"),
        }
    }
}

/// Relay bytes between `client` and `remote` until both directions finish.
///
/// A relay scope is derived from `session_scope`; it is cancelled once both
/// copies have reported, which also stops the refresh task. The refresh
/// task is awaited before returning. If `shutdown` is already cancelled
/// when a copy task starts, that direction reports success without
/// copying. Any copy failure yields a `HostUnreachable` error.
///
/// The client's write half is handed back once the remote-to-client copy
/// has released it, so the caller can still answer the client. It is
/// `None` when the handler kept the writer beyond its copy call.
pub async fn relay<C>(
    handler: Arc<dyn ProxyHandler>,
    session_scope: &CancellationToken,
    shutdown: &CancellationToken,
    client: C,
    remote: Box<dyn StreamDyn>,
) -> (Result<(), SocksError>, Option<WriteHalf<C>>)
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let scope = session_scope.child_token();

    let (client_read, client_write) = tokio::io::split(client);
    let (remote_read, remote_write) = tokio::io::split(remote);
    let (returned_tx, mut returned_rx) = oneshot::channel();
    let client_write = ReturnOnDrop::new(client_write, returned_tx);

    let refresh = tokio::spawn({
        let handler = handler.clone();
        let scope = scope.clone();
        async move { handler.refresh(scope).await }
    });

    let upstream = spawn_copy(
        Direction::ClientToRemote,
        handler.clone(),
        scope.clone(),
        shutdown.clone(),
        Box::new(client_read),
        Box::new(remote_write),
    );
    let downstream = spawn_copy(
        Direction::RemoteToClient,
        handler,
        scope.clone(),
        shutdown.clone(),
        Box::new(remote_read),
        Box::new(client_write),
    );

    let (upstream, downstream) = tokio::join!(
        collect(Direction::ClientToRemote, upstream),
        collect(Direction::RemoteToClient, downstream)
    );

    scope.cancel();
    if let Err(e) = refresh.await {
        warn!("Refresh task failed: {}", e);
    }

    let client = returned_rx.try_recv().ok();
    if client.is_none() {
        debug!("Client writer was not released by the copy task");
    }
    (upstream.and(downstream), client)
}

/// Writer that sends its inner half back through a channel when dropped
struct ReturnOnDrop<W> {
    inner: Option<W>,
    back: Option<oneshot::Sender<W>>,
}

impl<W> ReturnOnDrop<W> {
    fn new(inner: W, back: oneshot::Sender<W>) -> Self {
        ReturnOnDrop {
            inner: Some(inner),
            back: Some(back),
        }
    }

    fn inner(&mut self) -> io::Result<Pin<&mut W>>
    where
        W: Unpin,
    {
        match self.inner.as_mut() {
            Some(inner) => Ok(Pin::new(inner)),
            None => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ReturnOnDrop<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().inner() {
            Ok(inner) => inner.poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().inner() {
            Ok(inner) => inner.poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().inner() {
            Ok(inner) => inner.poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl<W> Drop for ReturnOnDrop<W> {
    fn drop(&mut self) {
        if let (Some(inner), Some(back)) = (self.inner.take(), self.back.take()) {
            let _ = back.send(inner);
        }
    }
}

fn spawn_copy(
    direction: Direction,
    handler: Arc<dyn ProxyHandler>,
    scope: CancellationToken,
    shutdown: CancellationToken,
    reader: BoxReader,
    writer: BoxWriter,
) -> oneshot::Receiver<anyhow::Result<()>> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let result = if shutdown.is_cancelled() {
            debug!("Shutdown in progress, skipping {} copy", direction);
            // Release the halves before reporting
            drop((reader, writer));
            Ok(())
        } else {
            match direction {
                Direction::ClientToRemote => {
                    handler.copy_from_client_to_remote(scope, reader, writer).await
                }
                Direction::RemoteToClient => {
                    handler.copy_from_remote_to_client(scope, reader, writer).await
                }
            }
        };
        let _ = tx.send(result);
    });

    rx
}

async fn collect(
    direction: Direction,
    rx: oneshot::Receiver<anyhow::Result<()>>,
) -> Result<(), SocksError> {
    let result = match rx.await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("copy task ended without reporting")),
    };

    result.map_err(|e| {
        debug!("Copy from {} failed: {:#}", direction, e);
        SocksError::new(
            ReplyReason::HostUnreachable,
            e.context(format!("error on copy from {}", direction)),
        )
    })
}
