//! Session entry point
//!
//! One [`Proxy::handle`] call per accepted connection: handshake, dial,
//! success reply, relay, then teardown.

use super::handshake::{send_error_reply, Handshake, State};
use super::relay::relay;
use crate::config::ServerConfig;
use crate::error::SocksError;
use crate::handler::{Outbound, ProxyHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// SOCKS5 session driver shared by all connections of a listener
#[derive(Debug, Clone)]
pub struct Proxy {
    handler: Arc<dyn ProxyHandler>,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl Proxy {
    /// Create a proxy with a per-I/O-call timeout and a shutdown token
    pub fn new(
        handler: Arc<dyn ProxyHandler>,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Proxy {
            handler,
            timeout,
            shutdown,
        }
    }

    /// Create a proxy using the timeout from server configuration
    pub fn from_config(
        config: &ServerConfig,
        handler: Arc<dyn ProxyHandler>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::new(handler, config.io_timeout(), shutdown)
    }

    /// Serve one client connection to completion.
    ///
    /// A failed handshake, dial or relay is answered with one best-effort
    /// error reply. The handler's cleanup hook runs on every path and the
    /// client connection is closed on return.
    pub async fn handle<S>(&self, mut conn: S) -> Result<(), SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let scope = self.shutdown.child_token();
        let _guard = scope.clone().drop_guard();
        debug!("Session started");

        let result = match self.establish(&mut conn).await {
            Ok(outbound) => {
                debug!("Session state -> {}", State::Relaying);
                let (result, client) = relay(
                    self.handler.clone(),
                    &scope,
                    &self.shutdown,
                    conn,
                    outbound.stream,
                )
                .await;
                if let (Err(e), Some(mut client)) = (&result, client) {
                    self.reply_error(&mut client, e).await;
                }
                result
            }
            Err(e) => {
                self.reply_error(&mut conn, &e).await;
                Err(e)
            }
        };

        if let Err(e) = self.handler.cleanup().await {
            error!("Session cleanup failed: {:#}", e);
        }

        match &result {
            Ok(()) => debug!("Session state -> {}", State::Closed),
            Err(e) => error!("Session failed: {}", e),
        }
        result
    }

    async fn establish<S>(&self, conn: &mut S) -> Result<Outbound, SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    {
        let mut handshake = Handshake::new(conn, self.timeout);
        let request = handshake.negotiate().await?;

        info!("Connecting to {}", request.destination_string());
        handshake.begin_dial();
        let outbound = self.handler.pre_handler(&request).await?;

        handshake.send_success(outbound.local_addr).await?;
        Ok(outbound)
    }

    async fn reply_error<W>(&self, conn: &mut W, err: &SocksError)
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if let Err(reply_err) = send_error_reply(conn, err.reason(), self.timeout).await {
            warn!("Failed to send error reply ({}): {}", err.reason(), reply_err);
        }
        if let Err(shutdown_err) = conn.shutdown().await {
            debug!("Failed to shut down client connection: {}", shutdown_err);
        }
    }
}
