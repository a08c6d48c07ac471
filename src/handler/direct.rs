//! Direct dial handler
//!
//! Connects straight to the requested destination and relays bytes
//! without any shaping or inspection.

use super::{copy_until_cancelled, BoxReader, BoxWriter, Outbound, ProxyHandler};
use crate::config::ServerConfig;
use crate::error::{ReplyReason, SocksError};
use crate::helper::DEFAULT_BUFFER_SIZE;
use crate::socks::{Request, SocksCommand};
use crate::transport::SocketOpts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default handler: direct TCP dial and plain bidirectional copy
#[derive(Debug, Clone)]
pub struct DirectHandler {
    /// Socket options to apply to outward connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
    /// Period of the refresh hook
    refresh_interval: Duration,
    /// Copy buffer size
    buffer_size: usize,
}

impl Default for DirectHandler {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DirectHandler {
    /// Create a new direct handler with default options
    pub fn with_defaults() -> Self {
        DirectHandler {
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(30),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Create a direct handler from server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        DirectHandler {
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
            connect_timeout: config.connect_timeout(),
            refresh_interval: config.refresh_interval(),
            buffer_size: config.buffer_size,
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set refresh period
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    async fn dial(&self, request: &Request) -> Result<TcpStream, SocksError> {
        let addrs = request.destination.resolve_all().await.map_err(|e| {
            SocksError::new(
                ReplyReason::HostUnreachable,
                anyhow::Error::new(e)
                    .context(format!("Failed to resolve address: {}", request.destination)),
            )
        })?;

        let mut last_error = None;
        for addr in addrs {
            debug!("Connecting to target: {}", addr);
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    warn!("Failed to connect to {}: {}", addr, e);
                    let reason = ReplyReason::from(&e);
                    last_error = Some(SocksError::new(
                        reason,
                        anyhow::Error::new(e).context(format!("Failed to connect to {}", addr)),
                    ));
                }
                Err(_) => {
                    warn!("Connection timeout to {}", addr);
                    last_error = Some(SocksError::msg(
                        ReplyReason::HostUnreachable,
                        format!("Connection timeout to {}", addr),
                    ));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SocksError::msg(ReplyReason::HostUnreachable, "No addresses resolved")
        }))
    }
}

#[async_trait]
impl ProxyHandler for DirectHandler {
    async fn pre_handler(&self, request: &Request) -> Result<Outbound, SocksError> {
        if request.command != SocksCommand::Connect {
            return Err(SocksError::msg(
                ReplyReason::CommandNotSupported,
                format!("{} command not supported", request.command),
            ));
        }

        let stream = self.dial(request).await?;
        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to apply socket options: {}", e);
        }

        let local_addr = stream.local_addr().ok();
        debug!(
            "TCP connection established to {} from {:?}",
            request.destination, local_addr
        );

        Ok(Outbound::new(stream, local_addr))
    }

    async fn refresh(&self, scope: CancellationToken) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = scope.cancelled() => return,
                _ = ticker.tick() => trace!("Session keep-alive"),
            }
        }
    }

    async fn copy_from_client_to_remote(
        &self,
        scope: CancellationToken,
        mut client: BoxReader,
        mut remote: BoxWriter,
    ) -> Result<()> {
        let copied = copy_until_cancelled(&scope, &mut client, &mut remote, self.buffer_size)
            .await
            .context("Client to remote copy failed")?;
        debug!("Client->Remote finished: {} bytes", copied);
        Ok(())
    }

    async fn copy_from_remote_to_client(
        &self,
        scope: CancellationToken,
        mut remote: BoxReader,
        mut client: BoxWriter,
    ) -> Result<()> {
        let copied = copy_until_cancelled(&scope, &mut remote, &mut client, self.buffer_size)
            .await
            .context("Remote to client copy failed")?;
        debug!("Remote->Client finished: {} bytes", copied);
        Ok(())
    }
}
