//! Listener and accept loop
//!
//! Accepts TCP clients and runs one [`Proxy`] session per connection on a
//! [`TaskTracker`] until the shutdown token is cancelled.

use crate::config::ServerConfig;
use crate::handler::{DirectHandler, ProxyHandler};
use crate::helper::RetryConfig;
use crate::socks::Proxy;
use crate::transport::SocketOpts;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

/// SOCKS5 relay server
pub struct Server {
    listener: TcpListener,
    proxy: Proxy,
    socket_opts: SocketOpts,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    retry: RetryConfig,
}

impl Server {
    /// Bind the listener described by `config`
    pub async fn bind(
        config: &ServerConfig,
        handler: Arc<dyn ProxyHandler>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid server configuration")?;

        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

        Ok(Server {
            listener,
            proxy: Proxy::from_config(config, handler, shutdown.clone()),
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
            shutdown,
            tracker: TaskTracker::new(),
            retry: RetryConfig::default(),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to get listener address")
    }

    /// Accept connections until shutdown, then wait for open sessions
    pub async fn run(self) -> Result<()> {
        info!("SOCKS5 relay listening on {}", self.local_addr()?);

        let mut failures: u32 = 0;
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    debug!("Accepted connection from {}", peer);
                    if let Err(e) = self.socket_opts.apply(&stream) {
                        warn!("Failed to apply socket options for {}: {}", peer, e);
                    }

                    let proxy = self.proxy.clone();
                    self.tracker.spawn(
                        async move {
                            // Failures are logged by the session itself
                            let _ = proxy.handle(stream).await;
                        }
                        .instrument(tracing::debug_span!("session", %peer)),
                    );
                }
                Err(e) => {
                    let delay = self.retry.delay_for_attempt(failures);
                    failures = failures.saturating_add(1);
                    error!("Failed to accept connection: {}. Retrying in {:?}", e, delay);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.tracker.close();
        debug!("Waiting for {} open sessions", self.tracker.len());
        self.tracker.wait().await;

        info!("Server stopped");
        Ok(())
    }
}

/// Run a server with the default [`DirectHandler`] until `shutdown` fires
pub async fn run_server(config: &ServerConfig, shutdown: CancellationToken) -> Result<()> {
    let handler = Arc::new(DirectHandler::from_config(config));
    Server::bind(config, handler, shutdown).await?.run().await
}
