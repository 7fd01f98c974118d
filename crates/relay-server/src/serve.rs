use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use relay_config::ServerConfig;
use relay_dispatch::{Dispatcher, ModelClient};
use tokio_util::sync::CancellationToken;

use crate::routes::router;

/// Generation prompts are small; anything larger is rejected by axum.
const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// A running axum listener that stops when its token is cancelled.
#[derive(Debug)]
pub struct HttpEndpoint {
    addr: SocketAddr,
    shutdown: CancellationToken,
    server_task: tokio::task::JoinHandle<()>,
}

impl HttpEndpoint {
    /// Bind `bind_addr` (port 0 picks a free port) and start serving `app`.
    pub async fn start(bind_addr: &str, app: Router) -> Result<Self> {
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid relay bind address '{bind_addr}'"))?;

        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind relay endpoint at {bind_addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to resolve local relay address")?;

        let shutdown = CancellationToken::new();
        let app = app.layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES));
        let server_shutdown = shutdown.clone();
        let server_task = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    server_shutdown.cancelled().await;
                })
                .await
            {
                tracing::warn!(error = %error, "relay HTTP server stopped with error");
            }
        });

        Ok(Self {
            addr: local_addr,
            shutdown,
            server_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(error) = self.server_task.await {
            tracing::debug!(error = %error, "relay HTTP server join failed");
        }
    }
}

/// Serve `dispatcher` on the configured address until `shutdown` fires.
pub async fn serve_until<C: ModelClient + 'static>(
    dispatcher: Arc<Dispatcher<C>>,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let credentials = dispatcher.pool().len();
    let app = router(dispatcher, &config.route);
    let endpoint = HttpEndpoint::start(&config.listen_addr(), app).await?;
    tracing::info!(
        addr = %endpoint.local_addr(),
        route = %config.route,
        credentials,
        "Relay listening"
    );

    shutdown.cancelled().await;
    tracing::info!("Shutting down relay");
    endpoint.shutdown().await;
    Ok(())
}
