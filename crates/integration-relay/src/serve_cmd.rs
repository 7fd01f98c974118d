use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use relay_config::RelayConfig;
use relay_dispatch::{DispatchPolicy, Dispatcher, GeminiClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub(crate) async fn handle_serve(
    config_path: Option<&Path>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = RelayConfig::load(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    // An empty pool is a startup failure, not a per-request one.
    let pool = config.credential_pool();
    pool.ensure_non_empty(&config.provider.credentials_env)?;

    let client = GeminiClient::from_config(&config.provider)
        .context("Failed to initialise model provider client")?;
    info!(
        model = client.model(),
        credentials = pool.len(),
        "Starting relay"
    );
    let dispatcher = Arc::new(Dispatcher::new(
        pool,
        client,
        DispatchPolicy::from(&config.dispatch),
    ));

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "Failed to listen for Ctrl-C");
            return;
        }
        signal_shutdown.cancel();
    });

    relay_server::serve_until(dispatcher, &config.server, shutdown).await
}
