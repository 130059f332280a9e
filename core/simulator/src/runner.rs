// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{Instrument, debug, info, span, warn};

use crate::config::ConfigLoader;
use crate::routes::build_router;
use crate::signal;
use crate::state::AppState;

/// Async body: tracing setup, state construction, serving until a shutdown
/// signal arrives. The caller provides the Tokio runtime.
pub async fn run_server(mut config: ConfigLoader) -> Result<()> {
    let tracing_conf = config.tracing().clone();
    tracing_conf
        .setup_tracing_subscriber()
        .context("failed to set up tracing")?;

    let root_span = span!(tracing::Level::INFO, "application_lifecycle");
    debug!(?tracing_conf);

    start(config).instrument(root_span).await
}

async fn start(mut config: ConfigLoader) -> Result<()> {
    let drain_timeout = config.runtime().drain_timeout();
    let bind_address = config
        .server()
        .context("invalid server configuration")?
        .bind_address()
        .to_string();

    let state = AppState::from_config(&mut config).context("failed to build application state")?;

    // release the parsed document before serving
    drop(config);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!(address = %listener.local_addr()?, "simulator listening");

    serve(
        listener,
        build_router(Arc::new(state)),
        signal::shutdown(),
        drain_timeout,
    )
    .await
}

/// Serve `router` until `shutdown` resolves, then give in-flight requests
/// at most `drain_timeout` to complete.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    drain_timeout: Duration,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let signalled = Arc::new(Notify::new());
    let notify = signalled.clone();

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            notify.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.context("server terminated"),
        _ = signalled.notified() => {
            debug!("shutdown requested, draining connections");
        }
    }

    match tokio::time::timeout(drain_timeout, server).await {
        Ok(result) => {
            info!("simulator stopped");
            result.context("server terminated")
        }
        Err(_) => {
            warn!(timeout = ?drain_timeout, "drain timed out");
            anyhow::bail!("drain timed out after {:?}", drain_timeout);
        }
    }
}

/// Load config from `config_file`, build the Tokio runtime described by the
/// `runtime:` section, and block until the server stops.
pub fn run(config_file: &str) -> Result<()> {
    let mut config = ConfigLoader::new(config_file).context("failed to load configuration")?;

    let runtime = config
        .runtime()
        .build_runtime()
        .context("failed to build runtime")?;
    runtime.block_on(run_server(config))
}
