//! Counsel Desk - HTTP server entry point

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use counsel_desk::storage::ConfigService;
use counsel_desk::{api_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("counsel_desk=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_service = ConfigService::new().context("failed to load configuration")?;
    let config = config_service
        .effective_config()
        .context("invalid configuration")?;
    info!(path = %config_service.path().display(), "configuration loaded");

    let bind = config.server.bind.clone();
    let skip_index = config.storage.skip_startup_index;
    let state = Arc::new(
        AppState::initialize(config)
            .await
            .context("failed to initialize services")?,
    );

    if skip_index {
        info!("startup indexing disabled");
    } else {
        match state.index_knowledge().await {
            Ok(report) => info!(
                sources = report.sources,
                chunks = report.chunks,
                skipped = report.skipped,
                "knowledge base ready"
            ),
            Err(e) => warn!(error = %e, "knowledge indexing failed, serving the existing index"),
        }
    }

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(addr = %bind, "counsel-desk listening");

    axum::serve(listener, api_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
