use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::cache::token_store::TokenStore;
use crate::config::settings::{MetricsConfig, ServerConfig};
use crate::helpers::time::Clock;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::sinks::status::StatusState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub status_state: StatusState,
}

impl AppState {
    pub fn new(metrics: &Metrics, store: TokenStore, clock: Arc<dyn Clock>, prefix_len: usize) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            status_state: StatusState::new(store, clock, prefix_len),
        }
    }
}

pub fn router(state: AppState, metrics_config: &MetricsConfig) -> Router {
    Router::new()
        .merge(state.metrics_state.router(metrics_config))
        .merge(state.status_state.router())
        .with_state(state)
}

/// Serve the status and metrics routes until the listener fails.
pub async fn start(server_config: &ServerConfig, metrics_config: &MetricsConfig, state: AppState) -> Result<()> {
    let metrics = get_metrics().await;
    let app = router(state, metrics_config);

    let address = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("cannot bind status server to {address}"))?;
    info!("status server listening on {}", address);

    metrics.up.set(1);
    axum::serve(listener, app).await.context("status server failed")?;
    Ok(())
}
