use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use crate::state::{AppState, MetricsSnapshot};

const APP_NAME: &str = "Telegram ID Bot";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct StatusResponse {
    name: &'static str,
    version: &'static str,
    environment: String,
    mode: &'static str,
    bot_username: Option<String>,
    started_at: String,
    uptime_secs: u64,
}

#[derive(Serialize)]
struct MetricsResponse {
    #[serde(flatten)]
    metrics: MetricsSnapshot,
    uptime_secs: u64,
}

/// Health and status routes. Webhook routes are merged in by the caller.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .with_state(state)
}

/// Bind the listener up front so a port clash fails startup.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("HTTP server listening on {}", addr);
    Ok(listener)
}

pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;
    info!("HTTP server stopped");
    Ok(())
}

async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mode = state.config.update_mode.label();
    Json(json!({
        "name": APP_NAME,
        "version": VERSION,
        "message": format!("✅ {APP_NAME} Running in {} Mode", capitalize(mode)),
        "mode": mode,
    }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "Healthy" }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        metrics: state.metrics.snapshot(),
        uptime_secs: state.uptime_secs(),
    })
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        name: APP_NAME,
        version: VERSION,
        environment: state.config.app_env.to_string(),
        mode: state.config.update_mode.label(),
        bot_username: state.bot_username().map(str::to_string),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: state.uptime_secs(),
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
