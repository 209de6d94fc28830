//! HTTP server for Prometheus metrics and session introspection
//!
//! Runs a lightweight HTTP server on a separate port.
//!
//! # Endpoints
//!
//! - `GET /metrics` - Prometheus metrics
//! - `GET /health` - JSON health summary
//! - `GET /sessions` - live sessions with per-type nonce state
//!
//! # Example
//!
//! ```ignore
//! use silta_proxy::metrics_server::MetricsServer;
//!
//! let handle = MetricsServer::start(config.metrics_addr, Some(proxy.registry()));
//! ```

use crate::session::SessionRegistry;
use axum::extract::State;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared state for the metrics server
#[derive(Clone)]
struct AppState {
    sessions: Option<Arc<SessionRegistry>>,
}

/// Metrics HTTP server
pub struct MetricsServer;

impl MetricsServer {
    /// Start the metrics server on the given address
    ///
    /// Returns a JoinHandle that can be used to abort the server.
    /// The server runs until aborted or the process exits.
    pub fn start(addr: SocketAddr, sessions: Option<Arc<SessionRegistry>>) -> JoinHandle<()> {
        let app = router(AppState { sessions });

        tokio::spawn(async move {
            info!(addr = %addr, "Metrics server starting");

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, addr = %addr, "Failed to bind metrics server");
                    return;
                }
            };

            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Metrics server error");
            }
        })
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/sessions", get(sessions_handler))
        .with_state(state)
}

/// Handler for /metrics endpoint
async fn metrics_handler() -> impl IntoResponse {
    let body = crate::metrics::gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[derive(serde::Serialize)]
struct HealthSummary {
    status: &'static str,
    active_sessions: usize,
    sessions_total: u64,
    nacks_synthesized: u64,
    responses_withheld: u64,
}

/// Handler for /health endpoint
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let active_sessions = state.sessions.as_ref().map(|s| s.len()).unwrap_or(0);
    let summary = match crate::metrics::Metrics::get() {
        Some(m) => HealthSummary {
            status: "ok",
            active_sessions,
            sessions_total: m.sessions_total.get(),
            nacks_synthesized: m.nacks_synthesized.get(),
            responses_withheld: m.responses_withheld.get(),
        },
        None => HealthSummary {
            status: "ok",
            active_sessions,
            sessions_total: 0,
            nacks_synthesized: 0,
            responses_withheld: 0,
        },
    };
    (StatusCode::OK, Json(summary))
}

#[derive(serde::Serialize)]
struct SessionView {
    id: u64,
    node_id: String,
    age_secs: u64,
    nonces: Vec<NonceView>,
}

#[derive(serde::Serialize)]
struct NonceView {
    type_url: String,
    sent: String,
    sent_generation: u64,
    processed: String,
    processed_generation: u64,
}

/// Handler for /sessions endpoint
async fn sessions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(registry) = state.sessions else {
        return (StatusCode::SERVICE_UNAVAILABLE, "No session registry").into_response();
    };

    let sessions: Vec<SessionView> = registry
        .list()
        .into_iter()
        .map(|s| SessionView {
            id: s.id,
            node_id: s.node_id,
            age_secs: s.started.elapsed().as_secs(),
            nonces: s
                .nonces
                .snapshot()
                .into_iter()
                .map(|n| NonceView {
                    type_url: n.type_url,
                    sent: n.sent.to_string(),
                    sent_generation: n.sent_generation,
                    processed: n.processed.to_string(),
                    processed_generation: n.processed_generation,
                })
                .collect(),
        })
        .collect();

    (StatusCode::OK, Json(sessions)).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::nonce::NonceTracker;
    use silta_core::type_url;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 100_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let _ = crate::metrics::Metrics::init();

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("text/plain"));
    }

    #[tokio::test]
    async fn test_health_reports_active_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        let _guard = registry.register(Arc::new(NonceTracker::new()));
        let state = AppState {
            sessions: Some(registry),
        };

        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_sessions"], 1);
    }

    #[tokio::test]
    async fn test_sessions_handler_lists_nonces() {
        let registry = Arc::new(SessionRegistry::new());
        let nonces = Arc::new(NonceTracker::new());
        let guard = registry.register(Arc::clone(&nonces));
        guard.set_node_id("node-a");
        nonces.record_sent(type_url::CLUSTER, "7");

        let state = AppState {
            sessions: Some(registry),
        };
        let response = sessions_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json[0]["node_id"], "node-a");
        assert_eq!(json[0]["nonces"][0]["type_url"], type_url::CLUSTER);
        assert_eq!(json[0]["nonces"][0]["sent"], "7");
        assert_eq!(json[0]["nonces"][0]["sent_generation"], 1);
    }

    #[tokio::test]
    async fn test_sessions_handler_without_registry() {
        let state = AppState { sessions: None };
        let response = sessions_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
