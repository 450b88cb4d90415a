//! `GET /health` and `GET /metrics` — unauthenticated ambient endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::metrics::render_metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    env: String,
    uptime_secs: u64,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        env: state.config.env_tag.clone(),
        uptime_secs: state.uptime_secs(),
    })
}

async fn metrics_handler() -> (StatusCode, String) {
    match render_metrics() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized".to_string()),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check)).route("/metrics", get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use revisit_db::Database;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_ok() {
        let db = Database::new_in_memory().await.unwrap();
        let state = AppState::new(db, crate::config::Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            env_tag: "test".into(),
            database_url: None,
            jwt_secret: "secret".into(),
            default_weights: revisit_core::WeightVector::default().into(),
            csv_bundle_path: None,
        });
        let app = router().with_state(state);
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
    }
}
