//! Practice-scheduler server library.
//!
//! Provides the Axum-based HTTP API described in spec.md §6: auth, the
//! problem/pattern catalog, attempts, session generation, the scoring
//! dashboard, CSV import, and admin user management.

pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::http::HeaderValue;
use axum::Router;
use revisit_db::Database;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// CORS restricted to localhost origins — this is a self-hosted, single-user
/// tool, and the point is to stop a malicious page from reaching it via
/// `fetch()`, not to serve a public API.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _req_parts: &axum::http::request::Parts| {
                if let Ok(origin) = origin.to_str() {
                    origin.starts_with("http://localhost:") || origin.starts_with("http://127.0.0.1:")
                } else {
                    false
                }
            },
        ))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Build the full Axum application: routes, CORS, compression, and tracing.
pub fn create_app(db: Database, config: Config) -> Router {
    let state = AppState::new(db, config);
    routes::api_routes(state)
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            env_tag: "test".into(),
            database_url: None,
            jwt_secret: "secret".into(),
            default_weights: revisit_core::WeightVector::default().into(),
            csv_bundle_path: None,
        }
    }

    #[tokio::test]
    async fn health_is_reachable_without_auth() {
        let db = Database::new_in_memory().await.unwrap();
        let app = create_app(db, test_config());

        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_without_token_is_unauthorized() {
        let db = Database::new_in_memory().await.unwrap();
        let app = create_app(db, test_config());

        let response = app.oneshot(Request::builder().uri("/problems").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cors_rejects_non_localhost_origin() {
        let db = Database::new_in_memory().await.unwrap();
        let app = create_app(db, test_config());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Origin", "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
