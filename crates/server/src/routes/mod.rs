//! API route handlers for the practice-scheduler server.

pub mod admin;
pub mod attempts;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod import;
pub mod patterns;
pub mod problems;
pub mod sessions;
pub mod settings;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;

/// Assemble the full API surface: unauthenticated routes, authenticated
/// routes, and admin-only routes layered with their respective middleware.
pub fn api_routes(state: Arc<AppState>) -> Router {
    let public = Router::new().merge(health::router()).merge(auth::router());

    let authenticated = Router::new()
        .merge(problems::router())
        .merge(patterns::router())
        .merge(attempts::router())
        .merge(sessions::router())
        .merge(settings::router())
        .merge(dashboard::router())
        .merge(import::router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin = Router::new()
        .merge(admin::router())
        .merge(settings::admin_router())
        .route_layer(axum::middleware::from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new().merge(public).merge(authenticated).merge(admin).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_db::Database;

    #[tokio::test]
    async fn api_routes_construction_does_not_panic() {
        let db = Database::new_in_memory().await.unwrap();
        let state = AppState::new(
            db,
            crate::config::Config {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                env_tag: "test".into(),
                database_url: None,
                jwt_secret: "secret".into(),
                default_weights: revisit_core::WeightVector::default().into(),
                csv_bundle_path: None,
            },
        );
        let _router = api_routes(state);
    }
}
