//! `/admin` (§6): invite-code issuance and user deactivation. Every route
//! here additionally requires [`crate::middleware::require_admin`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::generate_opaque_token;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InviteCodeResponse {
    code: String,
}

async fn create_invite_code(State(state): State<Arc<AppState>>) -> ApiResult<Json<InviteCodeResponse>> {
    let (code, hash) = generate_opaque_token();
    state.db.create_invite_code(&hash).await?;
    Ok(Json(InviteCodeResponse { code }))
}

async fn deactivate_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<()> {
    state.db.deactivate_user(&id).await?;
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/invite-codes", post(create_invite_code))
        .route("/admin/users/{id}/deactivate", post(deactivate_user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use revisit_db::Database;
    use tower::ServiceExt;

    #[tokio::test]
    async fn issuing_an_invite_code_returns_the_raw_code() {
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

        let response = app
            .oneshot(Request::builder().method("POST").uri("/admin/invite-codes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["code"].is_string());
    }
}
