//! `/patterns` (§6): technique-tag catalog.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use revisit_db::PatternRow;
use revisit_types::{DomainError, Pattern};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

fn pattern_row_to_wire(row: PatternRow) -> ApiResult<Pattern> {
    Ok(Pattern {
        id: row.id.parse().map_err(|_| DomainError::Internal("stored pattern id is not a valid id".into()))?,
        title: row.title,
        description: row.description,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatternRequest {
    pub title: String,
    pub description: Option<String>,
}

async fn create_pattern(State(state): State<Arc<AppState>>, Json(req): Json<CreatePatternRequest>) -> ApiResult<Json<Pattern>> {
    let row = state.db.create_pattern(&req.title, req.description.as_deref()).await?;
    Ok(Json(pattern_row_to_wire(row)?))
}

async fn list_patterns(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Pattern>>> {
    let rows = state.db.list_patterns().await?;
    rows.into_iter().map(pattern_row_to_wire).collect::<ApiResult<Vec<_>>>().map(Json)
}

async fn get_pattern(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Pattern>> {
    let row = state.db.get_pattern(&id).await?;
    Ok(Json(pattern_row_to_wire(row)?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/patterns", post(create_pattern).get(list_patterns))
        .route("/patterns/{id}", axum::routing::get(get_pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use revisit_db::Database;
    use tower::ServiceExt;

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
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

        let create = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/patterns")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"title":"Two Pointers"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create.status(), StatusCode::OK);
        let body = to_bytes(create.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = parsed["id"].as_str().unwrap().to_string();

        let get = app.oneshot(Request::builder().uri(format!("/patterns/{id}")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(get.status(), StatusCode::OK);
    }
}
