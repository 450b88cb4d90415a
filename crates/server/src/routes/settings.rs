//! `/settings/weights` (§6, §4.8): read/write the global scoring weight vector.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use revisit_core::WeightVector;
use revisit_db::Weights;
use axum::routing::put;

use crate::error::ApiResult;
use crate::state::AppState;

async fn get_weights(State(state): State<Arc<AppState>>) -> Json<Weights> {
    Json(state.db.get_weights().await)
}

async fn get_default_weights() -> Json<Weights> {
    Json(WeightVector::default().into())
}

async fn set_weights(State(state): State<Arc<AppState>>, Json(weights): Json<Weights>) -> ApiResult<()> {
    state.db.set_weights(weights).await?;
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings/weights", get(get_weights))
        .route("/settings/weights/defaults", get(get_default_weights))
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new().route("/settings/weights", put(set_weights))
}
