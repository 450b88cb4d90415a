//! `/problems` (§6): catalog CRUD plus the urgent-queue read and the
//! per-problem attempt history.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::DateTime;
use revisit_db::ProblemRow;
use revisit_types::{Attempt, DomainError, Problem};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::routes::attempts::attempt_row_to_wire;
use crate::state::AppState;

pub(crate) fn problem_row_to_wire(row: ProblemRow) -> ApiResult<Problem> {
    Ok(Problem {
        id: row.id.parse().map_err(|_| DomainError::Internal("stored problem id is not a valid id".into()))?,
        title: row.title,
        source: row.source,
        url: row.url,
        difficulty: revisit_types::Difficulty::parse(&row.difficulty).unwrap_or(revisit_types::Difficulty::Medium),
        created_at: DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|_| DomainError::Internal("stored problem timestamp is invalid".into()))?
            .with_timezone(&chrono::Utc),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProblemRequest {
    pub title: String,
    pub source: Option<String>,
    pub url: Option<String>,
    pub difficulty: String,
    #[serde(default)]
    pub pattern_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProblemRequest {
    pub title: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrgentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgentProblem {
    pub problem: Problem,
    pub score: f64,
    pub reason: String,
}

async fn create_problem(State(state): State<Arc<AppState>>, Json(req): Json<CreateProblemRequest>) -> ApiResult<Json<Problem>> {
    let row = state
        .db
        .create_problem(&req.title, req.source.as_deref(), req.url.as_deref(), &req.difficulty)
        .await?;
    if !req.pattern_ids.is_empty() {
        state.db.link_patterns(&row.id, &req.pattern_ids).await?;
    }
    Ok(Json(problem_row_to_wire(row)?))
}

async fn list_problems(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Problem>>> {
    let rows = state.db.list_problems().await?;
    rows.into_iter().map(problem_row_to_wire).collect::<ApiResult<Vec<_>>>().map(Json)
}

async fn get_problem(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Problem>> {
    let row = state.db.get_problem(&id).await?;
    Ok(Json(problem_row_to_wire(row)?))
}

async fn update_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProblemRequest>,
) -> ApiResult<Json<Problem>> {
    let row = state
        .db
        .update_problem(&id, req.title.as_deref(), req.source.as_deref(), req.url.as_deref(), req.difficulty.as_deref())
        .await?;
    Ok(Json(problem_row_to_wire(row)?))
}

async fn delete_problem(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<()> {
    state.db.delete_problem(&id).await?;
    Ok(())
}

/// `GET /problems/urgent?limit=N`: the highest-score candidates for the
/// signed-in user, independent of session generation (§4.5).
async fn urgent_problems(
    axum::extract::Extension(user): axum::extract::Extension<crate::middleware::AuthUser>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrgentQuery>,
) -> ApiResult<Json<Vec<UrgentProblem>>> {
    let limit = query.limit.unwrap_or(10);
    let mut scored = state.db.compute_scores_for_user(&user.user_id, revisit_types::EmphasisProfile::Standard).await?;
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    let mut out = Vec::with_capacity(scored.len());
    for s in scored {
        let row = state.db.get_problem(&s.problem_id).await?;
        out.push(UrgentProblem {
            problem: problem_row_to_wire(row)?,
            score: s.score,
            reason: s.reason,
        });
    }
    Ok(Json(out))
}

async fn problem_attempts(
    axum::extract::Extension(user): axum::extract::Extension<crate::middleware::AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Attempt>>> {
    let rows = state.db.list_attempts_for_problem(&user.user_id, &id).await?;
    rows.into_iter().map(attempt_row_to_wire).collect::<ApiResult<Vec<_>>>().map(Json)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/problems", post(create_problem).get(list_problems))
        .route("/problems/urgent", get(urgent_problems))
        .route("/problems/{id}", get(get_problem).put(update_problem).delete(delete_problem))
        .route("/problems/{id}/attempts", get(problem_attempts))
}
