//! `/attempts` (§6): start/timer/complete/abandon lifecycle for a single
//! practice attempt (§4.2).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::DateTime;
use revisit_db::AttemptRow;
use revisit_types::{Attempt, AttemptState, DomainError, Outcome, TimerState};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::state::AppState;

fn parse_attempt_state(s: &str) -> AttemptState {
    match s {
        "completed" => AttemptState::Completed,
        "abandoned" => AttemptState::Abandoned,
        _ => AttemptState::InProgress,
    }
}

fn parse_timer_state(s: &str) -> TimerState {
    match s {
        "running" => TimerState::Running,
        "paused" => TimerState::Paused,
        _ => TimerState::Idle,
    }
}

pub(crate) fn timer_state_str(s: TimerState) -> &'static str {
    match s {
        TimerState::Idle => "idle",
        TimerState::Running => "running",
        TimerState::Paused => "paused",
    }
}

fn parse_outcome(s: &str) -> Outcome {
    if s == "failed" {
        Outcome::Failed
    } else {
        Outcome::Passed
    }
}

fn outcome_str(o: Outcome) -> &'static str {
    match o {
        Outcome::Passed => "passed",
        Outcome::Failed => "failed",
    }
}

fn parse_rfc3339(s: &str) -> ApiResult<DateTime<chrono::Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|_| DomainError::Internal("stored timestamp is invalid".into()))?
        .with_timezone(&chrono::Utc))
}

pub(crate) fn attempt_row_to_wire(row: AttemptRow) -> ApiResult<Attempt> {
    let started_at = parse_rfc3339(&row.started_at)?;
    Ok(Attempt {
        id: row.id.parse().map_err(|_| DomainError::Internal("stored attempt id is not a valid id".into()))?,
        user_id: row.user_id.parse().map_err(|_| DomainError::Internal("stored user id is not a valid id".into()))?,
        problem_id: row.problem_id.parse().map_err(|_| DomainError::Internal("stored problem id is not a valid id".into()))?,
        session_id: row.session_id.as_deref().and_then(|s| s.parse().ok()),
        state: parse_attempt_state(&row.state),
        elapsed_seconds: row.elapsed_seconds,
        timer_state: parse_timer_state(&row.timer_state),
        last_timer_update: match &row.last_timer_update {
            Some(s) => parse_rfc3339(s)?,
            None => started_at,
        },
        confidence: row.confidence,
        outcome: row.outcome.as_deref().map(parse_outcome),
        duration_seconds: row.duration_seconds,
        notes: row.notes,
        performed_at: row.performed_at.as_deref().map(parse_rfc3339).transpose()?,
        started_at,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    pub problem_id: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimerRequest {
    pub elapsed_seconds: i64,
    pub timer_state: TimerState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAttemptRequest {
    pub outcome: Outcome,
    pub confidence: i32,
    pub duration_seconds: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InProgressQuery {
    #[serde(rename = "problemId")]
    pub problem_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InProgressResponse {
    pub attempt: Option<Attempt>,
}

async fn start_attempt(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartAttemptRequest>,
) -> ApiResult<Json<Attempt>> {
    let row = state.db.start_attempt(&user.user_id, &req.problem_id, req.session_id.as_deref()).await?;
    Ok(Json(attempt_row_to_wire(row)?))
}

async fn update_timer(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTimerRequest>,
) -> ApiResult<()> {
    state
        .db
        .update_timer(&id, &user.user_id, req.elapsed_seconds, timer_state_str(req.timer_state))
        .await?;
    Ok(())
}

async fn complete_attempt(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CompleteAttemptRequest>,
) -> ApiResult<Json<Attempt>> {
    let row = state
        .db
        .complete_attempt(&id, &user.user_id, outcome_str(req.outcome), req.confidence, req.duration_seconds, req.notes.as_deref())
        .await?;
    Ok(Json(attempt_row_to_wire(row)?))
}

async fn abandon_attempt(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.db.abandon_attempt(&id, &user.user_id).await?;
    Ok(())
}

async fn list_attempts(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Attempt>>> {
    let rows = state.db.list_attempts_for_user(&user.user_id).await?;
    rows.into_iter().map(attempt_row_to_wire).collect::<ApiResult<Vec<_>>>().map(Json)
}

async fn in_progress_attempt(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<InProgressQuery>,
) -> ApiResult<Json<InProgressResponse>> {
    let row = state.db.get_in_progress_for_problem(&user.user_id, &query.problem_id).await?;
    let attempt = row.map(attempt_row_to_wire).transpose()?;
    Ok(Json(InProgressResponse { attempt }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/attempts", post(start_attempt).get(list_attempts))
        .route("/attempts/in-progress", get(in_progress_attempt))
        .route("/attempts/{id}/timer", axum::routing::put(update_timer))
        .route("/attempts/{id}/complete", axum::routing::put(complete_attempt))
        .route("/attempts/{id}", axum::routing::delete(abandon_attempt))
}
