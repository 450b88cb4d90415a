//! `/sessions` (§6): template-driven session generation (§4.7) plus
//! session CRUD.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::DateTime;
use revisit_core::{TemplateCategory, TEMPLATES};
use revisit_db::SessionRow;
use revisit_types::{DomainError, RevisionSession, TimerState};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::routes::attempts::timer_state_str;
use crate::state::AppState;

fn session_row_to_wire(row: SessionRow) -> ApiResult<RevisionSession> {
    let problem_ids = row
        .problem_ids()
        .into_iter()
        .map(|s| s.parse().map_err(|_| DomainError::Internal("stored problem id is not a valid id".into())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RevisionSession {
        id: row.id.parse().map_err(|_| DomainError::Internal("stored session id is not a valid id".into()))?,
        user_id: row.user_id.parse().map_err(|_| DomainError::Internal("stored user id is not a valid id".into()))?,
        template_key: row.template_key,
        planned_duration_min: row.planned_duration_min,
        problem_ids,
        created_at: DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|_| DomainError::Internal("stored session timestamp is invalid".into()))?
            .with_timezone(&chrono::Utc),
        completed_at: row
            .completed_at
            .as_deref()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&chrono::Utc))
                    .map_err(|_| DomainError::Internal("stored completion timestamp is invalid".into()))
            })
            .transpose()?,
        elapsed_seconds: row.elapsed_seconds,
        timer_state: match row.timer_state.as_str() {
            "running" => TimerState::Running,
            "paused" => TimerState::Paused,
            _ => TimerState::Idle,
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSessionRequest {
    pub template_key: String,
    pub pattern_id: Option<String>,
}

/// A manually assembled session (§6 `POST /sessions`): the caller already
/// knows which problems go in, so this skips the generator entirely.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub problem_ids: Vec<String>,
    pub planned_duration_min: i32,
}

/// Wire form of [`revisit_core::DifficultyDistribution`] — plain fractions,
/// since the core type itself isn't `Deserialize`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyDistributionRequest {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

/// A caller-supplied constraint object (§6 `POST /sessions/generate/custom`,
/// §4.7) mirroring [`revisit_core::SelectionConfig`] plus the pattern-mode
/// inputs that are resolved against the database before selection runs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGenerateSessionRequest {
    pub planned_duration_min: i32,
    pub max_difficulty: revisit_types::Difficulty,
    pub difficulty_distribution: Option<DifficultyDistributionRequest>,
    pub min_quick_wins: i32,
    pub max_same_pattern: i32,
    pub min_total_problems: i32,
    pub min_distinct_patterns: i32,
    pub confidence_floor: Option<i32>,
    pub confidence_ceiling: Option<i32>,
    pub min_days_since_last: Option<i64>,
    pub progression_ordering: bool,
    #[serde(default)]
    pub emphasis: revisit_types::EmphasisProfile,
    #[serde(default = "default_pattern_mode")]
    pub pattern_mode: revisit_types::PatternMode,
    #[serde(default)]
    pub weakest_pattern_count: i32,
    pub pattern_id: Option<String>,
}

fn default_pattern_mode() -> revisit_types::PatternMode {
    revisit_types::PatternMode::All
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionTimerRequest {
    pub elapsed_seconds: i64,
    pub timer_state: TimerState,
}

fn category_str(c: TemplateCategory) -> &'static str {
    match c {
        TemplateCategory::Daily => "daily",
        TemplateCategory::Pattern => "pattern",
        TemplateCategory::Weekend => "weekend",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    pub key: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub planned_duration_min: i32,
    pub max_difficulty: revisit_types::Difficulty,
    pub min_total_problems: i32,
}

async fn generate_session(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateSessionRequest>,
) -> ApiResult<Json<RevisionSession>> {
    let template = revisit_core::templates::by_key(&req.template_key)
        .ok_or_else(|| ApiError::Domain(DomainError::BadRequest(format!("unknown template '{}'", req.template_key))))?;
    let row = state.db.generate_session(&user.user_id, template, req.pattern_id.as_deref()).await?;
    Ok(Json(session_row_to_wire(row)?))
}

async fn create_session(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Json<RevisionSession>> {
    let row = state
        .db
        .create_manual_session(&user.user_id, &req.problem_ids, req.planned_duration_min)
        .await?;
    Ok(Json(session_row_to_wire(row)?))
}

async fn generate_custom_session(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CustomGenerateSessionRequest>,
) -> ApiResult<Json<RevisionSession>> {
    let config = revisit_core::SelectionConfig {
        planned_duration_min: req.planned_duration_min,
        max_difficulty: req.max_difficulty,
        difficulty_distribution: req.difficulty_distribution.map(|d| revisit_core::DifficultyDistribution {
            easy: d.easy,
            medium: d.medium,
            hard: d.hard,
        }),
        min_quick_wins: req.min_quick_wins,
        max_same_pattern: req.max_same_pattern,
        min_total_problems: req.min_total_problems,
        min_distinct_patterns: req.min_distinct_patterns,
        confidence_floor: req.confidence_floor,
        confidence_ceiling: req.confidence_ceiling,
        min_days_since_last: req.min_days_since_last,
        progression_ordering: req.progression_ordering,
    };
    let row = state
        .db
        .generate_custom_session(
            &user.user_id,
            req.emphasis,
            req.pattern_mode,
            req.weakest_pattern_count,
            req.pattern_id.as_deref(),
            config,
        )
        .await?;
    Ok(Json(session_row_to_wire(row)?))
}

async fn list_templates() -> Json<Vec<TemplateView>> {
    Json(
        TEMPLATES
            .iter()
            .map(|t| TemplateView {
                key: t.key,
                display_name: t.display_name,
                category: category_str(t.category),
                planned_duration_min: t.planned_duration_min,
                max_difficulty: t.max_difficulty,
                min_total_problems: t.min_total_problems,
            })
            .collect(),
    )
}

async fn list_sessions(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<RevisionSession>>> {
    let rows = state.db.list_sessions_for_user(&user.user_id).await?;
    rows.into_iter().map(session_row_to_wire).collect::<ApiResult<Vec<_>>>().map(Json)
}

async fn get_session(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RevisionSession>> {
    let row = state.db.get_session(&id, &user.user_id).await?;
    Ok(Json(session_row_to_wire(row)?))
}

async fn complete_session(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RevisionSession>> {
    let row = state.db.complete_session(&id, &user.user_id).await?;
    Ok(Json(session_row_to_wire(row)?))
}

async fn update_session_timer(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionTimerRequest>,
) -> ApiResult<()> {
    state
        .db
        .update_session_timer(&id, &user.user_id, req.elapsed_seconds, timer_state_str(req.timer_state))
        .await?;
    Ok(())
}

async fn delete_session(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.db.delete_session(&id, &user.user_id).await?;
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/generate", post(generate_session))
        .route("/sessions/generate/custom", post(generate_custom_session))
        .route("/sessions/templates", get(list_templates))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/complete", axum::routing::put(complete_session))
        .route("/sessions/{id}/timer", axum::routing::put(update_session_timer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use revisit_db::Database;
    use tower::ServiceExt;

    fn test_state(db: Database) -> Arc<AppState> {
        AppState::new(
            db,
            crate::config::Config {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                env_tag: "test".into(),
                database_url: None,
                jwt_secret: "secret".into(),
                default_weights: revisit_core::WeightVector::default().into(),
                csv_bundle_path: None,
            },
        )
    }

    #[tokio::test]
    async fn listing_templates_returns_the_static_catalog() {
        let db = Database::new_in_memory().await.unwrap();
        let state = test_state(db);
        let app = router().with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/sessions/templates").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let templates: Vec<TemplateView> = serde_json::from_slice(&body).unwrap();
        assert!(templates.iter().any(|t| t.key == "morning_momentum"));
    }

    #[tokio::test]
    async fn generating_an_unknown_template_is_a_bad_request() {
        let db = Database::new_in_memory().await.unwrap();
        let state = test_state(db);
        let app = router()
            .layer(axum::Extension(AuthUser { user_id: "u1".into(), role: revisit_types::Role::User }))
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"templateKey":"does-not-exist"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generating_a_session_with_no_problems_fails_the_constraint() {
        let db = Database::new_in_memory().await.unwrap();
        let state = test_state(db);
        let app = router()
            .layer(axum::Extension(AuthUser { user_id: "u1".into(), role: revisit_types::Role::User }))
            .with_state(state);

        // No problems exist yet, so the generator must fail with a structured
        // constraint error rather than returning an empty session.
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"templateKey":"morning_momentum"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn creating_a_session_with_no_problems_is_a_bad_request() {
        let db = Database::new_in_memory().await.unwrap();
        let state = test_state(db);
        let app = router()
            .layer(axum::Extension(AuthUser { user_id: "u1".into(), role: revisit_types::Role::User }))
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"problemIds":[],"plannedDurationMin":30}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn creating_a_manual_session_persists_the_given_problems() {
        let db = Database::new_in_memory().await.unwrap();
        let problem = db.create_problem("Two Sum", None, None, "easy").await.unwrap();
        let state = test_state(db);
        let app = router()
            .layer(axum::Extension(AuthUser { user_id: "u1".into(), role: revisit_types::Role::User }))
            .with_state(state);

        let body = serde_json::json!({ "problemIds": [problem.id], "plannedDurationMin": 20 });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let session: RevisionSession = serde_json::from_slice(&body).unwrap();
        assert_eq!(session.problem_ids.len(), 1);
        assert!(session.template_key.is_none());
    }

    #[tokio::test]
    async fn custom_generation_with_no_problems_fails_the_constraint() {
        let db = Database::new_in_memory().await.unwrap();
        let state = test_state(db);
        let app = router()
            .layer(axum::Extension(AuthUser { user_id: "u1".into(), role: revisit_types::Role::User }))
            .with_state(state);

        let body = serde_json::json!({
            "plannedDurationMin": 30,
            "maxDifficulty": "medium",
            "minQuickWins": 1,
            "maxSamePattern": 2,
            "minTotalProblems": 3,
            "minDistinctPatterns": 1,
            "progressionOrdering": false,
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions/generate/custom")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
