//! `GET /dashboard/stats` (§6): an at-a-glance summary combining the scoring
//! engine's urgent queue with the raw stats rollups (§4.3, §4.5).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use revisit_types::{DomainError, EmphasisProfile, UserPatternStats};
use serde::Serialize;

use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_problems: i64,
    pub solved_count: i64,
    pub due_now_count: i64,
    pub top_urgent: Vec<crate::routes::problems::UrgentProblem>,
    pub pattern_stats: Vec<UserPatternStats>,
}

fn pattern_stat_to_wire(row: revisit_db::UserPatternStatsRow) -> ApiResult<UserPatternStats> {
    Ok(UserPatternStats {
        user_id: row.user_id.parse().map_err(|_| DomainError::Internal("stored user id is not a valid id".into()))?,
        pattern_id: row.pattern_id.parse().map_err(|_| DomainError::Internal("stored pattern id is not a valid id".into()))?,
        times_revised: row.times_revised,
        avg_confidence: row.avg_confidence,
        last_revised_at: row
            .last_revised_at
            .as_deref()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|_| DomainError::Internal("stored timestamp is invalid".into()))
            })
            .transpose()?,
    })
}

async fn dashboard_stats(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<DashboardStats>> {
    let now = Utc::now();
    let problems = state.db.list_problems().await?;
    let problem_stats = state.db.all_problem_stats_for_user(&user.user_id).await?;

    let solved_count = problem_stats.iter().filter(|s| s.status == "solved").count() as i64;
    let due_now_count = problem_stats
        .iter()
        .filter(|s| DateTime::parse_from_rfc3339(&s.next_review_at).map(|t| t.with_timezone(&Utc) <= now).unwrap_or(false))
        .count() as i64;

    let mut scored = state.db.compute_scores_for_user(&user.user_id, EmphasisProfile::Standard).await?;
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(5);

    let mut top_urgent = Vec::with_capacity(scored.len());
    for s in scored {
        let row = state.db.get_problem(&s.problem_id).await?;
        top_urgent.push(crate::routes::problems::UrgentProblem {
            problem: crate::routes::problems::problem_row_to_wire(row)?,
            score: s.score,
            reason: s.reason,
        });
    }

    let pattern_stats = state
        .db
        .all_pattern_stats_for_user(&user.user_id)
        .await?
        .into_iter()
        .map(pattern_stat_to_wire)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(DashboardStats {
        total_problems: problems.len() as i64,
        solved_count,
        due_now_count,
        top_urgent,
        pattern_stats,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard/stats", get(dashboard_stats))
}
