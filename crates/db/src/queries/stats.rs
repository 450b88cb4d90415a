//! Stats aggregator (C3, §4.3) and the spaced-repetition update (§4.4).
//!
//! These are plain functions over an open transaction rather than
//! `impl Database` methods, because §5 requires the recompute to run in
//! the same transaction that terminalizes the attempt (see
//! `queries::attempts::complete_attempt`).

use chrono::{DateTime, Utc};
use revisit_core::{recompute_pattern_stats, recompute_problem_stats, update_sr, CompletedAttempt, SrState};
use revisit_types::{DomainError, DomainResult, HistoryEntry, Outcome};
use sqlx::{Sqlite, Transaction};

use crate::Database;

async fn completed_attempts_for_problem(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    problem_id: &str,
) -> sqlx::Result<Vec<CompletedAttempt>> {
    let rows: Vec<(i32, String, i64, String)> = sqlx::query_as(
        "SELECT confidence, outcome, duration_seconds, performed_at FROM attempts
         WHERE user_id = ? AND problem_id = ? AND state = 'completed'
         ORDER BY performed_at ASC",
    )
    .bind(user_id)
    .bind(problem_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(confidence, outcome, duration_seconds, performed_at)| CompletedAttempt {
            confidence,
            outcome: parse_outcome(&outcome),
            duration_seconds,
            performed_at: DateTime::parse_from_rfc3339(&performed_at).unwrap().with_timezone(&Utc),
        })
        .collect())
}

async fn completed_attempts_for_pattern(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    pattern_id: &str,
) -> sqlx::Result<Vec<CompletedAttempt>> {
    let rows: Vec<(i32, String, i64, String)> = sqlx::query_as(
        "SELECT a.confidence, a.outcome, a.duration_seconds, a.performed_at
         FROM attempts a
         JOIN problem_patterns pp ON pp.problem_id = a.problem_id
         WHERE a.user_id = ? AND pp.pattern_id = ? AND a.state = 'completed'
         ORDER BY a.performed_at ASC",
    )
    .bind(user_id)
    .bind(pattern_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(confidence, outcome, duration_seconds, performed_at)| CompletedAttempt {
            confidence,
            outcome: parse_outcome(&outcome),
            duration_seconds,
            performed_at: DateTime::parse_from_rfc3339(&performed_at).unwrap().with_timezone(&Utc),
        })
        .collect())
}

fn parse_outcome(s: &str) -> Outcome {
    match s {
        "failed" => Outcome::Failed,
        _ => Outcome::Passed,
    }
}

fn outcome_str(o: Outcome) -> &'static str {
    match o {
        Outcome::Passed => "passed",
        Outcome::Failed => "failed",
    }
}

async fn load_prior_sr(tx: &mut Transaction<'_, Sqlite>, user_id: &str, problem_id: &str, now: DateTime<Utc>) -> sqlx::Result<SrState> {
    let row: Option<(f64, f64, i64, String)> = sqlx::query_as(
        "SELECT interval_days, ease_factor, review_count, next_review_at FROM user_problem_stats WHERE user_id = ? AND problem_id = ?",
    )
    .bind(user_id)
    .bind(problem_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(match row {
        Some((interval_days, ease_factor, review_count, next_review_at)) => SrState {
            interval_days,
            ease_factor,
            review_count,
            next_review_at: DateTime::parse_from_rfc3339(&next_review_at).unwrap().with_timezone(&Utc),
        },
        None => SrState::initial(now),
    })
}

/// §4.3 steps 1-8: recompute a (user, problem) stats row and every linked
/// pattern's stats row, from the completed-attempt log, inside `tx`.
pub async fn recompute_and_persist(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    problem_id: &str,
    latest_confidence: i32,
    latest_outcome: Outcome,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let log = completed_attempts_for_problem(tx, user_id, problem_id).await.map_err(db_err)?;
    let agg = recompute_problem_stats(&log);

    let prior_sr = load_prior_sr(tx, user_id, problem_id, now).await.map_err(db_err)?;
    let sr = update_sr(prior_sr, latest_confidence, latest_outcome, now);

    let history_json = serde_json::to_string(&agg.recent_history).map_err(|e| DomainError::Internal(e.to_string()))?;

    sqlx::query(
        "INSERT INTO user_problem_stats
            (user_id, problem_id, status, confidence, avg_confidence, last_attempt_at, total_attempts,
             avg_time_seconds, last_outcome, recent_history_json, next_review_at, interval_days, ease_factor, review_count)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id, problem_id) DO UPDATE SET
            status = excluded.status,
            confidence = excluded.confidence,
            avg_confidence = excluded.avg_confidence,
            last_attempt_at = excluded.last_attempt_at,
            total_attempts = excluded.total_attempts,
            avg_time_seconds = excluded.avg_time_seconds,
            last_outcome = excluded.last_outcome,
            recent_history_json = excluded.recent_history_json,
            next_review_at = excluded.next_review_at,
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            review_count = excluded.review_count",
    )
    .bind(user_id)
    .bind(problem_id)
    .bind(status_str(agg.status))
    .bind(agg.confidence)
    .bind(agg.avg_confidence)
    .bind(agg.last_attempt_at.map(|t| t.to_rfc3339()))
    .bind(agg.total_attempts)
    .bind(agg.avg_time_seconds)
    .bind(agg.last_outcome.map(outcome_str))
    .bind(history_json)
    .bind(sr.next_review_at.to_rfc3339())
    .bind(sr.interval_days)
    .bind(sr.ease_factor)
    .bind(sr.review_count)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    let pattern_ids: Vec<(String,)> = sqlx::query_as("SELECT pattern_id FROM problem_patterns WHERE problem_id = ?")
        .bind(problem_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(db_err)?;

    for (pattern_id,) in pattern_ids {
        let pattern_log = completed_attempts_for_pattern(tx, user_id, &pattern_id).await.map_err(db_err)?;
        let pattern_agg = recompute_pattern_stats(&pattern_log);
        sqlx::query(
            "INSERT INTO user_pattern_stats (user_id, pattern_id, times_revised, avg_confidence, last_revised_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, pattern_id) DO UPDATE SET
                times_revised = excluded.times_revised,
                avg_confidence = excluded.avg_confidence,
                last_revised_at = excluded.last_revised_at",
        )
        .bind(user_id)
        .bind(&pattern_id)
        .bind(pattern_agg.times_revised)
        .bind(pattern_agg.avg_confidence)
        .bind(pattern_agg.last_revised_at.map(|t| t.to_rfc3339()))
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    }

    Ok(())
}

fn status_str(s: revisit_types::ProblemStatus) -> &'static str {
    match s {
        revisit_types::ProblemStatus::Unsolved => "unsolved",
        revisit_types::ProblemStatus::Solved => "solved",
        revisit_types::ProblemStatus::Abandoned => "abandoned",
    }
}

fn db_err(e: sqlx::Error) -> DomainError {
    DomainError::Internal(e.to_string())
}

/// A stats row as read back for the scoring engine and the dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserProblemStatsRow {
    pub user_id: String,
    pub problem_id: String,
    pub status: String,
    pub confidence: i32,
    pub avg_confidence: f64,
    pub last_attempt_at: Option<String>,
    pub total_attempts: i64,
    pub avg_time_seconds: Option<f64>,
    pub last_outcome: Option<String>,
    pub recent_history_json: String,
    pub next_review_at: String,
    pub interval_days: f64,
    pub ease_factor: f64,
    pub review_count: i64,
}

impl UserProblemStatsRow {
    pub fn recent_history(&self) -> Vec<HistoryEntry> {
        serde_json::from_str(&self.recent_history_json).unwrap_or_default()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserPatternStatsRow {
    pub user_id: String,
    pub pattern_id: String,
    pub times_revised: i64,
    pub avg_confidence: f64,
    pub last_revised_at: Option<String>,
}

impl Database {
    pub async fn get_problem_stats(&self, user_id: &str, problem_id: &str) -> Option<UserProblemStatsRow> {
        sqlx::query_as::<_, UserProblemStatsRow>(
            "SELECT user_id, problem_id, status, confidence, avg_confidence, last_attempt_at, total_attempts,
                    avg_time_seconds, last_outcome, recent_history_json, next_review_at, interval_days, ease_factor, review_count
             FROM user_problem_stats WHERE user_id = ? AND problem_id = ?",
        )
        .bind(user_id)
        .bind(problem_id)
        .fetch_optional(self.pool())
        .await
        .ok()
        .flatten()
    }

    /// One bulk read of every pattern stat for a user, to avoid N+1 during
    /// scoring (§4.5 `ComputeScoresForUser` requirement).
    pub async fn all_pattern_stats_for_user(&self, user_id: &str) -> crate::DbResult<Vec<UserPatternStatsRow>> {
        sqlx::query_as::<_, UserPatternStatsRow>(
            "SELECT user_id, pattern_id, times_revised, avg_confidence, last_revised_at FROM user_pattern_stats WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    pub async fn all_problem_stats_for_user(&self, user_id: &str) -> crate::DbResult<Vec<UserProblemStatsRow>> {
        sqlx::query_as::<_, UserProblemStatsRow>(
            "SELECT user_id, problem_id, status, confidence, avg_confidence, last_attempt_at, total_attempts,
                    avg_time_seconds, last_outcome, recent_history_json, next_review_at, interval_days, ease_factor, review_count
             FROM user_problem_stats WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    /// §4.5 `ComputeScoresForUser`: one bulk pattern-stats read plus one
    /// bulk problem-pattern-link read, so scoring every problem for a user
    /// is O(P + A_user) rather than N+1.
    pub async fn compute_scores_for_user(&self, user_id: &str, emphasis: revisit_types::EmphasisProfile) -> DomainResult<Vec<ScoredProblemRow>> {
        let now = Utc::now();
        let weights: revisit_core::WeightVector = self.get_weights().await.into();
        let weights = weights.with_emphasis(emphasis);

        let problems = self.list_problems().await.map_err(db_err)?;

        let pattern_stats = self.all_pattern_stats_for_user(user_id).await.map_err(db_err)?;
        let pattern_avg: std::collections::HashMap<String, f64> =
            pattern_stats.into_iter().map(|p| (p.pattern_id, p.avg_confidence)).collect();

        let links: Vec<(String, String)> = sqlx::query_as("SELECT problem_id, pattern_id FROM problem_patterns")
            .fetch_all(self.pool())
            .await
            .map_err(db_err)?;
        let mut patterns_by_problem: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
        for (problem_id, pattern_id) in links {
            patterns_by_problem.entry(problem_id).or_default().push(pattern_id);
        }

        let problem_stats = self.all_problem_stats_for_user(user_id).await.map_err(db_err)?;
        let stats_by_problem: std::collections::HashMap<String, UserProblemStatsRow> =
            problem_stats.into_iter().map(|s| (s.problem_id.clone(), s)).collect();

        let mut out = Vec::with_capacity(problems.len());
        for problem in problems {
            if let Some(stat) = stats_by_problem.get(&problem.id) {
                if stat.status == "abandoned" {
                    continue;
                }
            }
            let difficulty = revisit_types::Difficulty::parse(&problem.difficulty).unwrap_or(revisit_types::Difficulty::Medium);
            let pattern_ids = patterns_by_problem.get(&problem.id).cloned().unwrap_or_default();
            let pattern_avg_confidences: Vec<Option<f64>> = pattern_ids.iter().map(|p| pattern_avg.get(p).copied()).collect();

            let input = match stats_by_problem.get(&problem.id) {
                Some(stat) => revisit_core::ScoringInput {
                    confidence: stat.confidence,
                    next_review_at: Some(DateTime::parse_from_rfc3339(&stat.next_review_at).unwrap().with_timezone(&Utc)),
                    total_attempts: stat.total_attempts,
                    avg_confidence: stat.avg_confidence,
                    avg_time_seconds: stat.avg_time_seconds,
                    difficulty,
                    last_outcome: stat.last_outcome.as_deref().map(parse_outcome),
                    last_attempt_at: stat
                        .last_attempt_at
                        .as_ref()
                        .map(|t| DateTime::parse_from_rfc3339(t).unwrap().with_timezone(&Utc)),
                    pattern_avg_confidences,
                },
                None => revisit_core::ScoringInput::never_attempted(difficulty, pattern_avg_confidences),
            };

            let scored = revisit_core::score_with_reason(&weights, &input, now);
            out.push(ScoredProblemRow {
                problem_id: problem.id,
                difficulty,
                score: scored.score,
                reason: scored.reason,
                pattern_ids,
                confidence: input.confidence,
                last_outcome: input.last_outcome,
                last_attempt_at: input.last_attempt_at,
            });
        }

        Ok(out)
    }
}

/// A scored problem, ready to become a generator [`revisit_core::Candidate`]
/// or a `/problems/urgent` response row.
#[derive(Debug, Clone)]
pub struct ScoredProblemRow {
    pub problem_id: String,
    pub difficulty: revisit_types::Difficulty,
    pub score: f64,
    pub reason: String,
    pub pattern_ids: Vec<String>,
    pub confidence: i32,
    pub last_outcome: Option<revisit_types::Outcome>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}
