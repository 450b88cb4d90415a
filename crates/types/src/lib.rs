//! Shared wire types for the practice-scheduler service.
//!
//! Everything here is plain data: no database handle, no HTTP framework.
//! `crates/db` maps these to/from SQL rows; `crates/server` maps them
//! to/from JSON. Primary keys are opaque strings (ULIDs rendered as text) —
//! callers must never assume they are integers.

pub mod id;

pub use id::Id;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A problem's relative difficulty. Ordered `Easy < Medium < Hard` so
/// generator difficulty-cap comparisons (`difficulty <= cap`) read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// A user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Lifecycle state of a practice attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    InProgress,
    Completed,
    Abandoned,
}

/// Timer state carried by in-progress attempts and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Outcome of a completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
}

/// Status of a (user, problem) stats row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStatus {
    Unsolved,
    Solved,
    Abandoned,
}

/// Named emphasis profiles applied to the scoring weight vector (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmphasisProfile {
    Standard,
    Confidence,
    Failure,
    Time,
}

impl Default for EmphasisProfile {
    fn default() -> Self {
        EmphasisProfile::Standard
    }
}

/// How a session template restricts candidates by pattern (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    All,
    Weakest,
    Specific,
    MultiPattern,
}

/// A problem row as exposed over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: Id,
    pub title: String,
    pub source: Option<String>,
    pub url: Option<String>,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

/// A pattern (abstract technique tag).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
}

/// The per-(user, problem) scoring substrate (§3 UserProblemStats).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProblemStats {
    pub user_id: Id,
    pub problem_id: Id,
    pub status: ProblemStatus,
    pub confidence: i32,
    pub avg_confidence: f64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub total_attempts: i64,
    pub avg_time_seconds: Option<f64>,
    pub last_outcome: Option<Outcome>,
    pub recent_history: Vec<HistoryEntry>,
    pub next_review_at: DateTime<Utc>,
    pub interval_days: f64,
    pub ease_factor: f64,
    pub review_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub outcome: Outcome,
    pub performed_at: DateTime<Utc>,
}

/// The per-(user, pattern) rollup (§3 UserPatternStats).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatternStats {
    pub user_id: Id,
    pub pattern_id: Id,
    pub times_revised: i64,
    pub avg_confidence: f64,
    pub last_revised_at: Option<DateTime<Utc>>,
}

/// An attempt record (§3 Attempt).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Id,
    pub user_id: Id,
    pub problem_id: Id,
    pub session_id: Option<Id>,
    pub state: AttemptState,
    pub elapsed_seconds: i64,
    pub timer_state: TimerState,
    pub last_timer_update: DateTime<Utc>,
    pub confidence: Option<i32>,
    pub outcome: Option<Outcome>,
    pub duration_seconds: Option<i64>,
    pub notes: Option<String>,
    pub performed_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
}

/// An ordered practice session (§3 RevisionSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSession {
    pub id: Id,
    pub user_id: Id,
    pub template_key: Option<String>,
    pub planned_duration_min: i32,
    pub problem_ids: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: i64,
    pub timer_state: TimerState,
}

/// The taxonomy of domain errors from spec.md §7, kind only (no HTTP mapping
/// lives in this crate — that belongs to `crates/server::error`).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("constraint error: {constraint} (required {required}, available {available})")]
    Constraint {
        constraint: String,
        required: usize,
        available: usize,
    },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_roundtrip() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::parse(d.as_str()), Some(d));
        }
    }

    #[test]
    fn difficulty_parse_rejects_unknown() {
        assert_eq!(Difficulty::parse("nightmare"), None);
    }
}
