//! Pure aggregation math for the stats aggregator (§4.3): given a user's
//! full attempt log for a problem (or pattern), recompute the derived
//! stats row from scratch. The recompute-from-log variant is preferred
//! over incremental updates per §4.3 item 3 and §9's resolved open
//! question — it cannot drift.

use chrono::{DateTime, Utc};
use revisit_types::{HistoryEntry, Outcome, ProblemStatus};

/// A single completed attempt, as read back from the attempt log, ordered
/// by `performed_at` ascending by the caller.
#[derive(Debug, Clone)]
pub struct CompletedAttempt {
    pub confidence: i32,
    pub outcome: Outcome,
    pub duration_seconds: i64,
    pub performed_at: DateTime<Utc>,
}

/// The `UserProblemStats` fields derived purely from the completed-attempt
/// log (the SM-2 triple is computed separately by [`crate::sm2`] and folded
/// in by the caller, since it needs the prior SR state, not just the log).
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemStatsAggregate {
    pub total_attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<Outcome>,
    pub confidence: i32,
    pub avg_confidence: f64,
    pub avg_time_seconds: Option<f64>,
    pub status: ProblemStatus,
    pub recent_history: Vec<HistoryEntry>,
}

/// Recompute §4.3 items 1-6 from the full completed-attempt log for a
/// (user, problem) pair. `attempts` must be sorted `performed_at` ascending.
/// Returns defaults (confidence=50, avg=50, unsolved) for an empty log,
/// matching a freshly-initialized stats row.
pub fn recompute_problem_stats(attempts: &[CompletedAttempt]) -> ProblemStatsAggregate {
    if attempts.is_empty() {
        return ProblemStatsAggregate {
            total_attempts: 0,
            last_attempt_at: None,
            last_outcome: None,
            confidence: 50,
            avg_confidence: 50.0,
            avg_time_seconds: None,
            status: ProblemStatus::Unsolved,
            recent_history: Vec::new(),
        };
    }

    let total_attempts = attempts.len() as i64;
    let last = attempts.last().expect("checked non-empty above");

    let avg_confidence = attempts.iter().map(|a| f64::from(a.confidence)).sum::<f64>() / total_attempts as f64;
    let avg_time_seconds = attempts.iter().map(|a| a.duration_seconds as f64).sum::<f64>() / total_attempts as f64;

    let status = if attempts.iter().any(|a| a.outcome == Outcome::Passed && a.confidence >= 50) {
        ProblemStatus::Solved
    } else {
        ProblemStatus::Unsolved
    };

    // Oldest-to-newest, capped at the five most recent (§4.3 item 6).
    let mut recent_history: Vec<HistoryEntry> = attempts
        .iter()
        .rev()
        .take(5)
        .map(|a| HistoryEntry {
            outcome: a.outcome,
            performed_at: a.performed_at,
        })
        .collect();
    recent_history.reverse();

    ProblemStatsAggregate {
        total_attempts,
        last_attempt_at: Some(last.performed_at),
        last_outcome: Some(last.outcome),
        confidence: last.confidence,
        avg_confidence,
        avg_time_seconds: Some(avg_time_seconds),
        status,
        recent_history,
    }
}

/// A `UserPatternStats` aggregate (§4.3 item 8, §3): recomputed from the set
/// of the user's completed attempts on any problem carrying the pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStatsAggregate {
    pub times_revised: i64,
    pub avg_confidence: f64,
    pub last_revised_at: Option<DateTime<Utc>>,
}

/// Recompute a user's stats for a single pattern from every completed
/// attempt on any problem carrying it.
pub fn recompute_pattern_stats(attempts: &[CompletedAttempt]) -> PatternStatsAggregate {
    if attempts.is_empty() {
        return PatternStatsAggregate {
            times_revised: 0,
            avg_confidence: 0.0,
            last_revised_at: None,
        };
    }
    let times_revised = attempts.len() as i64;
    let avg_confidence = attempts.iter().map(|a| f64::from(a.confidence)).sum::<f64>() / times_revised as f64;
    let last_revised_at = attempts.iter().map(|a| a.performed_at).max();
    PatternStatsAggregate {
        times_revised,
        avg_confidence,
        last_revised_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attempt(confidence: i32, outcome: Outcome, duration_seconds: i64, days_ago: i64) -> CompletedAttempt {
        CompletedAttempt {
            confidence,
            outcome,
            duration_seconds,
            performed_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn empty_log_yields_fresh_defaults() {
        let agg = recompute_problem_stats(&[]);
        assert_eq!(agg.total_attempts, 0);
        assert_eq!(agg.confidence, 50);
        assert_eq!(agg.avg_confidence, 50.0);
        assert_eq!(agg.status, ProblemStatus::Unsolved);
        assert!(agg.recent_history.is_empty());
    }

    #[test]
    fn confidence_tracks_latest_attempt() {
        let log = vec![
            attempt(30, Outcome::Failed, 600, 3),
            attempt(85, Outcome::Passed, 300, 1),
        ];
        let agg = recompute_problem_stats(&log);
        assert_eq!(agg.confidence, 85);
        assert_eq!(agg.total_attempts, 2);
        assert_eq!(agg.avg_confidence, 57.5);
        assert_eq!(agg.avg_time_seconds, Some(450.0));
    }

    #[test]
    fn solved_requires_a_pass_at_or_above_50_confidence() {
        let not_solved = vec![attempt(40, Outcome::Passed, 100, 1)];
        assert_eq!(recompute_problem_stats(&not_solved).status, ProblemStatus::Unsolved);

        let solved = vec![attempt(60, Outcome::Passed, 100, 1)];
        assert_eq!(recompute_problem_stats(&solved).status, ProblemStatus::Solved);
    }

    #[test]
    fn recent_history_caps_at_five_most_recent() {
        let log: Vec<CompletedAttempt> = (0..8)
            .map(|i| attempt(50 + i, Outcome::Passed, 100, 8 - i as i64))
            .collect();
        let agg = recompute_problem_stats(&log);
        assert_eq!(agg.recent_history.len(), 5);
        // Most recent attempt (days_ago=1) should be last in the list (oldest-to-newest kept).
        assert_eq!(agg.recent_history.last().unwrap().performed_at, log.last().unwrap().performed_at);
    }

    #[test]
    fn recompute_from_scratch_matches_incremental_expectation() {
        // Idempotence law (§8): recomputing from the full log twice agrees.
        let log = vec![
            attempt(20, Outcome::Failed, 500, 5),
            attempt(55, Outcome::Passed, 200, 3),
            attempt(90, Outcome::Passed, 150, 1),
        ];
        let a = recompute_problem_stats(&log);
        let b = recompute_problem_stats(&log);
        assert_eq!(a, b);
        assert_eq!(a.total_attempts, 3);
    }

    #[test]
    fn pattern_stats_recompute_from_attempts_on_carrying_problems() {
        let log = vec![attempt(40, Outcome::Failed, 100, 5), attempt(80, Outcome::Passed, 100, 1)];
        let agg = recompute_pattern_stats(&log);
        assert_eq!(agg.times_revised, 2);
        assert_eq!(agg.avg_confidence, 60.0);
        assert_eq!(agg.last_revised_at, Some(log[1].performed_at));
    }

    #[test]
    fn pattern_stats_empty_is_zeroed() {
        let agg = recompute_pattern_stats(&[]);
        assert_eq!(agg.times_revised, 0);
        assert_eq!(agg.last_revised_at, None);
    }
}
