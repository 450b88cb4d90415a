//! The scoring engine (§4.5): seven features in `[0, 1]`, a weighted sum,
//! and a short human-readable reason built from the top contributions.

use chrono::{DateTime, Utc};
use revisit_types::{Difficulty, Outcome};

use crate::weights::WeightVector;

/// Raw, per-(user, problem) state the scoring engine needs. Everything
/// optional here reflects "no stats row yet" (never attempted or created).
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub confidence: i32,
    pub next_review_at: Option<DateTime<Utc>>,
    pub total_attempts: i64,
    pub avg_confidence: f64,
    pub avg_time_seconds: Option<f64>,
    pub difficulty: Difficulty,
    pub last_outcome: Option<Outcome>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Average confidence on each pattern this problem carries; `None`
    /// means the user has no `UserPatternStats` row for that pattern yet.
    pub pattern_avg_confidences: Vec<Option<f64>>,
}

impl ScoringInput {
    /// The input for a problem the user has never created or attempted.
    pub fn never_attempted(difficulty: Difficulty, pattern_avg_confidences: Vec<Option<f64>>) -> Self {
        Self {
            confidence: 50,
            next_review_at: None,
            total_attempts: 0,
            avg_confidence: 50.0,
            avg_time_seconds: None,
            difficulty,
            last_outcome: None,
            last_attempt_at: None,
            pattern_avg_confidences,
        }
    }
}

/// The seven [0,1] features from §4.5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub conf: f64,
    pub days: f64,
    pub attempts: f64,
    pub time: f64,
    pub difficulty: f64,
    pub failed: f64,
    pub pattern: f64,
}

/// `f_conf = (100 - confidence) / 100`.
fn feature_conf(confidence: i32) -> f64 {
    (100.0 - f64::from(confidence)) / 100.0
}

/// `f_days`: due-date urgency, with the legacy days-since-last fallback.
fn feature_days(
    next_review_at: Option<DateTime<Utc>>,
    total_attempts: i64,
    avg_confidence: f64,
    last_attempt_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    match next_review_at {
        Some(due) => {
            let d = (now - due).num_seconds() as f64 / 86_400.0;
            if d >= 0.0 {
                (0.5 + 0.5 * (1.0 - (-d / 7.0).exp())).min(1.0)
            } else {
                (0.5 * (1.0 + d / 30.0)).max(0.0)
            }
        }
        None if total_attempts == 0 => {
            // Never attempted: spec.md §8 scenario 1 defines this as exactly
            // "due now" (d = 0), distinct from the legacy days-since-last
            // fallback which is reserved for rows that predate SM-2 back-fill.
            0.5
        }
        None => {
            let days_since_last = last_attempt_at
                .map(|t| (now - t).num_seconds() as f64 / 86_400.0)
                .unwrap_or(365.0);
            let mastery_multiplier = if total_attempts > 3 && avg_confidence > 90.0 {
                4.0
            } else if total_attempts > 1 && avg_confidence > 80.0 {
                2.0
            } else {
                1.0
            };
            let dynamic_cap = 90.0 * mastery_multiplier;
            days_since_last.min(dynamic_cap) / dynamic_cap
        }
    }
}

/// `f_attempts = 1 - min(total_attempts, 10) / 10`.
fn feature_attempts(total_attempts: i64) -> f64 {
    1.0 - (total_attempts.min(10) as f64) / 10.0
}

/// `f_time = min(avg_time_seconds, 3600) / 3600`, else 0.
fn feature_time(avg_time_seconds: Option<f64>) -> f64 {
    avg_time_seconds.map(|t| t.min(3600.0) / 3600.0).unwrap_or(0.0)
}

/// `f_difficulty`.
fn feature_difficulty(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.20,
        Difficulty::Medium => 0.50,
        Difficulty::Hard => 1.00,
    }
}

/// `f_failed`.
fn feature_failed(last_outcome: Option<Outcome>, last_attempt_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    if last_outcome != Some(Outcome::Failed) {
        return 0.0;
    }
    match last_attempt_at {
        Some(t) => {
            let days_since_failure = (now - t).num_seconds() as f64 / 86_400.0;
            (-days_since_failure / 30.0).exp()
        }
        None => 1.0,
    }
}

/// `f_pattern`: average of `1 - avg_conf_on_pattern/100` over the problem's
/// patterns; 0.5 for a missing stat, 0.5 if the problem has no patterns.
fn feature_pattern(pattern_avg_confidences: &[Option<f64>]) -> f64 {
    if pattern_avg_confidences.is_empty() {
        return 0.5;
    }
    let sum: f64 = pattern_avg_confidences
        .iter()
        .map(|avg| match avg {
            Some(c) => 1.0 - c / 100.0,
            None => 0.5,
        })
        .sum();
    sum / pattern_avg_confidences.len() as f64
}

/// Compute all seven features for a (user, problem) at a point in time.
pub fn compute_features(input: &ScoringInput, now: DateTime<Utc>) -> Features {
    Features {
        conf: feature_conf(input.confidence),
        days: feature_days(
            input.next_review_at,
            input.total_attempts,
            input.avg_confidence,
            input.last_attempt_at,
            now,
        ),
        attempts: feature_attempts(input.total_attempts),
        time: feature_time(input.avg_time_seconds),
        difficulty: feature_difficulty(input.difficulty),
        failed: feature_failed(input.last_outcome, input.last_attempt_at, now),
        pattern: feature_pattern(&input.pattern_avg_confidences),
    }
}

/// The seven weighted contributions, in the table order used for reason
/// generation and for the fixed tie-break order below.
fn contributions(weights: &WeightVector, features: &Features) -> [(&'static str, f64); 7] {
    [
        ("conf", weights.conf * features.conf),
        ("days", weights.days * features.days),
        ("attempts", weights.attempts * features.attempts),
        ("time", weights.time * features.time),
        ("difficulty", weights.difficulty * features.difficulty),
        ("failed", weights.failed * features.failed),
        ("pattern", weights.pattern * features.pattern),
    ]
}

/// `score = Σ wᵢ·fᵢ`, clamped to `[0, 1]` as a safety net (it is already in
/// range for any valid weight vector and feature set).
pub fn score_problem(weights: &WeightVector, features: &Features) -> f64 {
    contributions(weights, features)
        .iter()
        .map(|(_, c)| c)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// A single problem's computed score, with enough detail to render a reason.
#[derive(Debug, Clone)]
pub struct ScoredProblem {
    pub score: f64,
    pub features: Features,
    pub reason: String,
}

/// Phrase a single feature contribution for the human-readable reason.
fn phrase(name: &str, features: &Features, input: &ScoringInput, now: DateTime<Utc>) -> String {
    match name {
        "conf" => {
            if input.total_attempts == 0 {
                "never attempted".to_string()
            } else {
                format!("confidence {}%", input.confidence)
            }
        }
        "days" => {
            if let Some(due) = input.next_review_at {
                let d = ((now - due).num_seconds() as f64 / 86_400.0).round() as i64;
                if d >= 1 {
                    format!("{d} days overdue")
                } else if d == 0 {
                    "due today".to_string()
                } else {
                    format!("due in {} days", -d)
                }
            } else {
                "long overdue".to_string()
            }
        }
        "attempts" => format!("only {} attempts", input.total_attempts),
        "time" => "long solve time".to_string(),
        "difficulty" => "high difficulty".to_string(),
        "failed" => "failed recently".to_string(),
        "pattern" => "weak pattern".to_string(),
        _ => unreachable!(),
    }
}

/// Build the reason string from the top three qualifying contributions
/// (§4.5): sorted descending, ties broken by the table order above, only
/// contributions `> 0.01` count, "Needs review" if none qualify.
fn build_reason(weights: &WeightVector, features: &Features, input: &ScoringInput, now: DateTime<Utc>) -> String {
    let mut ranked: Vec<(&'static str, f64)> = contributions(weights, features)
        .into_iter()
        .filter(|(_, c)| *c > 0.01)
        .collect();
    // Stable sort preserves the table order (our declared tie-break) among equal contributions.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if ranked.is_empty() {
        return "Needs review".to_string();
    }

    ranked
        .into_iter()
        .take(3)
        .map(|(name, _)| phrase(name, features, input, now))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Score a single problem end-to-end: features, weighted score, and reason.
pub fn score_with_reason(weights: &WeightVector, input: &ScoringInput, now: DateTime<Utc>) -> ScoredProblem {
    let features = compute_features(input, now);
    let score = score_problem(weights, &features);
    let reason = build_reason(weights, &features, input, now);
    ScoredProblem { score, features, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_types::Difficulty;

    fn eps(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn scenario_1_never_attempted() {
        // §8 scenario 1.
        let now = Utc::now();
        let input = ScoringInput::never_attempted(Difficulty::Medium, vec![]);
        let features = compute_features(&input, now);
        assert!(eps(features.conf, 0.5));
        assert!(eps(features.days, 0.5));
        assert!(eps(features.attempts, 1.0));
        assert!(eps(features.time, 0.0));
        assert!(eps(features.difficulty, 0.5));
        assert!(eps(features.failed, 0.0));
        assert!(eps(features.pattern, 0.5));

        let weights = WeightVector::default();
        let score = score_problem(&weights, &features);
        assert!((score - 0.475).abs() < 1e-9, "got {score}");

        let scored = score_with_reason(&weights, &input, now);
        assert!(scored.reason.contains("never attempted"));
        assert!(scored.reason.contains("only 0 attempts"));
    }

    #[test]
    fn score_is_always_in_unit_range() {
        let now = Utc::now();
        let weights = WeightVector::default();
        let cases = [
            ScoringInput::never_attempted(Difficulty::Hard, vec![Some(10.0), None]),
            ScoringInput {
                confidence: 100,
                next_review_at: Some(now - chrono::Duration::days(40)),
                total_attempts: 20,
                avg_confidence: 95.0,
                avg_time_seconds: Some(10_000.0),
                difficulty: Difficulty::Hard,
                last_outcome: Some(Outcome::Failed),
                last_attempt_at: Some(now - chrono::Duration::days(1)),
                pattern_avg_confidences: vec![Some(0.0), Some(100.0)],
            },
        ];
        for input in cases {
            let features = compute_features(&input, now);
            let score = score_problem(&weights, &features);
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn determinism_same_input_same_output() {
        let now = Utc::now();
        let weights = WeightVector::default();
        let input = ScoringInput::never_attempted(Difficulty::Easy, vec![]);
        let a = score_with_reason(&weights, &input, now);
        let b = score_with_reason(&weights, &input, now);
        assert_eq!(a.score, b.score);
        assert_eq!(a.reason, b.reason);
    }

    #[test]
    fn no_qualifying_contribution_yields_needs_review() {
        let zero_weights = WeightVector::new(0.0001, 0.0001, 0.0001, 0.0001, 0.0001, 0.0001, 0.9994);
        let now = Utc::now();
        let input = ScoringInput {
            confidence: 100,
            next_review_at: Some(now + chrono::Duration::days(30)),
            total_attempts: 10,
            avg_confidence: 100.0,
            avg_time_seconds: Some(0.0),
            difficulty: Difficulty::Easy,
            last_outcome: None,
            last_attempt_at: None,
            pattern_avg_confidences: vec![Some(100.0)],
        };
        // All features near zero here except pattern, whose weight is ~1 but
        // feature value (1 - 100/100 = 0) is also zero, so every contribution
        // falls under the 0.01 threshold.
        let scored = score_with_reason(&zero_weights, &input, now);
        assert_eq!(scored.reason, "Needs review");
    }

    #[test]
    fn failed_recently_decays_with_half_life() {
        let now = Utc::now();
        let recent = feature_failed(Some(Outcome::Failed), Some(now), now);
        assert!(eps(recent, 1.0));
        let old = feature_failed(Some(Outcome::Failed), Some(now - chrono::Duration::days(30)), now);
        assert!(old < 0.4 && old > 0.3);
        let not_failed = feature_failed(Some(Outcome::Passed), Some(now), now);
        assert!(eps(not_failed, 0.0));
    }
}
