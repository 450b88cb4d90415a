//! Spaced-repetition scheduling: an SM-2 adaptation (§4.4).
//!
//! Deliberately takes `now` as a parameter rather than reading the clock
//! itself, so the recurrence is pure and the end-to-end scenarios in §8 can
//! be asserted bit-for-bit.

use chrono::{DateTime, Duration, Utc};
use revisit_types::Outcome;

const EASE_FLOOR: f64 = 1.3;
const INITIAL_EASE: f64 = 2.5;
const INITIAL_INTERVAL_DAYS: f64 = 1.0;

/// The spaced-repetition triple carried on `UserProblemStats` (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrState {
    pub interval_days: f64,
    pub ease_factor: f64,
    pub review_count: i64,
    pub next_review_at: DateTime<Utc>,
}

impl SrState {
    /// Initial row for a never-attempted problem: due immediately (§4.4).
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            interval_days: INITIAL_INTERVAL_DAYS,
            ease_factor: INITIAL_EASE,
            review_count: 0,
            next_review_at: now - Duration::days(1),
        }
    }
}

/// Map a (confidence, outcome) reading to an SM-2 quality rating 0..=5 (§4.4 table).
pub fn quality_from_input(confidence: i32, outcome: Outcome) -> u8 {
    if outcome == Outcome::Failed {
        return 0;
    }
    if confidence < 20 {
        1
    } else if confidence < 40 {
        2
    } else if confidence < 60 {
        3
    } else if confidence < 80 {
        4
    } else {
        5
    }
}

/// Apply the SM-2 recurrence (§4.4) to produce the next SR state.
pub fn update_sr(prior: SrState, confidence: i32, outcome: Outcome, now: DateTime<Utc>) -> SrState {
    let q = quality_from_input(confidence, outcome);
    let SrState {
        interval_days: i,
        ease_factor: e,
        review_count: n,
        ..
    } = prior;

    let (interval, ease) = if q >= 3 {
        let interval = if n == 0 {
            1.0
        } else if n == 1 {
            6.0
        } else {
            (i * e).round()
        };
        let q5 = 5.0 - f64::from(q);
        let ease = (e + 0.1 - q5 * (0.08 + q5 * 0.02)).max(EASE_FLOOR);
        (interval, ease)
    } else {
        (1.0, (e - 0.2).max(EASE_FLOOR))
    };

    SrState {
        interval_days: interval.max(1.0),
        ease_factor: ease,
        review_count: n + 1,
        next_review_at: now + Duration::days(interval.max(1.0).round() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eps(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn initial_state_is_immediately_due() {
        let now = Utc::now();
        let s = SrState::initial(now);
        assert!(eps(s.interval_days, 1.0));
        assert!(eps(s.ease_factor, 2.5));
        assert_eq!(s.review_count, 0);
        assert!(s.next_review_at < now);
    }

    #[test]
    fn quality_mapping_matches_table() {
        assert_eq!(quality_from_input(10, Outcome::Passed), 1);
        assert_eq!(quality_from_input(25, Outcome::Passed), 2);
        assert_eq!(quality_from_input(45, Outcome::Passed), 3);
        assert_eq!(quality_from_input(65, Outcome::Passed), 4);
        assert_eq!(quality_from_input(95, Outcome::Passed), 5);
        assert_eq!(quality_from_input(95, Outcome::Failed), 0);
    }

    #[test]
    fn scenario_2_first_pass() {
        // §8 scenario 2: (I=1, E=2.5, n=0), pass/confidence=85 (q=5).
        let prior = SrState {
            interval_days: 1.0,
            ease_factor: 2.5,
            review_count: 0,
            next_review_at: Utc::now(),
        };
        let now = Utc::now();
        let next = update_sr(prior, 85, Outcome::Passed, now);
        assert!(eps(next.interval_days, 1.0));
        assert!(eps(next.ease_factor, 2.6));
        assert_eq!(next.review_count, 1);
        assert_eq!(next.next_review_at.date_naive(), (now + Duration::days(1)).date_naive());
    }

    #[test]
    fn scenario_3_on_failure() {
        // §8 scenario 3: (I=14, E=2.6, n=3), failed.
        let prior = SrState {
            interval_days: 14.0,
            ease_factor: 2.6,
            review_count: 3,
            next_review_at: Utc::now(),
        };
        let now = Utc::now();
        let next = update_sr(prior, 10, Outcome::Failed, now);
        assert!(eps(next.interval_days, 1.0));
        assert!(eps(next.ease_factor, 2.4));
        assert_eq!(next.review_count, 4);
    }

    #[test]
    fn ease_factor_never_drops_below_floor() {
        let prior = SrState {
            interval_days: 1.0,
            ease_factor: 1.35,
            review_count: 5,
            next_review_at: Utc::now(),
        };
        let next = update_sr(prior, 0, Outcome::Failed, Utc::now());
        assert!(next.ease_factor >= 1.3);
    }

    #[test]
    fn second_review_uses_fixed_six_day_interval() {
        let prior = SrState {
            interval_days: 1.0,
            ease_factor: 2.6,
            review_count: 1,
            next_review_at: Utc::now(),
        };
        let next = update_sr(prior, 90, Outcome::Passed, Utc::now());
        assert!(eps(next.interval_days, 6.0));
    }

    #[test]
    fn review_count_is_monotonic() {
        let mut state = SrState::initial(Utc::now());
        let mut prev_count = state.review_count;
        for conf in [80, 85, 40, 10, 90] {
            let outcome = if conf >= 50 { Outcome::Passed } else { Outcome::Failed };
            state = update_sr(state, conf, outcome, Utc::now());
            assert!(state.review_count >= prev_count);
            prev_count = state.review_count;
            assert!(state.interval_days >= 1.0);
            assert!(state.ease_factor >= 1.3);
        }
    }
}
