//! The scoring weight vector and its emphasis-profile transform (§4.5, §9).
//!
//! The source repo this was distilled from kept weights and emphasis
//! multipliers as ad-hoc maps and floats; this design demands a single
//! immutable weight vector type with a `with_emphasis` function that is
//! total and pure — it never panics and never mutates its input.

use revisit_types::EmphasisProfile;

/// The seven scoring weights from §4.5. Always sums to 1.0 once constructed
/// through [`WeightVector::new`] or [`WeightVector::default`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightVector {
    pub conf: f64,
    pub days: f64,
    pub attempts: f64,
    pub time: f64,
    pub difficulty: f64,
    pub failed: f64,
    pub pattern: f64,
}

impl WeightVector {
    /// Default weights from §4.5. Sum = 1.0.
    pub const fn default_weights() -> Self {
        Self {
            conf: 0.30,
            days: 0.20,
            attempts: 0.10,
            time: 0.05,
            difficulty: 0.15,
            failed: 0.10,
            pattern: 0.10,
        }
    }

    /// Build a weight vector from raw values (e.g. loaded from Settings),
    /// renormalizing so the seven components always sum to 1.0.
    pub fn new(conf: f64, days: f64, attempts: f64, time: f64, difficulty: f64, failed: f64, pattern: f64) -> Self {
        Self {
            conf,
            days,
            attempts,
            time,
            difficulty,
            failed,
            pattern,
        }
        .renormalized()
    }

    pub fn sum(&self) -> f64 {
        self.conf + self.days + self.attempts + self.time + self.difficulty + self.failed + self.pattern
    }

    fn renormalized(self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return Self::default_weights();
        }
        Self {
            conf: self.conf / sum,
            days: self.days / sum,
            attempts: self.attempts / sum,
            time: self.time / sum,
            difficulty: self.difficulty / sum,
            failed: self.failed / sum,
            pattern: self.pattern / sum,
        }
    }

    /// Apply a named emphasis profile (§4.5), renormalizing afterward.
    /// Total and pure: every profile is handled, nothing is mutated in place.
    pub fn with_emphasis(&self, profile: EmphasisProfile) -> Self {
        let mut w = *self;
        match profile {
            EmphasisProfile::Standard => {}
            EmphasisProfile::Confidence => w.conf *= 2.0,
            EmphasisProfile::Failure => w.failed *= 2.0,
            EmphasisProfile::Time => w.time *= 3.0,
        }
        w.renormalized()
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::default_weights()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn default_sums_to_one() {
        assert!((WeightVector::default().sum() - 1.0).abs() < EPS);
    }

    #[test]
    fn every_emphasis_profile_renormalizes_to_one() {
        for profile in [
            EmphasisProfile::Standard,
            EmphasisProfile::Confidence,
            EmphasisProfile::Failure,
            EmphasisProfile::Time,
        ] {
            let w = WeightVector::default().with_emphasis(profile);
            assert!((w.sum() - 1.0).abs() < EPS, "{:?} summed to {}", profile, w.sum());
        }
    }

    #[test]
    fn time_emphasis_matches_scenario_4() {
        // §8 scenario 4: default weights, emphasis="time".
        // Intermediate w_time=0.15, sum=1.10 => final w_time ≈ 0.1364.
        let w = WeightVector::default().with_emphasis(EmphasisProfile::Time);
        assert!((w.time - (0.15 / 1.10)).abs() < 1e-6);
        assert!((w.sum() - 1.0).abs() < EPS);
    }

    #[test]
    fn standard_emphasis_is_identity() {
        let base = WeightVector::default();
        let w = base.with_emphasis(EmphasisProfile::Standard);
        assert_eq!(base, w);
    }

    #[test]
    fn new_renormalizes_arbitrary_input() {
        let w = WeightVector::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert!((w.sum() - 1.0).abs() < EPS);
        assert!((w.conf - 1.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn new_falls_back_to_default_on_zero_sum() {
        let w = WeightVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(w, WeightVector::default());
    }
}
