//! Session templates (§4.6): the static catalog of named session shapes the
//! generator is configured from.

use revisit_types::{Difficulty, EmphasisProfile, PatternMode};

/// Broad grouping used by the dashboard to bucket templates for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateCategory {
    Daily,
    Pattern,
    Weekend,
}

/// A target distribution over difficulty, as a fraction of the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyDistribution {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

/// A named, fixed session shape (§4.6). Built as static data rather than
/// rows in the database: templates are part of the deployed behavior, not
/// user content.
#[derive(Debug, Clone, Copy)]
pub struct SessionTemplate {
    pub key: &'static str,
    pub display_name: &'static str,
    pub category: TemplateCategory,
    pub planned_duration_min: i32,
    pub max_difficulty: Difficulty,
    pub difficulty_distribution: Option<DifficultyDistribution>,
    pub min_quick_wins: i32,
    pub max_same_pattern: i32,
    pub min_total_problems: i32,
    pub min_distinct_patterns: i32,
    pub pattern_mode: PatternMode,
    /// Number of weakest patterns to draw from when `pattern_mode` is `Weakest`.
    pub weakest_pattern_count: i32,
    pub emphasis: EmphasisProfile,
    pub confidence_floor: Option<i32>,
    pub confidence_ceiling: Option<i32>,
    pub min_days_since_last: Option<i64>,
    pub adaptive_difficulty: bool,
    /// Order problems by progression (quick wins first) rather than score descending.
    pub progression_ordering: bool,
}

/// All templates the generator can build a session from. Order is
/// significant only for display; lookups are by `key`.
pub static TEMPLATES: &[SessionTemplate] = &[
    SessionTemplate {
        key: "morning_momentum",
        display_name: "Morning Momentum",
        category: TemplateCategory::Daily,
        planned_duration_min: 30,
        max_difficulty: Difficulty::Medium,
        difficulty_distribution: Some(DifficultyDistribution {
            easy: 0.5,
            medium: 0.5,
            hard: 0.0,
        }),
        min_quick_wins: 2,
        max_same_pattern: 2,
        min_total_problems: 4,
        min_distinct_patterns: 2,
        pattern_mode: PatternMode::All,
        weakest_pattern_count: 0,
        emphasis: EmphasisProfile::Confidence,
        confidence_floor: None,
        confidence_ceiling: None,
        min_days_since_last: None,
        adaptive_difficulty: true,
        progression_ordering: true,
    },
    SessionTemplate {
        key: "pattern_rotation",
        display_name: "Pattern Rotation",
        category: TemplateCategory::Pattern,
        planned_duration_min: 45,
        max_difficulty: Difficulty::Hard,
        difficulty_distribution: None,
        min_quick_wins: 1,
        max_same_pattern: 3,
        min_total_problems: 5,
        min_distinct_patterns: 3,
        pattern_mode: PatternMode::Weakest,
        weakest_pattern_count: 3,
        emphasis: EmphasisProfile::Standard,
        confidence_floor: None,
        confidence_ceiling: None,
        min_days_since_last: None,
        adaptive_difficulty: false,
        progression_ordering: false,
    },
    SessionTemplate {
        key: "failure_recovery",
        display_name: "Failure Recovery",
        category: TemplateCategory::Daily,
        planned_duration_min: 30,
        max_difficulty: Difficulty::Medium,
        difficulty_distribution: None,
        min_quick_wins: 1,
        max_same_pattern: 2,
        min_total_problems: 3,
        min_distinct_patterns: 1,
        pattern_mode: PatternMode::All,
        weakest_pattern_count: 0,
        emphasis: EmphasisProfile::Failure,
        confidence_floor: None,
        confidence_ceiling: None,
        min_days_since_last: None,
        adaptive_difficulty: true,
        progression_ordering: true,
    },
    SessionTemplate {
        key: "weekend_deep_dive",
        display_name: "Weekend Deep Dive",
        category: TemplateCategory::Weekend,
        planned_duration_min: 90,
        max_difficulty: Difficulty::Hard,
        difficulty_distribution: Some(DifficultyDistribution {
            easy: 0.2,
            medium: 0.3,
            hard: 0.5,
        }),
        min_quick_wins: 1,
        max_same_pattern: 3,
        min_total_problems: 6,
        min_distinct_patterns: 3,
        pattern_mode: PatternMode::All,
        weakest_pattern_count: 0,
        emphasis: EmphasisProfile::Time,
        confidence_floor: None,
        confidence_ceiling: None,
        min_days_since_last: None,
        adaptive_difficulty: false,
        progression_ordering: false,
    },
    SessionTemplate {
        key: "confidence_builder",
        display_name: "Confidence Builder",
        category: TemplateCategory::Daily,
        planned_duration_min: 20,
        max_difficulty: Difficulty::Easy,
        difficulty_distribution: Some(DifficultyDistribution {
            easy: 1.0,
            medium: 0.0,
            hard: 0.0,
        }),
        min_quick_wins: 3,
        max_same_pattern: 4,
        min_total_problems: 3,
        min_distinct_patterns: 1,
        pattern_mode: PatternMode::All,
        weakest_pattern_count: 0,
        emphasis: EmphasisProfile::Confidence,
        confidence_floor: None,
        confidence_ceiling: Some(70),
        min_days_since_last: None,
        adaptive_difficulty: false,
        progression_ordering: true,
    },
];

/// Look up a template by its stable key.
pub fn by_key(key: &str) -> Option<&'static SessionTemplate> {
    TEMPLATES.iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_templates_exist() {
        assert!(by_key("morning_momentum").is_some());
        assert!(by_key("pattern_rotation").is_some());
    }

    #[test]
    fn unknown_key_returns_none() {
        assert!(by_key("does_not_exist").is_none());
    }

    #[test]
    fn every_template_has_consistent_minimums() {
        for t in TEMPLATES {
            assert!(t.min_total_problems > 0, "{} has no minimum size", t.key);
            assert!(t.min_distinct_patterns >= 1, "{} allows zero patterns", t.key);
            if let Some(dist) = t.difficulty_distribution {
                let sum = dist.easy + dist.medium + dist.hard;
                assert!((sum - 1.0).abs() < 1e-9, "{} distribution sums to {sum}", t.key);
            }
        }
    }
}
