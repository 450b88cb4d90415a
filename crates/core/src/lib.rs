//! Pure domain logic for the practice scheduler: no I/O, no database, no
//! HTTP. Everything here is deterministic and can be exercised with plain
//! unit tests.

pub mod generator;
pub mod scoring;
pub mod sm2;
pub mod stats;
pub mod templates;
pub mod weights;

pub use generator::{select_session, Candidate, ConstraintKind, GeneratorError, SelectionConfig};
pub use scoring::{compute_features, score_problem, score_with_reason, Features, ScoredProblem, ScoringInput};
pub use sm2::{quality_from_input, update_sr, SrState};
pub use stats::{
    recompute_pattern_stats, recompute_problem_stats, CompletedAttempt, PatternStatsAggregate, ProblemStatsAggregate,
};
pub use templates::{DifficultyDistribution, SessionTemplate, TemplateCategory, TEMPLATES};
pub use weights::WeightVector;
