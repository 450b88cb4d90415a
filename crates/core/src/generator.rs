//! The session generator's constraint solver (§4.7).
//!
//! Pattern-mode filtering (`all` / `weakest` / `specific` / `multi_pattern`)
//! happens upstream of this module, because it needs `UserPatternStats`
//! lookups the generator itself has no business knowing about. What lands
//! here is an already pattern-filtered candidate set; this module owns the
//! confidence/days-since/difficulty hard filters, the quick-win floor, the
//! difficulty distribution, the greedy selection with pattern caps, and the
//! final distinct-pattern repair pass.

use chrono::{DateTime, Utc};
use revisit_types::{Difficulty, Id, Outcome};

use crate::templates::DifficultyDistribution;

/// A scored problem eligible for session selection.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub problem_id: Id,
    pub score: f64,
    pub difficulty: Difficulty,
    pub confidence: i32,
    pub last_outcome: Option<Outcome>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub pattern_ids: Vec<Id>,
}

/// The resolved constraint object a template (or custom override) compiles
/// down to (§4.6). Pattern-mode selection is assumed already applied to the
/// candidate set passed to [`select_session`].
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub planned_duration_min: i32,
    pub max_difficulty: Difficulty,
    pub difficulty_distribution: Option<DifficultyDistribution>,
    pub min_quick_wins: i32,
    pub max_same_pattern: i32,
    pub min_total_problems: i32,
    pub min_distinct_patterns: i32,
    pub confidence_floor: Option<i32>,
    pub confidence_ceiling: Option<i32>,
    pub min_days_since_last: Option<i64>,
    pub progression_ordering: bool,
}

/// Which constraint a generation attempt failed to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    QuickWins,
    Difficulty,
    DistinctPatterns,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("constraint '{constraint:?}' not satisfiable: required {required}, available {available}")]
pub struct GeneratorError {
    pub constraint: ConstraintKind,
    pub required: i32,
    pub available: i32,
}

fn is_quick_win(c: &Candidate) -> bool {
    c.confidence >= 70 && c.last_outcome != Some(Outcome::Failed)
}

fn days_since_last(c: &Candidate, now: DateTime<Utc>) -> i64 {
    c.last_attempt_at
        .map(|t| (now - t).num_days())
        .unwrap_or(i64::MAX)
}

/// Step 1: difficulty cap, confidence band, and min-days-since-last.
fn hard_filter(candidates: &[Candidate], config: &SelectionConfig, now: DateTime<Utc>) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| c.difficulty <= config.max_difficulty)
        .filter(|c| config.confidence_floor.map_or(true, |f| c.confidence >= f))
        .filter(|c| config.confidence_ceiling.map_or(true, |ceil| c.confidence <= ceil))
        .filter(|c| config.min_days_since_last.map_or(true, |d| days_since_last(c, now) >= d))
        .cloned()
        .collect()
}

/// Step 3: target counts per difficulty from a provisional total, largest-remainder rounding.
fn difficulty_targets(dist: DifficultyDistribution, total: i32) -> [(Difficulty, i32); 3] {
    let total_f = f64::from(total);
    let raw = [
        (Difficulty::Easy, dist.easy * total_f),
        (Difficulty::Medium, dist.medium * total_f),
        (Difficulty::Hard, dist.hard * total_f),
    ];
    let mut floors: Vec<(Difficulty, i32, f64)> = raw
        .iter()
        .map(|(d, r)| (*d, r.floor() as i32, r.fract()))
        .collect();
    let assigned: i32 = floors.iter().map(|(_, n, _)| n).sum();
    let mut remainder = total - assigned;
    floors.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    let mut i = 0;
    while remainder > 0 && !floors.is_empty() {
        floors[i % floors.len()].1 += 1;
        remainder -= 1;
        i += 1;
    }
    let mut out = [(Difficulty::Easy, 0), (Difficulty::Medium, 0), (Difficulty::Hard, 0)];
    for (d, n, _) in floors {
        match d {
            Difficulty::Easy => out[0] = (d, n),
            Difficulty::Medium => out[1] = (d, n),
            Difficulty::Hard => out[2] = (d, n),
        }
    }
    out
}

fn provisional_total(config: &SelectionConfig) -> i32 {
    let by_duration = ((config.planned_duration_min as f64) / 15.0).ceil() as i32;
    config.min_total_problems.max(by_duration)
}

fn count_by_difficulty(candidates: &[Candidate], d: Difficulty) -> i32 {
    candidates.iter().filter(|c| c.difficulty == d).count() as i32
}

/// Run the full §4.7 algorithm over an already pattern-filtered candidate set.
pub fn select_session(
    candidates: &[Candidate],
    config: &SelectionConfig,
    now: DateTime<Utc>,
) -> Result<Vec<Candidate>, GeneratorError> {
    let filtered = hard_filter(candidates, config, now);

    // Step 2: quick-win pool.
    let quick_win_pool: Vec<&Candidate> = filtered.iter().filter(|c| is_quick_win(c)).collect();
    if (quick_win_pool.len() as i32) < config.min_quick_wins {
        return Err(GeneratorError {
            constraint: ConstraintKind::QuickWins,
            required: config.min_quick_wins,
            available: quick_win_pool.len() as i32,
        });
    }

    let total = provisional_total(config);

    // Step 3: distribution targets and feasibility.
    let targets: Option<[(Difficulty, i32); 3]> = config.difficulty_distribution.map(|dist| {
        let t = difficulty_targets(dist, total);
        t
    });
    if let Some(targets) = targets {
        for (d, required) in targets {
            let available = count_by_difficulty(&filtered, d);
            if available < required {
                return Err(GeneratorError {
                    constraint: ConstraintKind::Difficulty,
                    required,
                    available,
                });
            }
        }
    }

    // Step 4: greedy selection.
    let mut by_score_desc = filtered.clone();
    by_score_desc.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.last_attempt_at.cmp(&b.last_attempt_at))
            .then_with(|| a.confidence.cmp(&b.confidence))
            .then_with(|| a.problem_id.cmp(&b.problem_id))
    });

    let mut selected: Vec<Candidate> = Vec::new();
    let mut pattern_counts: std::collections::HashMap<Id, i32> = std::collections::HashMap::new();
    let mut difficulty_counts: std::collections::HashMap<Difficulty, i32> = std::collections::HashMap::new();
    let mut chosen_ids: std::collections::HashSet<Id> = std::collections::HashSet::new();

    let fits_pattern_cap = |c: &Candidate, pattern_counts: &std::collections::HashMap<Id, i32>| {
        c.pattern_ids
            .iter()
            .all(|p| *pattern_counts.get(p).unwrap_or(&0) < config.max_same_pattern)
    };

    let record = |c: &Candidate,
                  pattern_counts: &mut std::collections::HashMap<Id, i32>,
                  difficulty_counts: &mut std::collections::HashMap<Difficulty, i32>| {
        for p in &c.pattern_ids {
            *pattern_counts.entry(*p).or_insert(0) += 1;
        }
        *difficulty_counts.entry(c.difficulty).or_insert(0) += 1;
    };

    // Pass 1: quick-wins up to the floor.
    let mut quick_wins_taken = 0;
    for c in by_score_desc.iter().filter(|c| is_quick_win(c)) {
        if quick_wins_taken >= config.min_quick_wins {
            break;
        }
        if chosen_ids.contains(&c.problem_id) || !fits_pattern_cap(c, &pattern_counts) {
            continue;
        }
        record(c, &mut pattern_counts, &mut difficulty_counts);
        chosen_ids.insert(c.problem_id);
        selected.push(c.clone());
        quick_wins_taken += 1;
    }

    // Pass 2: fill remaining slots by score, respecting difficulty quotas.
    for c in by_score_desc.iter() {
        if selected.len() as i32 >= total {
            break;
        }
        if chosen_ids.contains(&c.problem_id) || !fits_pattern_cap(c, &pattern_counts) {
            continue;
        }
        if let Some(targets) = targets {
            let quota = targets
                .iter()
                .find(|(d, _)| *d == c.difficulty)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            let have = *difficulty_counts.get(&c.difficulty).unwrap_or(&0);
            if have >= quota {
                continue;
            }
        }
        record(c, &mut pattern_counts, &mut difficulty_counts);
        chosen_ids.insert(c.problem_id);
        selected.push(c.clone());
    }

    // Step 4 final pass: repair distinct-pattern count if short.
    let distinct_patterns = |items: &[Candidate]| -> i32 {
        items
            .iter()
            .flat_map(|c| c.pattern_ids.iter())
            .collect::<std::collections::HashSet<_>>()
            .len() as i32
    };

    if distinct_patterns(&selected) < config.min_distinct_patterns {
        let covered: std::collections::HashSet<Id> =
            selected.iter().flat_map(|c| c.pattern_ids.iter().copied()).collect();

        let swap_candidate = by_score_desc
            .iter()
            .rev()
            .find(|c| !chosen_ids.contains(&c.problem_id) && c.pattern_ids.iter().any(|p| !covered.contains(p)));

        if let Some(new_item) = swap_candidate {
            // Remove the lowest-scored selected item whose patterns are all duplicates.
            if let Some(pos) = selected
                .iter()
                .enumerate()
                .rev()
                .find(|(_, c)| {
                    c.pattern_ids
                        .iter()
                        .all(|p| pattern_counts.get(p).copied().unwrap_or(0) > 1)
                })
                .map(|(i, _)| i)
            {
                let removed = selected.remove(pos);
                chosen_ids.remove(&removed.problem_id);
                for p in &removed.pattern_ids {
                    if let Some(n) = pattern_counts.get_mut(p) {
                        *n -= 1;
                    }
                }
                chosen_ids.insert(new_item.problem_id);
                selected.push(new_item.clone());
            }
        }
    }

    if distinct_patterns(&selected) < config.min_distinct_patterns {
        return Err(GeneratorError {
            constraint: ConstraintKind::DistinctPatterns,
            required: config.min_distinct_patterns,
            available: distinct_patterns(&selected),
        });
    }

    // Step 5: ordering.
    if config.progression_ordering {
        selected.sort_by(|a, b| {
            a.difficulty
                .cmp(&b.difficulty)
                .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
        });
    } else {
        selected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }

    Ok(selected)
}
