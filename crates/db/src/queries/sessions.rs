//! Session generator persistence (C6, §4.7) and `RevisionSession` CRUD.
//!
//! Pattern-mode filtering happens here, against bulk-read pattern stats,
//! before candidates are handed to [`revisit_core::select_session`] — that
//! module is pure and has no database access of its own.

use chrono::{DateTime, Utc};
use revisit_core::{Candidate, ConstraintKind, DifficultyDistribution, GeneratorError, SelectionConfig, SessionTemplate};
use revisit_types::{DomainError, DomainResult, EmphasisProfile, Id, PatternMode};

use crate::{Database, ScoredProblemRow};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub template_key: Option<String>,
    pub planned_duration_min: i32,
    pub problem_ids_json: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub elapsed_seconds: i64,
    pub timer_state: String,
}

impl SessionRow {
    pub fn problem_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.problem_ids_json).unwrap_or_default()
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, template_key, planned_duration_min, problem_ids_json, created_at, completed_at, elapsed_seconds, timer_state";

/// The distribution to try first, and the further-shifted distribution to
/// fall back to if the first one still can't satisfy the difficulty target.
struct AdaptiveDistributionPlan {
    primary: DifficultyDistribution,
    cascade: Option<DifficultyDistribution>,
}

/// Turn scored problems into generator candidates, applying the pattern-mode
/// filter already resolved by [`Database::resolve_pattern_mode`].
fn candidates_from_scored(
    scored: Vec<ScoredProblemRow>,
    allowed_patterns: &Option<std::collections::HashSet<String>>,
    pattern_mode: PatternMode,
) -> Vec<Candidate> {
    scored
        .into_iter()
        .filter(|s| match allowed_patterns {
            Some(allowed) => match pattern_mode {
                PatternMode::MultiPattern => s.pattern_ids.len() >= 2,
                _ => s.pattern_ids.iter().any(|p| allowed.contains(p)),
            },
            None => true,
        })
        .map(|s| Candidate {
            problem_id: s.problem_id.parse().unwrap_or_else(|_| Id::new()),
            score: s.score,
            difficulty: s.difficulty,
            confidence: s.confidence,
            last_outcome: s.last_outcome,
            last_attempt_at: s.last_attempt_at,
            pattern_ids: s.pattern_ids.iter().filter_map(|p| p.parse().ok()).collect(),
        })
        .collect()
}

impl Database {
    /// Generate and persist a session for `template`, or fail with the
    /// structured `ConstraintError` from §4.7 / §7.
    pub async fn generate_session(
        &self,
        user_id: &str,
        template: &SessionTemplate,
        specific_pattern_id: Option<&str>,
    ) -> Result<SessionRow, GeneratorError> {
        let now = Utc::now();

        let scored = self
            .compute_scores_for_user(user_id, template.emphasis)
            .await
            .map_err(|_| GeneratorError {
                constraint: ConstraintKind::Difficulty,
                required: 0,
                available: 0,
            })?;

        let allowed_patterns = self
            .resolve_pattern_mode(user_id, template.pattern_mode, template.weakest_pattern_count, specific_pattern_id)
            .await;
        let candidates = candidates_from_scored(scored, &allowed_patterns, template.pattern_mode);

        let plan = self.adaptive_difficulty_plan(user_id, template).await;
        let config = SelectionConfig {
            planned_duration_min: template.planned_duration_min,
            max_difficulty: template.max_difficulty,
            difficulty_distribution: plan.as_ref().map(|p| p.primary),
            min_quick_wins: template.min_quick_wins,
            max_same_pattern: template.max_same_pattern,
            min_total_problems: template.min_total_problems,
            min_distinct_patterns: template.min_distinct_patterns,
            confidence_floor: template.confidence_floor,
            confidence_ceiling: template.confidence_ceiling,
            min_days_since_last: template.min_days_since_last,
            progression_ordering: template.progression_ordering,
        };

        let selected = match revisit_core::select_session(&candidates, &config, now) {
            Ok(selected) => selected,
            Err(e) if e.constraint == ConstraintKind::Difficulty => match plan.and_then(|p| p.cascade) {
                Some(cascade_dist) => {
                    let cascaded = SelectionConfig {
                        difficulty_distribution: Some(cascade_dist),
                        ..config
                    };
                    revisit_core::select_session(&candidates, &cascaded, now)?
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };

        self.persist_session(user_id, Some(template.key), template.planned_duration_min, &selected, now)
            .await
    }

    /// Generate and persist a session from a caller-supplied constraint
    /// object (§6 `POST /sessions/generate/custom`) rather than a named
    /// template. Adaptive difficulty only applies to templates (§4.6), so
    /// `config.difficulty_distribution` is used as given.
    pub async fn generate_custom_session(
        &self,
        user_id: &str,
        emphasis: EmphasisProfile,
        pattern_mode: PatternMode,
        weakest_pattern_count: i32,
        specific_pattern_id: Option<&str>,
        config: SelectionConfig,
    ) -> Result<SessionRow, GeneratorError> {
        let now = Utc::now();

        let scored = self.compute_scores_for_user(user_id, emphasis).await.map_err(|_| GeneratorError {
            constraint: ConstraintKind::Difficulty,
            required: 0,
            available: 0,
        })?;

        let allowed_patterns = self.resolve_pattern_mode(user_id, pattern_mode, weakest_pattern_count, specific_pattern_id).await;
        let candidates = candidates_from_scored(scored, &allowed_patterns, pattern_mode);

        let planned_duration_min = config.planned_duration_min;
        let selected = revisit_core::select_session(&candidates, &config, now)?;
        self.persist_session(user_id, None, planned_duration_min, &selected, now).await
    }

    /// Create a session directly from a caller-supplied problem list (§6
    /// `POST /sessions`), bypassing the generator entirely.
    pub async fn create_manual_session(&self, user_id: &str, problem_ids: &[String], planned_duration_min: i32) -> DomainResult<SessionRow> {
        if problem_ids.is_empty() {
            return Err(DomainError::BadRequest("a session needs at least one problem".into()));
        }
        let now = Utc::now();
        let id = Id::new().to_string();
        let problem_ids_json = serde_json::to_string(problem_ids).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            "INSERT INTO revision_sessions (id, user_id, template_key, planned_duration_min, problem_ids_json, created_at, elapsed_seconds, timer_state)
             VALUES (?, ?, NULL, ?, ?, ?, 0, 'idle')",
        )
        .bind(&id)
        .bind(user_id)
        .bind(planned_duration_min)
        .bind(&problem_ids_json)
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| DomainError::Internal(e.to_string()))?;

        Ok(SessionRow {
            id,
            user_id: user_id.to_string(),
            template_key: None,
            planned_duration_min,
            problem_ids_json,
            created_at: now.to_rfc3339(),
            completed_at: None,
            elapsed_seconds: 0,
            timer_state: "idle".to_string(),
        })
    }

    /// Insert the selected candidates as a new session row.
    async fn persist_session(
        &self,
        user_id: &str,
        template_key: Option<&str>,
        planned_duration_min: i32,
        selected: &[Candidate],
        now: DateTime<Utc>,
    ) -> Result<SessionRow, GeneratorError> {
        let problem_ids: Vec<String> = selected.iter().map(|c| c.problem_id.to_string()).collect();
        let id = Id::new().to_string();
        let problem_ids_json = serde_json::to_string(&problem_ids).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            "INSERT INTO revision_sessions (id, user_id, template_key, planned_duration_min, problem_ids_json, created_at, elapsed_seconds, timer_state)
             VALUES (?, ?, ?, ?, ?, ?, 0, 'idle')",
        )
        .bind(&id)
        .bind(user_id)
        .bind(template_key)
        .bind(planned_duration_min)
        .bind(&problem_ids_json)
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|_| GeneratorError {
            constraint: ConstraintKind::Difficulty,
            required: 0,
            available: 0,
        })?;

        Ok(SessionRow {
            id,
            user_id: user_id.to_string(),
            template_key: template_key.map(str::to_string),
            planned_duration_min,
            problem_ids_json,
            created_at: now.to_rfc3339(),
            completed_at: None,
            elapsed_seconds: 0,
            timer_state: "idle".to_string(),
        })
    }

    /// Resolve `weakest` / `specific` / `multi_pattern` pattern modes to a
    /// concrete allowed-pattern-id set (§4.7 step 1). `all` and
    /// `multi_pattern` don't restrict by a fixed set, so they return `None`.
    async fn resolve_pattern_mode(
        &self,
        user_id: &str,
        pattern_mode: PatternMode,
        weakest_pattern_count: i32,
        specific_pattern_id: Option<&str>,
    ) -> Option<std::collections::HashSet<String>> {
        match pattern_mode {
            PatternMode::All | PatternMode::MultiPattern => None,
            PatternMode::Specific => specific_pattern_id.map(|p| std::collections::HashSet::from([p.to_string()])),
            PatternMode::Weakest => {
                let mut stats = self.all_pattern_stats_for_user(user_id).await.unwrap_or_default();
                let mut titles = std::collections::HashMap::new();
                if let Ok(patterns) = self.list_patterns().await {
                    for p in patterns {
                        titles.insert(p.id.clone(), p.title);
                    }
                }
                stats.sort_by(|a, b| {
                    a.avg_confidence
                        .partial_cmp(&b.avg_confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.times_revised.cmp(&b.times_revised))
                        .then_with(|| titles.get(&a.pattern_id).cmp(&titles.get(&b.pattern_id)))
                });
                Some(
                    stats
                        .into_iter()
                        .take(weakest_pattern_count.max(0) as usize)
                        .map(|s| s.pattern_id)
                        .collect(),
                )
            }
        }
    }

    /// Adaptive difficulty (§4.7): inspect the last three completed
    /// sessions' average final confidence, shift the distribution 10 points
    /// toward (or away from) hard problems, and prepare a second 10-point
    /// cascade step in the same direction — applied only if the first shift
    /// still leaves the target difficulty unsatisfiable — so the total
    /// adjustment never exceeds the ±20-point cap.
    async fn adaptive_difficulty_plan(&self, user_id: &str, template: &SessionTemplate) -> Option<AdaptiveDistributionPlan> {
        let dist = template.difficulty_distribution?;
        if !template.adaptive_difficulty {
            return Some(AdaptiveDistributionPlan { primary: dist, cascade: None });
        }

        let avg = self.average_final_confidence_of_last_sessions(user_id, 3).await?;
        let shift = if avg < 60.0 {
            0.10
        } else if avg > 85.0 {
            -0.10
        } else {
            0.0
        };
        if shift == 0.0 {
            return Some(AdaptiveDistributionPlan { primary: dist, cascade: None });
        }

        let primary = shift_hard_medium(dist, shift);
        let cascade = shift_medium_easy(primary, shift);
        Some(AdaptiveDistributionPlan { primary, cascade: Some(cascade) })
    }

    async fn average_final_confidence_of_last_sessions(&self, user_id: &str, n: i64) -> Option<f64> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT problem_ids_json FROM revision_sessions WHERE user_id = ? AND completed_at IS NOT NULL
             ORDER BY completed_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(n)
        .fetch_all(self.pool())
        .await
        .ok()?;
        if rows.is_empty() {
            return None;
        }

        let mut confidences = Vec::new();
        for (problem_ids_json,) in rows {
            let ids: Vec<String> = serde_json::from_str(&problem_ids_json).unwrap_or_default();
            for id in ids {
                if let Some(stat) = self.get_problem_stats(user_id, &id).await {
                    confidences.push(f64::from(stat.confidence));
                }
            }
        }
        if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        }
    }

    pub async fn get_session(&self, id: &str, user_id: &str) -> DomainResult<SessionRow> {
        sqlx::query_as::<_, SessionRow>(&format!("SELECT {SESSION_COLUMNS} FROM revision_sessions WHERE id = ? AND user_id = ?"))
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?
            .ok_or_else(|| DomainError::NotFound(format!("session {id}")))
    }

    pub async fn list_sessions_for_user(&self, user_id: &str) -> crate::DbResult<Vec<SessionRow>> {
        sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM revision_sessions WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    pub async fn complete_session(&self, id: &str, user_id: &str) -> DomainResult<SessionRow> {
        let result = sqlx::query("UPDATE revision_sessions SET completed_at = ? WHERE id = ? AND user_id = ? AND completed_at IS NULL")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("incomplete session {id}")));
        }
        self.get_session(id, user_id).await
    }

    pub async fn update_session_timer(&self, id: &str, user_id: &str, elapsed_seconds: i64, timer_state: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE revision_sessions SET elapsed_seconds = ?, timer_state = ? WHERE id = ? AND user_id = ?")
            .bind(elapsed_seconds)
            .bind(timer_state)
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    pub async fn delete_session(&self, id: &str, user_id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM revision_sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("session {id}")));
        }
        Ok(())
    }
}

/// First adaptive step (§4.7): positive `shift` moves points from hard to
/// medium (the user is struggling); negative moves medium to hard.
fn shift_hard_medium(dist: DifficultyDistribution, shift: f64) -> DifficultyDistribution {
    let shift = shift.clamp(-0.20, 0.20);
    if shift > 0.0 {
        let moved = shift.min(dist.hard);
        DifficultyDistribution {
            easy: dist.easy,
            medium: dist.medium + moved,
            hard: dist.hard - moved,
        }
    } else if shift < 0.0 {
        let moved = (-shift).min(dist.medium);
        DifficultyDistribution {
            easy: dist.easy,
            medium: dist.medium - moved,
            hard: dist.hard + moved,
        }
    } else {
        dist
    }
}

/// Cascade adaptive step (§4.7): applied only when the first shift still
/// leaves the difficulty target unsatisfiable. Positive `shift` continues
/// the same direction by moving medium to easy; negative moves easy to
/// medium. Two 0.10 steps in the same direction sum to the ±0.20 cap.
fn shift_medium_easy(dist: DifficultyDistribution, shift: f64) -> DifficultyDistribution {
    let shift = shift.clamp(-0.20, 0.20);
    if shift > 0.0 {
        let moved = shift.min(dist.medium);
        DifficultyDistribution {
            easy: dist.easy + moved,
            medium: dist.medium - moved,
            hard: dist.hard,
        }
    } else if shift < 0.0 {
        let moved = (-shift).min(dist.easy);
        DifficultyDistribution {
            easy: dist.easy - moved,
            medium: dist.medium + moved,
            hard: dist.hard,
        }
    } else {
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_moves_points_from_hard_to_medium() {
        let dist = DifficultyDistribution {
            easy: 0.2,
            medium: 0.3,
            hard: 0.5,
        };
        let shifted = shift_hard_medium(dist, 0.10);
        assert!((shifted.medium - 0.4).abs() < 1e-9);
        assert!((shifted.hard - 0.4).abs() < 1e-9);
    }

    #[test]
    fn cascade_continues_the_same_direction_into_easy() {
        let dist = DifficultyDistribution {
            easy: 0.2,
            medium: 0.3,
            hard: 0.5,
        };
        let primary = shift_hard_medium(dist, 0.10);
        let cascaded = shift_medium_easy(primary, 0.10);
        assert!((cascaded.easy - 0.3).abs() < 1e-9);
        assert!((cascaded.medium - 0.3).abs() < 1e-9);
        assert!((cascaded.hard - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn generating_without_enough_quick_wins_fails_with_constraint_error() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (id, login_handle, password_hash, created_at) VALUES ('u1', 'alice', 'x', datetime('now'))")
            .execute(db.pool())
            .await
            .unwrap();
        db.create_problem("Two Sum", None, None, "easy").await.unwrap();

        let template = revisit_core::TEMPLATES.iter().find(|t| t.key == "morning_momentum").unwrap();
        let err = db.generate_session("u1", template, None).await.unwrap_err();
        assert_eq!(err.constraint, ConstraintKind::QuickWins);
    }
}
