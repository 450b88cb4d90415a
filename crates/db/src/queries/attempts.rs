//! Attempt log (C2, §4.2).

use chrono::Utc;
use revisit_types::{DomainError, DomainResult, Id};

use super::stats;
use crate::Database;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttemptRow {
    pub id: String,
    pub user_id: String,
    pub problem_id: String,
    pub session_id: Option<String>,
    pub state: String,
    pub elapsed_seconds: i64,
    pub timer_state: String,
    pub last_timer_update: Option<String>,
    pub confidence: Option<i32>,
    pub outcome: Option<String>,
    pub duration_seconds: Option<i64>,
    pub notes: Option<String>,
    pub performed_at: Option<String>,
    pub started_at: String,
}

const ATTEMPT_COLUMNS: &str = "id, user_id, problem_id, session_id, state, elapsed_seconds, timer_state, \
     last_timer_update, confidence, outcome, duration_seconds, notes, performed_at, started_at";

impl Database {
    /// `StartAttempt`: fails with `Conflict` if an in_progress row already
    /// exists for (user, problem) — enforced first by lookup, and backstopped
    /// by the partial-unique index on the schema.
    pub async fn start_attempt(&self, user_id: &str, problem_id: &str, session_id: Option<&str>) -> DomainResult<AttemptRow> {
        if self.get_in_progress_for_problem(user_id, problem_id).await?.is_some() {
            return Err(DomainError::Conflict(format!("an attempt on {problem_id} is already in progress")));
        }

        let id = Id::new().to_string();
        let started_at = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO attempts (id, user_id, problem_id, session_id, state, elapsed_seconds, timer_state, started_at)
             VALUES (?, ?, ?, ?, 'in_progress', 0, 'running', ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(problem_id)
        .bind(session_id)
        .bind(&started_at)
        .execute(self.pool())
        .await
        .map_err(|e| domain_err(e.into()))?;

        self.get_attempt(&id, user_id).await
    }

    pub async fn get_attempt(&self, id: &str, user_id: &str) -> DomainResult<AttemptRow> {
        sqlx::query_as::<_, AttemptRow>(&format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ? AND user_id = ?"))
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?
            .ok_or_else(|| DomainError::NotFound(format!("attempt {id}")))
    }

    pub async fn get_in_progress_for_problem(&self, user_id: &str, problem_id: &str) -> DomainResult<Option<AttemptRow>> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = ? AND problem_id = ? AND state = 'in_progress'"
        ))
        .bind(user_id)
        .bind(problem_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| domain_err(e.into()))
    }

    /// `UpdateTimer`: last-write-wins, idempotent. A call against a
    /// non-in_progress row is a silent no-op to the caller but surfaces a
    /// distinct error variant for logs (§4.2 edge case).
    pub async fn update_timer(&self, id: &str, user_id: &str, elapsed_seconds: i64, timer_state: &str) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE attempts SET elapsed_seconds = ?, timer_state = ?, last_timer_update = ?
             WHERE id = ? AND user_id = ? AND state = 'in_progress'",
        )
        .bind(elapsed_seconds)
        .bind(timer_state)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await
        .map_err(|e| domain_err(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Conflict(format!("attempt {id} is not in progress")));
        }
        Ok(())
    }

    /// `CompleteAttempt`: atomic in_progress → completed, with the §4.3
    /// stats recompute executed in the same transaction.
    pub async fn complete_attempt(
        &self,
        id: &str,
        user_id: &str,
        outcome: &str,
        confidence: i32,
        duration_seconds: i64,
        notes: Option<&str>,
    ) -> DomainResult<AttemptRow> {
        if duration_seconds < 0 {
            return Err(DomainError::BadRequest("duration_seconds must be non-negative".into()));
        }
        if !(0..=100).contains(&confidence) {
            return Err(DomainError::BadRequest("confidence must be within 0..=100".into()));
        }

        let mut tx = self.pool().begin().await.map_err(|e| domain_err(e.into()))?;

        let attempt: Option<(String,)> =
            sqlx::query_as("SELECT problem_id FROM attempts WHERE id = ? AND user_id = ? AND state = 'in_progress'")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| domain_err(e.into()))?;
        let (problem_id,) = attempt.ok_or_else(|| DomainError::Conflict(format!("attempt {id} is not in progress")))?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE attempts SET state = 'completed', outcome = ?, confidence = ?, duration_seconds = ?, notes = ?, performed_at = ?
             WHERE id = ?",
        )
        .bind(outcome)
        .bind(confidence)
        .bind(duration_seconds)
        .bind(notes)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| domain_err(e.into()))?;

        let parsed_outcome = if outcome == "failed" {
            revisit_types::Outcome::Failed
        } else {
            revisit_types::Outcome::Passed
        };
        stats::recompute_and_persist(&mut tx, user_id, &problem_id, confidence, parsed_outcome, now).await?;

        tx.commit().await.map_err(|e| domain_err(e.into()))?;
        self.get_attempt(id, user_id).await
    }

    /// `AbandonAttempt`: transition to terminal `abandoned`; does not affect stats.
    pub async fn abandon_attempt(&self, id: &str, user_id: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE attempts SET state = 'abandoned' WHERE id = ? AND user_id = ? AND state = 'in_progress'")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("in-progress attempt {id}")));
        }
        Ok(())
    }

    pub async fn list_attempts_for_user(&self, user_id: &str) -> crate::DbResult<Vec<AttemptRow>> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = ? ORDER BY started_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    pub async fn list_attempts_for_problem(&self, user_id: &str, problem_id: &str) -> crate::DbResult<Vec<AttemptRow>> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = ? AND problem_id = ? ORDER BY started_at DESC"
        ))
        .bind(user_id)
        .bind(problem_id)
        .fetch_all(self.pool())
        .await
    }
}

fn domain_err(e: crate::DbError) -> DomainError {
    DomainError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Database, String, String) {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (id, login_handle, password_hash, created_at) VALUES ('u1', 'alice', 'x', datetime('now'))")
            .execute(db.pool())
            .await
            .unwrap();
        let problem = db.create_problem("Two Sum", None, None, "easy").await.unwrap();
        (db, "u1".to_string(), problem.id)
    }

    #[tokio::test]
    async fn starting_a_second_attempt_conflicts() {
        let (db, user_id, problem_id) = setup().await;
        db.start_attempt(&user_id, &problem_id, None).await.unwrap();
        let err = db.start_attempt(&user_id, &problem_id, None).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn timer_update_on_non_in_progress_row_is_rejected() {
        let (db, user_id, problem_id) = setup().await;
        let attempt = db.start_attempt(&user_id, &problem_id, None).await.unwrap();
        db.complete_attempt(&attempt.id, &user_id, "passed", 80, 120, None).await.unwrap();
        let err = db.update_timer(&attempt.id, &user_id, 10, "paused").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn completing_an_attempt_updates_stats_and_allows_a_new_start() {
        let (db, user_id, problem_id) = setup().await;
        let attempt = db.start_attempt(&user_id, &problem_id, None).await.unwrap();
        let completed = db.complete_attempt(&attempt.id, &user_id, "passed", 85, 300, Some("clean")).await.unwrap();
        assert_eq!(completed.state, "completed");

        let stats = db.get_problem_stats(&user_id, &problem_id).await.unwrap();
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.confidence, 85);
        assert_eq!(stats.status, "solved");

        // in_progress slot freed up
        db.start_attempt(&user_id, &problem_id, None).await.unwrap();
    }

    #[tokio::test]
    async fn negative_duration_is_rejected() {
        let (db, user_id, problem_id) = setup().await;
        let attempt = db.start_attempt(&user_id, &problem_id, None).await.unwrap();
        let err = db.complete_attempt(&attempt.id, &user_id, "passed", 80, -1, None).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }
}
