//! Catalog store — problem half (C1, §4.1).

use chrono::Utc;
use revisit_types::{DomainError, DomainResult, Id};

use crate::{Database, DbResult};

/// A stored problem row (camelCase maps to [`revisit_types::Problem`] at the
/// server boundary; the DB layer stays string/i64-typed for sqlx's sake).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProblemRow {
    pub id: String,
    pub title: String,
    pub source: Option<String>,
    pub url: Option<String>,
    pub difficulty: String,
    pub created_at: String,
}

impl Database {
    /// Create a problem. Fails with `Conflict` if the (title, source) pair
    /// already exists (case-insensitive), matching the import dedup rule.
    pub async fn create_problem(
        &self,
        title: &str,
        source: Option<&str>,
        url: Option<&str>,
        difficulty: &str,
    ) -> DomainResult<ProblemRow> {
        if title.trim().is_empty() {
            return Err(DomainError::BadRequest("title must not be empty".into()));
        }
        if self.find_problem_by_title_source(title, source).await.map_err(db_to_domain)?.is_some() {
            return Err(DomainError::Conflict(format!("problem '{title}' already exists for this source")));
        }

        let id = Id::new().to_string();
        let created_at = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO problems (id, title, source, url, difficulty, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(title)
            .bind(source)
            .bind(url)
            .bind(difficulty)
            .bind(&created_at)
            .execute(self.pool())
            .await
            .map_err(|e| db_to_domain(e.into()))?;

        Ok(ProblemRow {
            id,
            title: title.to_string(),
            source: source.map(str::to_string),
            url: url.map(str::to_string),
            difficulty: difficulty.to_string(),
            created_at,
        })
    }

    pub async fn get_problem(&self, id: &str) -> DomainResult<ProblemRow> {
        sqlx::query_as::<_, ProblemRow>("SELECT id, title, source, url, difficulty, created_at FROM problems WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| db_to_domain(e.into()))?
            .ok_or_else(|| DomainError::NotFound(format!("problem {id}")))
    }

    pub async fn list_problems(&self) -> DbResult<Vec<ProblemRow>> {
        sqlx::query_as::<_, ProblemRow>("SELECT id, title, source, url, difficulty, created_at FROM problems ORDER BY created_at")
            .fetch_all(self.pool())
            .await
    }

    pub async fn update_problem(
        &self,
        id: &str,
        title: Option<&str>,
        source: Option<&str>,
        url: Option<&str>,
        difficulty: Option<&str>,
    ) -> DomainResult<ProblemRow> {
        let existing = self.get_problem(id).await?;
        let title = title.unwrap_or(&existing.title);
        if title.trim().is_empty() {
            return Err(DomainError::BadRequest("title must not be empty".into()));
        }
        sqlx::query("UPDATE problems SET title = ?, source = ?, url = ?, difficulty = ? WHERE id = ?")
            .bind(title)
            .bind(source.or(existing.source.as_deref()))
            .bind(url.or(existing.url.as_deref()))
            .bind(difficulty.unwrap_or(&existing.difficulty))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| db_to_domain(e.into()))?;
        self.get_problem(id).await
    }

    pub async fn delete_problem(&self, id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM problems WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| db_to_domain(e.into()))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("problem {id}")));
        }
        Ok(())
    }

    /// Bulk lookup for import dedup: case-insensitive on (title, source).
    pub async fn find_problem_by_title_source(&self, title: &str, source: Option<&str>) -> DbResult<Option<ProblemRow>> {
        let row = sqlx::query_as::<_, ProblemRow>(
            "SELECT id, title, source, url, difficulty, created_at FROM problems
             WHERE title = ? COLLATE NOCASE AND (source = ? COLLATE NOCASE OR (source IS NULL AND ? IS NULL))",
        )
        .bind(title)
        .bind(source)
        .bind(source)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Link a set of patterns to a problem, idempotently (§3 ProblemPattern).
    pub async fn link_patterns(&self, problem_id: &str, pattern_ids: &[String]) -> DbResult<()> {
        for pattern_id in pattern_ids {
            sqlx::query("INSERT OR IGNORE INTO problem_patterns (problem_id, pattern_id) VALUES (?, ?)")
                .bind(problem_id)
                .bind(pattern_id)
                .execute(self.pool())
                .await?;
        }
        Ok(())
    }

    pub async fn unlink_pattern(&self, problem_id: &str, pattern_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM problem_patterns WHERE problem_id = ? AND pattern_id = ?")
            .bind(problem_id)
            .bind(pattern_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn patterns_for_problem(&self, problem_id: &str) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT pattern_id FROM problem_patterns WHERE problem_id = ?")
            .bind(problem_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

fn db_to_domain(e: crate::DbError) -> DomainError {
    DomainError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_fetch_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let created = db.create_problem("Two Sum", Some("leetcode"), None, "easy").await.unwrap();
        let fetched = db.get_problem(&created.id).await.unwrap();
        assert_eq!(fetched.title, "Two Sum");
        assert_eq!(fetched.difficulty, "easy");
    }

    #[tokio::test]
    async fn duplicate_title_and_source_is_conflict() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_problem("Two Sum", Some("leetcode"), None, "easy").await.unwrap();
        let err = db.create_problem("two sum", Some("LeetCode"), None, "easy").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let db = Database::new_in_memory().await.unwrap();
        let err = db.get_problem("does-not-exist").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn pattern_links_are_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let problem = db.create_problem("Two Sum", None, None, "easy").await.unwrap();
        db.link_patterns(&problem.id, &["p1".into()]).await.unwrap();
        db.link_patterns(&problem.id, &["p1".into()]).await.unwrap();
        let patterns = db.patterns_for_problem(&problem.id).await.unwrap();
        assert_eq!(patterns.len(), 1);
    }
}
