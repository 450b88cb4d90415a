//! Catalog store — pattern half (C1, §4.1).

use chrono::Utc;
use revisit_types::{DomainError, DomainResult, Id};

use crate::Database;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatternRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl Database {
    /// Create a pattern. Case-insensitive title uniqueness is enforced by
    /// the schema's unique index; a collision surfaces as `Conflict`.
    pub async fn create_pattern(&self, title: &str, description: Option<&str>) -> DomainResult<PatternRow> {
        if title.trim().is_empty() {
            return Err(DomainError::BadRequest("title must not be empty".into()));
        }
        if let Some(existing) = self.find_pattern_by_title(title).await.map_err(db_to_domain)? {
            return Err(DomainError::Conflict(format!("pattern '{}' already exists", existing.title)));
        }

        let id = Id::new().to_string();
        let created_at = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO patterns (id, title, description, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(title)
            .bind(description)
            .bind(&created_at)
            .execute(self.pool())
            .await
            .map_err(|e| db_to_domain(e.into()))?;

        Ok(PatternRow {
            id,
            title: title.to_string(),
            description: description.map(str::to_string),
            created_at,
        })
    }

    pub async fn get_pattern(&self, id: &str) -> DomainResult<PatternRow> {
        sqlx::query_as::<_, PatternRow>("SELECT id, title, description, created_at FROM patterns WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| db_to_domain(e.into()))?
            .ok_or_else(|| DomainError::NotFound(format!("pattern {id}")))
    }

    pub async fn list_patterns(&self) -> crate::DbResult<Vec<PatternRow>> {
        sqlx::query_as::<_, PatternRow>("SELECT id, title, description, created_at FROM patterns ORDER BY title")
            .fetch_all(self.pool())
            .await
    }

    pub async fn find_pattern_by_title(&self, title: &str) -> crate::DbResult<Option<PatternRow>> {
        sqlx::query_as::<_, PatternRow>("SELECT id, title, description, created_at FROM patterns WHERE title = ? COLLATE NOCASE")
            .bind(title)
            .fetch_optional(self.pool())
            .await
    }

    /// Find-or-create by title, used by the import pipeline (§4.7 Idempotent linking).
    pub async fn find_or_create_pattern(&self, title: &str) -> DomainResult<PatternRow> {
        if let Some(existing) = self.find_pattern_by_title(title).await.map_err(db_to_domain)? {
            return Ok(existing);
        }
        self.create_pattern(title, None).await
    }
}

fn db_to_domain(e: crate::DbError) -> DomainError {
    DomainError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_title_is_conflict_case_insensitively() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_pattern("Two Pointers", None).await.unwrap();
        let err = db.create_pattern("two pointers", None).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let a = db.find_or_create_pattern("Sliding Window").await.unwrap();
        let b = db.find_or_create_pattern("sliding window").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(db.list_patterns().await.unwrap().len(), 1);
    }
}
