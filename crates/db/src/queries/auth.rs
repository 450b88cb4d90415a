//! Users and the token stores backing the auth endpoints (§3, §6).
//!
//! Password hashing and raw-secret generation happen in `revisit-server`;
//! this module only ever sees and stores hashes, never raw secrets.

use chrono::{DateTime, Utc};
use revisit_types::{DomainError, DomainResult, Id, Role};

use crate::Database;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub login_handle: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub created_at: String,
}

impl Database {
    pub async fn create_user(&self, login_handle: &str, password_hash: &str, role: Role) -> DomainResult<UserRow> {
        if self.get_user_by_handle(login_handle).await?.is_some() {
            return Err(DomainError::Conflict(format!("login handle '{login_handle}' is taken")));
        }
        let id = Id::new().to_string();
        let created_at = Utc::now().to_rfc3339();
        let role_str = role_str(role);
        sqlx::query("INSERT INTO users (id, login_handle, password_hash, role, active, created_at) VALUES (?, ?, ?, ?, 1, ?)")
            .bind(&id)
            .bind(login_handle)
            .bind(password_hash)
            .bind(role_str)
            .bind(&created_at)
            .execute(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?;
        Ok(UserRow {
            id,
            login_handle: login_handle.to_string(),
            password_hash: password_hash.to_string(),
            role: role_str.to_string(),
            active: true,
            created_at,
        })
    }

    pub async fn get_user_by_handle(&self, login_handle: &str) -> DomainResult<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>("SELECT id, login_handle, password_hash, role, active, created_at FROM users WHERE login_handle = ?")
            .bind(login_handle)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))
    }

    pub async fn get_user_by_id(&self, id: &str) -> DomainResult<UserRow> {
        sqlx::query_as::<_, UserRow>("SELECT id, login_handle, password_hash, role, active, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?
            .ok_or_else(|| DomainError::NotFound(format!("user {id}")))
    }

    /// Deactivate a user (admin action, §6 admin surface). Deactivated users
    /// fail login but keep their historical attempts and stats intact.
    pub async fn deactivate_user(&self, id: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE users SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    pub async fn store_refresh_token(&self, user_id: &str, token_hash: &str, expires_at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query("INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at) VALUES (?, ?, ?, ?, ?)")
            .bind(Id::new().to_string())
            .bind(user_id)
            .bind(token_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(expires_at.to_rfc3339())
            .execute(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?;
        Ok(())
    }

    /// Look up a live (unrevoked, unexpired) refresh token by its hash.
    pub async fn find_live_refresh_token(&self, token_hash: &str) -> DomainResult<Option<String>> {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT user_id, expires_at, revoked_at FROM refresh_tokens WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| domain_err(e.into()))?;

        let Some((user_id, expires_at, revoked_at)) = row else {
            return Ok(None);
        };
        if revoked_at.is_some() {
            return Ok(None);
        }
        let expires_at = DateTime::parse_from_rfc3339(&expires_at).map_err(|e| DomainError::Internal(e.to_string()))?;
        if expires_at < Utc::now() {
            return Ok(None);
        }
        Ok(Some(user_id))
    }

    pub async fn revoke_refresh_token(&self, token_hash: &str) -> DomainResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked_at = ? WHERE token_hash = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(token_hash)
            .execute(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?;
        Ok(())
    }

    pub async fn create_invite_code(&self, code_hash: &str) -> DomainResult<()> {
        sqlx::query("INSERT INTO invite_codes (id, code_hash, created_at) VALUES (?, ?, ?)")
            .bind(Id::new().to_string())
            .bind(code_hash)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool())
            .await
            .map_err(|e| domain_err(e.into()))?;
        Ok(())
    }

    /// Atomically redeem an invite code: fails if unknown or already used.
    pub async fn redeem_invite_code(&self, code_hash: &str, user_id: &str) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE invite_codes SET redeemed_by = ?, redeemed_at = ? WHERE code_hash = ? AND redeemed_by IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .bind(code_hash)
        .execute(self.pool())
        .await
        .map_err(|e| domain_err(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::BadRequest("invite code is invalid or already used".into()));
        }
        Ok(())
    }
}

fn role_str(r: Role) -> &'static str {
    match r {
        Role::User => "user",
        Role::Admin => "admin",
    }
}

fn domain_err(e: crate::DbError) -> DomainError {
    DomainError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn duplicate_login_handle_conflicts() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_user("alice", "hash", Role::User).await.unwrap();
        let err = db.create_user("alice", "other-hash", Role::User).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn refresh_token_lifecycle() {
        let db = Database::new_in_memory().await.unwrap();
        let user = db.create_user("alice", "hash", Role::User).await.unwrap();
        db.store_refresh_token(&user.id, "tokhash", Utc::now() + Duration::days(30)).await.unwrap();

        let found = db.find_live_refresh_token("tokhash").await.unwrap();
        assert_eq!(found, Some(user.id.clone()));

        db.revoke_refresh_token("tokhash").await.unwrap();
        let found_after_revoke = db.find_live_refresh_token("tokhash").await.unwrap();
        assert_eq!(found_after_revoke, None);
    }

    #[tokio::test]
    async fn deactivating_an_unknown_user_is_not_found() {
        let db = Database::new_in_memory().await.unwrap();
        let err = db.deactivate_user("does-not-exist").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn invite_code_cannot_be_redeemed_twice() {
        let db = Database::new_in_memory().await.unwrap();
        let user = db.create_user("alice", "hash", Role::User).await.unwrap();
        db.create_invite_code("codehash").await.unwrap();
        db.redeem_invite_code("codehash", &user.id).await.unwrap();
        let err = db.redeem_invite_code("codehash", &user.id).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }
}
