//! SQLite-backed persistence for the practice scheduler.
//!
//! `Database` is a thin handle around a `sqlx::SqlitePool`, opened with
//! WAL journaling. Migrations are plain SQL strings tracked in a
//! `_migrations` table rather than a build-time migration framework.

mod migrations;
pub mod queries;

pub use queries::attempts::AttemptRow;
pub use queries::auth::UserRow;
pub use queries::import::{ImportEvent, ImportOutcome, ImportPhase, ImportRowStatus};
pub use queries::patterns::PatternRow;
pub use queries::problems::ProblemRow;
pub use queries::sessions::SessionRow;
pub use queries::settings::Weights;
pub use queries::stats::{ScoredProblemRow, UserPatternStatsRow, UserProblemStatsRow};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to determine a data directory for the default database path")]
    NoDataDir,

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Main database handle wrapping a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn new(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

        let db = Self {
            pool,
            db_path: path.to_owned(),
        };
        db.run_migrations().await?;

        info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Create an in-memory database (for testing). `shared_cache(true)` so
    /// every pooled connection sees the same in-memory database.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .shared_cache(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        let db = Self {
            pool,
            db_path: PathBuf::new(),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open the database at the default location: `~/.local/share/revisit/revisit.db`.
    pub async fn open_default() -> DbResult<Self> {
        let path = default_db_path()?;
        Self::new(&path).await
    }

    /// Run every inline migration past the highest version already recorded.
    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version > current_version {
                sqlx::query(migration).execute(&self.pool).await?;
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the path to the database file. Empty for in-memory databases.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Returns the default database path: `~/.local/share/revisit/revisit.db`.
pub fn default_db_path() -> DbResult<PathBuf> {
    let dir = dirs::data_dir().ok_or(DbError::NoDataDir)?;
    Ok(dir.join("revisit").join("revisit.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_in_memory_database_with_schema() {
        let db = Database::new_in_memory().await.expect("should create in-memory database");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM problems")
            .fetch_one(db.pool())
            .await
            .expect("problems table should exist");
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::new_in_memory().await.expect("first open should succeed");
        db.run_migrations().await.expect("second migration run should succeed");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settings")
            .fetch_one(db.pool())
            .await
            .expect("settings table should still exist");
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn file_based_database_persists_to_disk() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let db_path = tmp.path().join("test.db");
        let db = Database::new(&db_path).await.expect("should create file-based database");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .expect("users table should exist");
        assert_eq!(count.0, 0);
        assert!(db_path.exists());
    }

    #[test]
    fn default_db_path_points_under_revisit() {
        let path = default_db_path().expect("should resolve default path");
        assert!(path.to_string_lossy().contains("revisit"));
        assert!(path.to_string_lossy().ends_with("revisit.db"));
    }
}
