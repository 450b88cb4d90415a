//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use revisit_db::Database;

use crate::config::Config;
use crate::jobs::ImportJobRunner;

pub struct AppState {
    /// Server start time, for uptime reporting.
    pub start_time: Instant,
    pub db: Database,
    pub config: Config,
    /// Background runner for CSV import jobs (§6 streaming channel).
    pub import_jobs: Arc<ImportJobRunner>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            db,
            config,
            import_jobs: Arc::new(ImportJobRunner::new()),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_state() -> Arc<AppState> {
        let db = Database::new_in_memory().await.expect("in-memory DB");
        AppState::new(
            db,
            Config {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                env_tag: "test".into(),
                database_url: None,
                jwt_secret: "test-secret".into(),
                default_weights: revisit_core::WeightVector::default().into(),
                csv_bundle_path: None,
            },
        )
    }

    #[tokio::test]
    async fn uptime_starts_near_zero() {
        let state = test_state().await;
        assert!(state.uptime_secs() < 1);
    }
}
