//! Runs CSV imports as background jobs and fans out their progress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use revisit_db::Database;
use tokio::sync::broadcast;

use super::state::ImportJobState;
use super::types::{ImportSseMessage, JobId, JobStatus};

/// Tracks every import job started this process, and which one is "latest"
/// for clients that connect to `GET /import/stream` without a job id — this
/// is a personal single-user tool, so one concurrent import is the norm.
pub struct ImportJobRunner {
    next_id: AtomicU64,
    jobs: RwLock<HashMap<JobId, Arc<ImportJobState>>>,
    latest: RwLock<Option<JobId>>,
}

impl ImportJobRunner {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: RwLock::new(HashMap::new()),
            latest: RwLock::new(None),
        }
    }

    /// Start importing `csv_bytes` in the background, returning the new job id.
    pub fn start(&self, db: Database, csv_bytes: Vec<u8>) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ImportJobState::new(id));

        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(id, Arc::clone(&state));
            }
            Err(e) => tracing::error!("RwLock poisoned writing import jobs map: {e}"),
        }
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(id),
            Err(e) => tracing::error!("RwLock poisoned writing latest import job: {e}"),
        }

        state.set_running();
        let state_for_task = Arc::clone(&state);
        tokio::spawn(async move {
            let state_for_events = Arc::clone(&state_for_task);
            let result = db
                .import_csv(csv_bytes.as_slice(), move |event| state_for_events.emit_progress(event))
                .await;
            match result {
                Ok(outcome) => state_for_task.complete(outcome),
                Err(e) => state_for_task.fail(e.to_string()),
            }
        });

        id
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs.read().ok()?.get(&id).map(|s| s.status())
    }

    pub fn subscribe(&self, id: JobId) -> Option<broadcast::Receiver<ImportSseMessage>> {
        self.jobs.read().ok()?.get(&id).map(|s| s.subscribe())
    }

    /// Subscribe to the most recently started import job, if any.
    pub fn subscribe_latest(&self) -> Option<(JobId, broadcast::Receiver<ImportSseMessage>)> {
        let id = (*self.latest.read().ok()?)?;
        self.subscribe(id).map(|rx| (id, rx))
    }
}

impl Default for ImportJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn running_an_import_completes_and_is_subscribable() {
        let db = Database::new_in_memory().await.unwrap();
        let runner = ImportJobRunner::new();
        let csv = b"title,difficulty\nTwo Sum,easy\n".to_vec();

        let (id, mut rx) = {
            let id = runner.start(db, csv);
            let rx = runner.subscribe(id).unwrap();
            (id, rx)
        };

        let mut saw_complete = false;
        while let Ok(msg) = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("import should finish within timeout")
        {
            if matches!(msg, ImportSseMessage::Complete(_)) {
                saw_complete = true;
                break;
            }
        }
        assert!(saw_complete);
        assert_eq!(runner.status(id), Some(JobStatus::Completed));
    }
}
