//! Atomic state tracking for a single import job.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::broadcast;

use super::types::{ImportSseMessage, JobId, JobStatus};

/// Lock-free status tracking plus a broadcast channel for SSE fan-out.
pub struct ImportJobState {
    id: JobId,
    status: AtomicU8,
    tx: broadcast::Sender<ImportSseMessage>,
}

impl ImportJobState {
    pub fn new(id: JobId) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            id,
            status: AtomicU8::new(JobStatus::Pending as u8),
            tx,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn set_running(&self) {
        self.status.store(JobStatus::Running as u8, Ordering::Relaxed);
    }

    pub fn emit_progress(&self, event: revisit_db::ImportEvent) {
        let _ = self.tx.send(ImportSseMessage::Progress(event));
    }

    pub fn complete(&self, outcome: revisit_db::ImportOutcome) {
        self.status.store(JobStatus::Completed as u8, Ordering::Relaxed);
        let _ = self.tx.send(ImportSseMessage::Complete(outcome));
    }

    pub fn fail(&self, message: String) {
        self.status.store(JobStatus::Failed as u8, Ordering::Relaxed);
        let _ = self.tx.send(ImportSseMessage::Error(message));
    }

    pub fn status(&self) -> JobStatus {
        match self.status.load(Ordering::Relaxed) {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImportSseMessage> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_status() {
        let state = ImportJobState::new(1);
        assert_eq!(state.status(), JobStatus::Pending);
        state.set_running();
        assert_eq!(state.status(), JobStatus::Running);
        state.complete(revisit_db::ImportOutcome::default());
        assert_eq!(state.status(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn subscribers_receive_progress() {
        let state = ImportJobState::new(2);
        let mut rx = state.subscribe();
        state.set_running();
        state.emit_progress(revisit_db::ImportEvent {
            phase: revisit_db::ImportPhase::Patterns,
            current_index: 0,
            total_items: 1,
            current_item: None,
            problems_created: 0,
            patterns_created: 0,
            duplicates_skipped: 0,
            percentage: 0.0,
            recent: Vec::new(),
        });
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event_name(), "progress");
    }
}
