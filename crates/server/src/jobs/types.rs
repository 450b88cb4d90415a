//! Types for the CSV-import background job (§6 "Streaming channel").
//!
//! There is exactly one background job kind in this service — CSV import —
//! with a rich structured payload (`revisit_db::ImportEvent`), so this job
//! system is specialized to that one payload rather than generic over an
//! arbitrary job type and a flat progress string.

use revisit_db::{ImportEvent, ImportOutcome};

pub type JobId = u64;

/// Status of a background import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// One message on a job's broadcast channel, carrying the SSE event name
/// alongside it (§6: named events `connected` / `progress` / `complete` / `error`).
#[derive(Debug, Clone)]
pub enum ImportSseMessage {
    Progress(ImportEvent),
    Complete(ImportOutcome),
    Error(String),
}

impl ImportSseMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ImportSseMessage::Progress(_) => "progress",
            ImportSseMessage::Complete(_) => "complete",
            ImportSseMessage::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            ImportSseMessage::Progress(e) => serde_json::to_string(e),
            ImportSseMessage::Complete(o) => serde_json::to_string(o),
            ImportSseMessage::Error(msg) => serde_json::to_string(&serde_json::json!({ "message": msg })),
        }
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_spec() {
        assert_eq!(ImportSseMessage::Error("x".into()).event_name(), "error");
        assert_eq!(JobStatus::Running.as_str(), "running");
    }
}
