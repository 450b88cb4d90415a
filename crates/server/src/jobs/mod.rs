//! Background job system (§6), specialized to the one job kind this
//! service runs in the background: CSV import.

mod runner;
mod state;
mod types;

pub use runner::ImportJobRunner;
pub use state::ImportJobState;
pub use types::{ImportSseMessage, JobId, JobStatus};
