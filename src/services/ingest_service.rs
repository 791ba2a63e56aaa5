//! Domain service for postings pushed by scraping agents.
//!
//! Covers the single-posting ingest path plus the run lifecycle notices
//! (start, finish, trigger) that only leave an audit trail.

use serde::Serialize;
use thiserror::Error;

use crate::domain::RecordId;
use crate::domain::job::{IngestReceipt, NewJob, RunFinish, RunStart};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("A job with this source URL already exists")]
    DuplicateUrl { existing_id: RecordId },

    #[error("Scraper trigger timed out after {0} seconds")]
    TriggerTimeout(u64),

    #[error("Scraper trigger failed: {0}")]
    TriggerFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// How a trigger request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// No automation endpoint configured; the request was only recorded.
    Acknowledged,
    /// The automation endpoint accepted the run.
    Dispatched,
}

#[async_trait::async_trait]
pub trait IngestService: Send + Sync {
    /// Stores one posting.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::DuplicateUrl`] naming the stored posting when
    /// the source URL is already known; nothing is written in that case.
    async fn ingest(&self, job: NewJob) -> Result<IngestReceipt, IngestError>;

    async fn notify_start(&self, run: RunStart) -> Result<(), IngestError>;

    async fn notify_finish(&self, run: RunFinish) -> Result<(), IngestError>;

    /// Asks the external automation to begin a run, bounded by the
    /// configured timeout.
    async fn trigger_run(&self) -> Result<TriggerOutcome, IngestError>;
}
