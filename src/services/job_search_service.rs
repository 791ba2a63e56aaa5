//! Domain service for reading postings: filtered listings and direct lookups.

use thiserror::Error;

use crate::domain::job::{JobPage, JobPosting, ListRequest};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid job ID: {0}")]
    InvalidId(String),

    #[error("Job not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for SearchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait JobSearchService: Send + Sync {
    /// Lists active postings matching the filter, one page at a time.
    async fn list(&self, request: ListRequest) -> Result<JobPage, SearchError>;

    /// Fetches a posting by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidId`] for a malformed id without
    /// touching the store, and [`SearchError::NotFound`] if nothing matches.
    async fn get_by_id(&self, id: &str) -> Result<JobPosting, SearchError>;
}
