use thiserror::Error;

use crate::domain::job::JobStats;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Failed to compute statistics: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for StatsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Aggregate figures over active postings, computed on every call.
#[async_trait::async_trait]
pub trait StatsService: Send + Sync {
    async fn stats(&self) -> Result<JobStats, StatsError>;
}
