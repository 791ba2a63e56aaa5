//! `SeaORM` implementation of the `JobSearchService` trait.

use crate::db::Store;
use crate::domain::RecordId;
use crate::domain::job::{JobPage, JobPosting, ListRequest, PageInfo};
use crate::services::job_search_service::{JobSearchService, SearchError};
use async_trait::async_trait;

pub struct SeaOrmJobSearchService {
    store: Store,
}

impl SeaOrmJobSearchService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobSearchService for SeaOrmJobSearchService {
    async fn list(&self, request: ListRequest) -> Result<JobPage, SearchError> {
        let (jobs, total) = self
            .store
            .search_jobs(&request.filter, request.pagination, request.sort)
            .await?;

        Ok(JobPage {
            jobs,
            pagination: PageInfo::new(request.pagination, total),
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<JobPosting, SearchError> {
        let id = RecordId::parse(id).map_err(|e| SearchError::InvalidId(e.0))?;

        self.store
            .get_job(&id)
            .await?
            .ok_or(SearchError::NotFound)
    }
}
