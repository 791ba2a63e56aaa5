//! `SeaORM` implementation of the `StatsService` trait.

use crate::db::Store;
use crate::domain::job::JobStats;
use crate::services::stats_service::{StatsError, StatsService};
use async_trait::async_trait;
use chrono::{Duration, Utc};

const TOP_LOCATIONS: u64 = 10;
const RECENT_WINDOW_HOURS: i64 = 24;

pub struct SeaOrmStatsService {
    store: Store,
}

impl SeaOrmStatsService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatsService for SeaOrmStatsService {
    async fn stats(&self) -> Result<JobStats, StatsError> {
        let since = Utc::now() - Duration::hours(RECENT_WINDOW_HOURS);

        let (total_jobs, total_companies, jobs_by_type, top_locations, recent_jobs) = futures::try_join!(
            self.store.count_active_jobs(),
            self.store.count_active_companies(),
            self.store.count_active_jobs_by_type(),
            self.store.top_active_locations(TOP_LOCATIONS),
            self.store.count_active_jobs_ingested_since(since),
        )?;

        Ok(JobStats {
            total_jobs,
            total_companies,
            recent_jobs,
            jobs_by_type,
            top_locations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobType;
    use crate::domain::job::{LocationCount, NewJob};

    fn job(n: usize, company: &str, location: &str, job_type: JobType) -> NewJob {
        NewJob {
            title: format!("Role {n}"),
            company: company.to_string(),
            location: location.to_string(),
            salary: None,
            description: "Details".to_string(),
            requirements: Vec::new(),
            tags: Vec::new(),
            job_type,
            experience_level: "any".to_string(),
            education_level: None,
            source_url: format!("https://e.com/{n}"),
            source_name: "board".to_string(),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let stats = SeaOrmStatsService::new(store).stats().await.unwrap();
        assert_eq!(stats.total_jobs, 0);
        assert_eq!(stats.total_companies, 0);
        assert!(stats.jobs_by_type.is_empty());
        assert!(stats.top_locations.is_empty());
    }

    #[tokio::test]
    async fn test_aggregates() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let old = Utc::now() - Duration::days(3);
        let rows = [
            (job(1, "Acme", "Shanghai", JobType::FullTime), Utc::now()),
            (job(2, "Acme", "Beijing", JobType::FullTime), Utc::now()),
            (job(3, "Globex", "Beijing", JobType::Contract), old),
            (job(4, "Initech", "Shenzhen", JobType::Internship), old),
            (job(5, "Initech", "Beijing", JobType::FullTime), Utc::now()),
        ];
        for (job, ingested_at) in &rows {
            store.insert_job(job, *ingested_at).await.unwrap();
        }

        let stats = SeaOrmStatsService::new(store).stats().await.unwrap();
        assert_eq!(stats.total_jobs, 5);
        assert_eq!(stats.total_companies, 3);
        assert_eq!(stats.recent_jobs, 3);
        assert_eq!(stats.jobs_by_type.get("full-time"), Some(&3));
        assert_eq!(stats.jobs_by_type.get("contract"), Some(&1));
        assert_eq!(
            stats.top_locations,
            vec![
                LocationCount {
                    location: "Beijing".to_string(),
                    count: 3
                },
                LocationCount {
                    location: "Shanghai".to_string(),
                    count: 1
                },
                LocationCount {
                    location: "Shenzhen".to_string(),
                    count: 1
                },
            ]
        );
    }
}
