//! `SeaORM` implementation of the `IngestService` trait.

use crate::config::IngestConfig;
use crate::db::{JobInsert, Store};
use crate::domain::job::{IngestReceipt, NewJob, RunFinish, RunStart};
use crate::services::ingest_service::{IngestError, IngestService, TriggerOutcome};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

pub const EVENT_RUN_START: &str = "scrape_start";
pub const EVENT_RUN_FINISH: &str = "scrape_finish";
pub const EVENT_RUN_TRIGGER: &str = "scrape_trigger";

pub struct SeaOrmIngestService {
    store: Store,
    http: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl SeaOrmIngestService {
    #[must_use]
    pub fn new(store: Store, http: reqwest::Client, config: &IngestConfig) -> Self {
        Self {
            store,
            http,
            webhook_url: config.trigger_webhook_url.clone(),
            timeout: Duration::from_secs(config.trigger_timeout_seconds),
        }
    }

    async fn record(
        &self,
        event_type: &str,
        message: &str,
        details: &(impl serde::Serialize + Sync),
    ) -> Result<(), IngestError> {
        let details = serde_json::to_string(details).ok();
        self.store
            .add_ingest_event(event_type, message, details)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IngestService for SeaOrmIngestService {
    async fn ingest(&self, job: NewJob) -> Result<IngestReceipt, IngestError> {
        match self.store.insert_job(&job, Utc::now()).await? {
            JobInsert::Inserted(job_id) => {
                metrics::counter!("jobs_ingested_total", "source" => job.source_name.clone())
                    .increment(1);
                info!(
                    job_id = %job_id,
                    source = %job.source_name,
                    company = %job.company,
                    "Job ingested"
                );
                Ok(IngestReceipt {
                    job_id,
                    title: job.title,
                    company: job.company,
                })
            }
            JobInsert::Duplicate {
                existing_id: Some(existing_id),
            } => {
                metrics::counter!("jobs_duplicate_total", "source" => job.source_name.clone())
                    .increment(1);
                info!(
                    existing_id = %existing_id,
                    source_url = %job.source_url,
                    "Duplicate job skipped"
                );
                Err(IngestError::DuplicateUrl { existing_id })
            }
            JobInsert::Duplicate { existing_id: None } => Err(IngestError::Internal(format!(
                "Conflicting job for {} disappeared",
                job.source_url
            ))),
        }
    }

    async fn notify_start(&self, run: RunStart) -> Result<(), IngestError> {
        info!(
            sources = ?run.sources,
            keywords = ?run.keywords,
            cities = ?run.cities,
            start_time = %run.start_time,
            "Scraping run started"
        );
        self.record(EVENT_RUN_START, "Scraping run started", &run)
            .await
    }

    async fn notify_finish(&self, run: RunFinish) -> Result<(), IngestError> {
        info!(
            total_ingested = run.total_ingested,
            finish_time = %run.finish_time,
            "Scraping run finished"
        );
        self.record(
            EVENT_RUN_FINISH,
            &format!("Scraping run finished with {} jobs", run.total_ingested),
            &run,
        )
        .await
    }

    async fn trigger_run(&self) -> Result<TriggerOutcome, IngestError> {
        let requested_at = Utc::now();
        let details = serde_json::json!({ "requestedAt": requested_at });

        let Some(url) = &self.webhook_url else {
            info!("Scraper trigger acknowledged; no automation endpoint configured");
            self.record(EVENT_RUN_TRIGGER, "Scraper trigger acknowledged", &details)
                .await?;
            return Ok(TriggerOutcome::Acknowledged);
        };

        let result = self
            .http
            .post(url)
            .json(&details)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(_) => {
                info!("Scraper trigger dispatched");
                self.record(EVENT_RUN_TRIGGER, "Scraper trigger dispatched", &details)
                    .await?;
                Ok(TriggerOutcome::Dispatched)
            }
            Err(e) if e.is_timeout() => {
                warn!(timeout_secs = self.timeout.as_secs(), "Scraper trigger timed out");
                self.record(EVENT_RUN_TRIGGER, "Scraper trigger timed out", &details)
                    .await?;
                Err(IngestError::TriggerTimeout(self.timeout.as_secs()))
            }
            Err(e) => {
                warn!(error = %e, "Scraper trigger failed");
                self.record(EVENT_RUN_TRIGGER, "Scraper trigger failed", &details)
                    .await?;
                Err(IngestError::TriggerFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobType;

    fn job(url: &str) -> NewJob {
        NewJob {
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            salary: Some("20k".to_string()),
            description: "Build APIs".to_string(),
            requirements: Vec::new(),
            tags: vec!["rust".to_string()],
            job_type: JobType::FullTime,
            experience_level: "senior".to_string(),
            education_level: None,
            source_url: url.to_string(),
            source_name: "board".to_string(),
            published_at: Utc::now(),
        }
    }

    async fn service(config: IngestConfig) -> (SeaOrmIngestService, Store) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        (
            SeaOrmIngestService::new(store.clone(), reqwest::Client::new(), &config),
            store,
        )
    }

    #[tokio::test]
    async fn test_second_ingest_of_same_url_is_duplicate() {
        let (svc, store) = service(IngestConfig::default()).await;
        let receipt = svc.ingest(job("https://jobs.example.com/1")).await.unwrap();
        assert_eq!(receipt.title, "Backend Engineer");

        let err = svc
            .ingest(job("https://jobs.example.com/1"))
            .await
            .unwrap_err();
        match err {
            IngestError::DuplicateUrl { existing_id } => assert_eq!(existing_id, receipt.job_id),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(
            store
                .count_jobs_by_source_url("https://jobs.example.com/1")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_concurrent_ingest_stores_one_record() {
        let (svc, store) = service(IngestConfig::default()).await;
        let svc = std::sync::Arc::new(svc);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.ingest(job("https://jobs.example.com/race")).await })
            })
            .collect();

        let mut inserted = Vec::new();
        let mut duplicates = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => inserted.push(receipt.job_id),
                Err(IngestError::DuplicateUrl { existing_id }) => duplicates.push(existing_id),
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(inserted.len(), 1);
        assert_eq!(duplicates.len(), 7);
        assert!(duplicates.iter().all(|id| *id == inserted[0]));
        assert_eq!(
            store
                .count_jobs_by_source_url("https://jobs.example.com/race")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_notices_leave_audit_trail() {
        let (svc, store) = service(IngestConfig::default()).await;
        svc.notify_start(RunStart {
            sources: vec!["board".to_string()],
            keywords: vec!["rust".to_string()],
            cities: vec!["北京".to_string()],
            start_time: Utc::now(),
        })
        .await
        .unwrap();
        svc.notify_finish(RunFinish {
            total_ingested: 42,
            finish_time: Utc::now(),
        })
        .await
        .unwrap();

        let events = store.recent_ingest_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EVENT_RUN_FINISH);
        assert!(events[0].message.contains("42"));
        assert_eq!(events[1].event_type, EVENT_RUN_START);
        assert!(events[1].details.as_deref().unwrap().contains("北京"));
    }

    #[tokio::test]
    async fn test_trigger_without_webhook_acknowledges() {
        let (svc, store) = service(IngestConfig::default()).await;
        assert_eq!(svc.trigger_run().await.unwrap(), TriggerOutcome::Acknowledged);
        assert_eq!(
            store.recent_ingest_events(1).await.unwrap()[0].event_type,
            EVENT_RUN_TRIGGER
        );
    }

    #[tokio::test]
    async fn test_trigger_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (svc, _) = service(IngestConfig {
            trigger_webhook_url: Some(format!("http://{addr}/run")),
            trigger_timeout_seconds: 1,
        })
        .await;

        assert!(matches!(
            svc.trigger_run().await,
            Err(IngestError::TriggerTimeout(1))
        ));
    }

    #[tokio::test]
    async fn test_trigger_unreachable_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (svc, _) = service(IngestConfig {
            trigger_webhook_url: Some(format!("http://{addr}/run")),
            trigger_timeout_seconds: 5,
        })
        .await;

        assert!(matches!(
            svc.trigger_run().await,
            Err(IngestError::TriggerFailed(_))
        ));
    }
}
