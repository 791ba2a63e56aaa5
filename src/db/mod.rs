use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::RecordId;
use crate::domain::job::{JobFilter, JobPosting, LocationCount, NewJob, Pagination, Sort};

pub mod migrator;
pub mod repositories;

pub use crate::entities::ingest_events::Model as IngestEvent;
pub use repositories::job::JobInsert;
pub use repositories::user::{NewUser, User, UserInsert};

/// True when `err` is a unique index rejecting an insert.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        if in_memory {
            // Every pooled connection would otherwise see its own empty database.
            opt.max_connections(1).min_connections(1);
        } else {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }

            opt.max_connections(max_connections)
                .min_connections(min_connections)
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            if in_memory { 1 } else { min_connections },
            if in_memory { 1 } else { max_connections }
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn job_repo(&self) -> repositories::job::JobRepository {
        repositories::job::JobRepository::new(self.conn.clone())
    }

    fn ingest_event_repo(&self) -> repositories::ingest_event::IngestEventRepository {
        repositories::ingest_event::IngestEventRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    // ========== Job Repository Methods ==========

    pub async fn insert_job(&self, job: &NewJob, ingested_at: DateTime<Utc>) -> Result<JobInsert> {
        self.job_repo().insert(job, ingested_at).await
    }

    pub async fn get_job(&self, id: &RecordId) -> Result<Option<JobPosting>> {
        self.job_repo().get(id).await
    }

    pub async fn count_jobs_by_source_url(&self, source_url: &str) -> Result<u64> {
        self.job_repo().count_by_source_url(source_url).await
    }

    pub async fn search_jobs(
        &self,
        filter: &JobFilter,
        pagination: Pagination,
        sort: Sort,
    ) -> Result<(Vec<JobPosting>, u64)> {
        self.job_repo().search(filter, pagination, sort).await
    }

    pub async fn count_active_jobs(&self) -> Result<u64> {
        self.job_repo().count_active().await
    }

    pub async fn count_active_companies(&self) -> Result<u64> {
        self.job_repo().count_active_companies().await
    }

    pub async fn count_active_jobs_by_type(&self) -> Result<BTreeMap<String, u64>> {
        self.job_repo().count_active_by_type().await
    }

    pub async fn top_active_locations(&self, limit: u64) -> Result<Vec<LocationCount>> {
        self.job_repo().top_active_locations(limit).await
    }

    pub async fn count_active_jobs_ingested_since(&self, since: DateTime<Utc>) -> Result<u64> {
        self.job_repo().count_active_ingested_since(since).await
    }

    // ========== Ingest Event Methods ==========

    pub async fn add_ingest_event(
        &self,
        event_type: &str,
        message: &str,
        details: Option<String>,
    ) -> Result<()> {
        self.ingest_event_repo()
            .add(event_type, message, details)
            .await
    }

    pub async fn recent_ingest_events(&self, limit: u64) -> Result<Vec<IngestEvent>> {
        self.ingest_event_repo().recent(limit).await
    }

    // ========== User Repository Methods ==========

    pub async fn create_user(
        &self,
        new_user: NewUser<'_>,
        security: &SecurityConfig,
    ) -> Result<UserInsert> {
        self.user_repo().create(new_user, security).await
    }

    pub async fn get_user(&self, id: &RecordId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_user_credentials(
        &self,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo()
            .verify_credentials(email, password, security)
            .await
    }

    pub async fn touch_user_last_login(&self, id: &RecordId, at: DateTime<Utc>) -> Result<()> {
        self.user_repo().touch_last_login(id, at).await
    }

    pub async fn set_user_active(&self, id: &RecordId, is_active: bool) -> Result<()> {
        self.user_repo().set_active(id, is_active).await
    }

    pub async fn count_users_by_email(&self, email: &str) -> Result<u64> {
        self.user_repo().count_by_email(email).await
    }
}
