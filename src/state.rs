use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, IngestService, JobSearchService, RequestGate, SeaOrmAuthService,
    SeaOrmIngestService, SeaOrmJobSearchService, SeaOrmStatsService, StatsService,
};

/// Build the HTTP client used for outbound calls to the scraping automation.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("jobhound/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub request_gate: Arc<RequestGate>,

    pub auth_service: Arc<dyn AuthService>,

    pub ingest_service: Arc<dyn IngestService>,

    pub job_search_service: Arc<dyn JobSearchService>,

    pub stats_service: Arc<dyn StatsService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::with_store(config, store)
    }

    /// Wires the services around an already opened store.
    pub fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client(config.ingest.trigger_timeout_seconds)?;

        let request_gate = Arc::new(RequestGate::new(&config.rate_limit));

        let auth_service = Arc::new(SeaOrmAuthService::new(store.clone(), config.auth.clone()))
            as Arc<dyn AuthService + Send + Sync + 'static>;

        let ingest_service = Arc::new(SeaOrmIngestService::new(
            store.clone(),
            http_client,
            &config.ingest,
        )) as Arc<dyn IngestService + Send + Sync + 'static>;

        let job_search_service = Arc::new(SeaOrmJobSearchService::new(store.clone()))
            as Arc<dyn JobSearchService + Send + Sync + 'static>;

        let stats_service = Arc::new(SeaOrmStatsService::new(store.clone()))
            as Arc<dyn StatsService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(config),
            store,
            request_gate,
            auth_service,
            ingest_service,
            job_search_service,
            stats_service,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
