pub mod token;
pub use token::{Claims, TokenError, TokenSigner};

pub mod request_gate;
pub use request_gate::{Admission, PolicyClass, RateLimited, RequestGate};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod ingest_service;
pub mod ingest_service_impl;
pub use ingest_service::{IngestError, IngestService, TriggerOutcome};
pub use ingest_service_impl::SeaOrmIngestService;

pub mod job_search_service;
pub mod job_search_service_impl;
pub use job_search_service::{JobSearchService, SearchError};
pub use job_search_service_impl::SeaOrmJobSearchService;

pub mod stats_service;
pub mod stats_service_impl;
pub use stats_service::{StatsError, StatsService};
pub use stats_service_impl::SeaOrmStatsService;
