pub mod ingest_event;
pub mod job;
pub mod user;
