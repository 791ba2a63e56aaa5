pub mod prelude;

pub mod ingest_events;
pub mod jobs;
pub mod users;
