pub use super::ingest_events::Entity as IngestEvents;
pub use super::jobs::Entity as Jobs;
pub use super::users::Entity as Users;
