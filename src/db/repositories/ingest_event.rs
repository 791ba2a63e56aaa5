use crate::entities::{ingest_events, prelude::*};
use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

pub struct IngestEventRepository {
    conn: DatabaseConnection,
}

impl IngestEventRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(
        &self,
        event_type: &str,
        message: &str,
        details: Option<String>,
    ) -> Result<()> {
        let active_model = ingest_events::ActiveModel {
            event_type: Set(event_type.to_string()),
            message: Set(message.to_string()),
            details: Set(details),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        IngestEvents::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to record ingest event")?;
        Ok(())
    }

    /// Newest first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<ingest_events::Model>> {
        IngestEvents::find()
            .order_by_desc(ingest_events::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list ingest events")
    }
}
