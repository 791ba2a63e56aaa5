use crate::entities::prelude::*;
use crate::entities::{ingest_events, jobs};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Unique username/email and source_url come from the entity definitions.
        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Jobs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(IngestEvents)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_published_at")
                    .table(Jobs)
                    .col(jobs::Column::PublishedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_ingested_at")
                    .table(Jobs)
                    .col(jobs::Column::IngestedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_company_location")
                    .table(Jobs)
                    .col(jobs::Column::Company)
                    .col(jobs::Column::Location)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_is_active")
                    .table(Jobs)
                    .col(jobs::Column::IsActive)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ingest_events_created_at")
                    .table(IngestEvents)
                    .col(ingest_events::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IngestEvents).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await
    }
}
