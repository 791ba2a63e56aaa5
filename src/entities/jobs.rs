use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// 24 hex characters
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    pub company: String,

    pub location: String,

    pub salary: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// JSON array of strings, in submission order
    #[sea_orm(column_type = "Text")]
    pub requirements: String,

    /// JSON array of distinct strings
    #[sea_orm(column_type = "Text")]
    pub tags: String,

    pub job_type: String,

    pub experience_level: String,

    pub education_level: Option<String>,

    /// At most one posting per source URL; enforced by the store.
    #[sea_orm(unique)]
    pub source_url: String,

    pub source_name: String,

    pub published_at: DateTimeUtc,

    pub ingested_at: DateTimeUtc,

    pub is_active: bool,

    /// Lowercased `company`, matched by the company filter
    pub company_folded: String,

    /// Lowercased `location`, matched by the location filter
    pub location_folded: String,

    /// Lowercased title, company and description, newline separated
    #[sea_orm(column_type = "Text")]
    pub search_text: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
