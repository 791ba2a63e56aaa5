use crate::db::is_unique_violation;
use crate::domain::job::{
    JobFilter, JobPosting, LocationCount, NewJob, Pagination, Sort, SortField, SortOrder,
};
use crate::domain::{JobType, RecordId};
use crate::entities::{jobs, prelude::*};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use std::collections::BTreeMap;

/// Outcome of an insert guarded by the `source_url` unique index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInsert {
    Inserted(RecordId),
    /// `existing_id` is `None` only if the conflicting row vanished before it
    /// could be read back.
    Duplicate { existing_id: Option<RecordId> },
}

pub struct JobRepository {
    conn: DatabaseConnection,
}

impl JobRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: jobs::Model) -> Result<JobPosting> {
        Ok(JobPosting {
            id: RecordId::parse(&m.id)?,
            requirements: serde_json::from_str(&m.requirements)
                .with_context(|| format!("Corrupt requirements for job {}", m.id))?,
            tags: serde_json::from_str(&m.tags)
                .with_context(|| format!("Corrupt tags for job {}", m.id))?,
            job_type: m
                .job_type
                .parse::<JobType>()
                .map_err(|e| anyhow::anyhow!("Corrupt job type for job {}: {e}", m.id))?,
            title: m.title,
            company: m.company,
            location: m.location,
            salary: m.salary,
            description: m.description,
            experience_level: m.experience_level,
            education_level: m.education_level,
            source_url: m.source_url,
            source_name: m.source_name,
            published_at: m.published_at,
            ingested_at: m.ingested_at,
            active: m.is_active,
        })
    }

    /// Inserts a posting. A second posting for the same source URL is
    /// reported as a duplicate by the unique index, never by a prior read.
    pub async fn insert(&self, job: &NewJob, ingested_at: DateTime<Utc>) -> Result<JobInsert> {
        let id = RecordId::generate();

        let active_model = jobs::ActiveModel {
            id: Set(id.as_str().to_string()),
            title: Set(job.title.clone()),
            company: Set(job.company.clone()),
            location: Set(job.location.clone()),
            salary: Set(job.salary.clone()),
            description: Set(job.description.clone()),
            requirements: Set(serde_json::to_string(&job.requirements)?),
            tags: Set(serde_json::to_string(&job.tags)?),
            job_type: Set(job.job_type.as_str().to_string()),
            experience_level: Set(job.experience_level.clone()),
            education_level: Set(job.education_level.clone()),
            source_url: Set(job.source_url.clone()),
            source_name: Set(job.source_name.clone()),
            published_at: Set(job.published_at),
            ingested_at: Set(ingested_at),
            is_active: Set(true),
            company_folded: Set(job.company.to_lowercase()),
            location_folded: Set(job.location.to_lowercase()),
            search_text: Set(search_text(job)),
        };

        match Jobs::insert(active_model)
            .exec_without_returning(&self.conn)
            .await
        {
            Ok(_) => Ok(JobInsert::Inserted(id)),
            Err(e) if is_unique_violation(&e) => Ok(JobInsert::Duplicate {
                existing_id: self.find_id_by_source_url(&job.source_url).await?,
            }),
            Err(e) => Err(e).context("Failed to insert job"),
        }
    }

    pub async fn find_id_by_source_url(&self, source_url: &str) -> Result<Option<RecordId>> {
        let id: Option<String> = Jobs::find()
            .select_only()
            .column(jobs::Column::Id)
            .filter(jobs::Column::SourceUrl.eq(source_url))
            .into_tuple()
            .one(&self.conn)
            .await
            .context("Failed to query job by source URL")?;

        id.map(|id| RecordId::parse(&id).map_err(Into::into))
            .transpose()
    }

    pub async fn count_by_source_url(&self, source_url: &str) -> Result<u64> {
        Jobs::find()
            .filter(jobs::Column::SourceUrl.eq(source_url))
            .count(&self.conn)
            .await
            .context("Failed to count jobs by source URL")
    }

    /// Fetches a posting regardless of its active flag.
    pub async fn get(&self, id: &RecordId) -> Result<Option<JobPosting>> {
        Jobs::find_by_id(id.as_str())
            .one(&self.conn)
            .await
            .context("Failed to query job by ID")?
            .map(Self::map_model)
            .transpose()
    }

    /// Runs a filtered listing: the requested page plus the total match count.
    pub async fn search(
        &self,
        filter: &JobFilter,
        pagination: Pagination,
        sort: Sort,
    ) -> Result<(Vec<JobPosting>, u64)> {
        let base = Jobs::find().filter(Self::filter_condition(filter));

        let order = match sort.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let sort_column = match sort.field {
            SortField::PublishedAt => jobs::Column::PublishedAt,
            SortField::IngestedAt => jobs::Column::IngestedAt,
            SortField::Title => jobs::Column::Title,
            SortField::Company => jobs::Column::Company,
        };

        let page_query = base
            .clone()
            .order_by(sort_column, order.clone())
            .order_by(jobs::Column::Id, order)
            .offset(pagination.skip())
            .limit(pagination.limit);

        let (total, rows) = futures::try_join!(
            base.count(&self.conn),
            page_query.all(&self.conn)
        )
        .context("Failed to search jobs")?;

        let jobs = rows
            .into_iter()
            .map(Self::map_model)
            .collect::<Result<Vec<_>>>()?;

        Ok((jobs, total))
    }

    fn filter_condition(filter: &JobFilter) -> Condition {
        let mut cond = Condition::all().add(jobs::Column::IsActive.eq(true));

        if let Some(keyword) = &filter.keyword {
            cond = cond.add(Expr::col(jobs::Column::SearchText).like(contains_pattern(keyword)));
        }

        if let Some(company) = &filter.company {
            cond =
                cond.add(Expr::col(jobs::Column::CompanyFolded).like(contains_pattern(company)));
        }

        if let Some(location) = &filter.location {
            cond =
                cond.add(Expr::col(jobs::Column::LocationFolded).like(contains_pattern(location)));
        }

        if let Some(job_type) = filter.job_type {
            cond = cond.add(jobs::Column::JobType.eq(job_type.as_str()));
        }

        if !filter.tags.is_empty() {
            let placeholders = vec!["?"; filter.tags.len()].join(", ");
            cond = cond.add(Expr::cust_with_values(
                format!(
                    "EXISTS (SELECT 1 FROM json_each(\"jobs\".\"tags\") WHERE json_each.value IN ({placeholders}))"
                ),
                filter.tags.iter().cloned(),
            ));
        }

        cond
    }

    fn active() -> Select<Jobs> {
        Jobs::find().filter(jobs::Column::IsActive.eq(true))
    }

    pub async fn count_active(&self) -> Result<u64> {
        Self::active()
            .count(&self.conn)
            .await
            .context("Failed to count active jobs")
    }

    pub async fn count_active_companies(&self) -> Result<u64> {
        let count: Option<i64> = Self::active()
            .select_only()
            .column_as(Expr::cust("COUNT(DISTINCT \"company\")"), "count")
            .into_tuple()
            .one(&self.conn)
            .await
            .context("Failed to count companies")?;

        Ok(count.unwrap_or(0).try_into().unwrap_or(0))
    }

    pub async fn count_active_by_type(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = Self::active()
            .select_only()
            .column(jobs::Column::JobType)
            .column_as(jobs::Column::Id.count(), "count")
            .group_by(jobs::Column::JobType)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count jobs by type")?;

        Ok(rows
            .into_iter()
            .map(|(job_type, count)| (job_type, count.try_into().unwrap_or(0)))
            .collect())
    }

    /// Most common locations, ties broken by name.
    pub async fn top_active_locations(&self, limit: u64) -> Result<Vec<LocationCount>> {
        let rows: Vec<(String, i64)> = Self::active()
            .select_only()
            .column(jobs::Column::Location)
            .column_as(jobs::Column::Id.count(), "count")
            .group_by(jobs::Column::Location)
            .order_by(Expr::cust("\"count\""), Order::Desc)
            .order_by(jobs::Column::Location, Order::Asc)
            .limit(limit)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to rank locations")?;

        Ok(rows
            .into_iter()
            .map(|(location, count)| LocationCount {
                location,
                count: count.try_into().unwrap_or(0),
            })
            .collect())
    }

    pub async fn count_active_ingested_since(&self, since: DateTime<Utc>) -> Result<u64> {
        Self::active()
            .filter(jobs::Column::IngestedAt.gte(since))
            .count(&self.conn)
            .await
            .context("Failed to count recent jobs")
    }
}

/// Keyword haystack. SQLite `LIKE` only folds ASCII, so every searchable
/// column is stored lowercased alongside the original.
fn search_text(job: &NewJob) -> String {
    [&job.title, &job.company, &job.description]
        .map(|s| s.to_lowercase())
        .join("\n")
}

/// `%term%` over the lowercased term, LIKE metacharacters escaped.
fn contains_pattern(term: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    LikeExpr::new(escaped).escape('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn new_job(url: &str, title: &str) -> NewJob {
        NewJob {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Shanghai".to_string(),
            salary: None,
            description: "Ship things".to_string(),
            requirements: vec!["Rust".to_string()],
            tags: vec!["rust".to_string(), "backend".to_string()],
            job_type: JobType::FullTime,
            experience_level: "3-5 years".to_string(),
            education_level: None,
            source_url: url.to_string(),
            source_name: "board".to_string(),
            published_at: Utc::now(),
        }
    }

    async fn repo() -> JobRepository {
        let store = Store::new("sqlite::memory:").await.unwrap();
        JobRepository::new(store.conn)
    }

    #[tokio::test]
    async fn test_duplicate_url_reports_existing_id() {
        let repo = repo().await;
        let first = repo
            .insert(&new_job("https://e.com/1", "A"), Utc::now())
            .await
            .unwrap();
        let JobInsert::Inserted(first_id) = first else {
            panic!("expected insert");
        };

        let second = repo
            .insert(&new_job("https://e.com/1", "B"), Utc::now())
            .await
            .unwrap();
        assert_eq!(
            second,
            JobInsert::Duplicate {
                existing_id: Some(first_id)
            }
        );
        assert_eq!(repo.count_by_source_url("https://e.com/1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_lists() {
        let repo = repo().await;
        let JobInsert::Inserted(id) = repo
            .insert(&new_job("https://e.com/2", "A"), Utc::now())
            .await
            .unwrap()
        else {
            panic!("expected insert");
        };

        let job = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(job.tags, vec!["rust", "backend"]);
        assert_eq!(job.requirements, vec!["Rust"]);
        assert!(job.active);
    }

    #[tokio::test]
    async fn test_like_metacharacters_are_literal() {
        let repo = repo().await;
        repo.insert(&new_job("https://e.com/3", "100% remote"), Utc::now())
            .await
            .unwrap();
        repo.insert(&new_job("https://e.com/4", "1000 remote"), Utc::now())
            .await
            .unwrap();

        let filter = JobFilter {
            keyword: Some("0%".to_string()),
            ..JobFilter::default()
        };
        let (jobs, total) = repo
            .search(&filter, Pagination::default(), Sort::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].title, "100% remote");
    }

    #[tokio::test]
    async fn test_tag_filter_matches_any() {
        let repo = repo().await;
        let mut go = new_job("https://e.com/5", "Go dev");
        go.tags = vec!["go".to_string()];
        let mut py = new_job("https://e.com/6", "Py dev");
        py.tags = vec!["python".to_string()];
        repo.insert(&go, Utc::now()).await.unwrap();
        repo.insert(&py, Utc::now()).await.unwrap();
        repo.insert(&new_job("https://e.com/7", "Rust dev"), Utc::now())
            .await
            .unwrap();

        let filter = JobFilter {
            tags: vec!["go".to_string(), "python".to_string()],
            ..JobFilter::default()
        };
        let (_, total) = repo
            .search(&filter, Pagination::default(), Sort::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
    }
}
