//! Posting schemas: ingestion payloads, search queries and their results.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::validation::{FieldErrors, Validate, ValidationErrors};
use super::{JobType, RecordId};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_COMPANY_CHARS: usize = 100;
pub const MAX_LOCATION_CHARS: usize = 100;
pub const MAX_SALARY_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_TAGS: usize = 20;
pub const MAX_LEVEL_CHARS: usize = 50;
pub const MAX_SOURCE_NAME_CHARS: usize = 50;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 50;
const MAX_FILTER_CHARS: usize = 100;
const MAX_FILTER_TAGS: usize = 10;
const MAX_FILTER_TAG_CHARS: usize = 50;

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

/// A stored posting as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    pub id: RecordId,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    pub description: String,
    pub requirements: Vec<String>,
    pub tags: Vec<String>,
    pub job_type: JobType,
    pub experience_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_level: Option<String>,
    pub source_url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub active: bool,
}

/// Raw posting pushed by a scraping agent.
///
/// Field names follow the agent protocol; the short legacy names (`url`,
/// `source`, `experience`, `education`) are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub job_type: Option<String>,
    #[serde(alias = "experience")]
    pub experience_level: Option<String>,
    #[serde(alias = "education")]
    pub education_level: Option<String>,
    #[serde(alias = "url")]
    pub source_url: Option<String>,
    #[serde(alias = "source")]
    pub source_name: Option<String>,
    pub published_at: Option<String>,
}

/// A posting that passed validation and is ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub description: String,
    pub requirements: Vec<String>,
    pub tags: Vec<String>,
    pub job_type: JobType,
    pub experience_level: String,
    pub education_level: Option<String>,
    pub source_url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
}

impl Validate for JobSubmission {
    type Output = NewJob;

    fn validate(self) -> Result<NewJob, ValidationErrors> {
        let mut errors = FieldErrors::new();

        let title = errors.required_text("title", self.title, MAX_TITLE_CHARS);
        let company = errors.required_text("company", self.company, MAX_COMPANY_CHARS);
        let location = errors.required_text("location", self.location, MAX_LOCATION_CHARS);
        let salary = errors.optional_text("salary", self.salary, MAX_SALARY_CHARS);
        let description =
            errors.required_text("description", self.description, MAX_DESCRIPTION_CHARS);
        let experience_level =
            errors.required_text("experienceLevel", self.experience_level, MAX_LEVEL_CHARS);
        let education_level =
            errors.optional_text("educationLevel", self.education_level, MAX_LEVEL_CHARS);
        let source_name =
            errors.required_text("sourceName", self.source_name, MAX_SOURCE_NAME_CHARS);

        let requirements: Vec<String> = self
            .requirements
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags.unwrap_or_default() {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        if tags.len() > MAX_TAGS {
            errors.push("tags", format!("must contain at most {MAX_TAGS} tags"));
        }

        let job_type = match self.job_type.as_deref().map(str::trim) {
            None | Some("") => Some(JobType::default()),
            Some(raw) => match raw.parse() {
                Ok(t) => Some(t),
                Err(msg) => {
                    errors.push("jobType", msg);
                    None
                }
            },
        };

        let source_url = match self.source_url.map(|u| u.trim().to_string()) {
            Some(u) if !u.is_empty() => match url::Url::parse(&u) {
                Ok(_) => Some(u),
                Err(_) => {
                    errors.push("sourceUrl", "must be an absolute URI");
                    None
                }
            },
            _ => {
                errors.push("sourceUrl", "is required");
                None
            }
        };

        let published_at = match self.published_at.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    errors.push("publishedAt", "must be an ISO 8601 timestamp");
                }
                parsed
            }
            _ => {
                errors.push("publishedAt", "is required");
                None
            }
        };

        match (
            title,
            company,
            location,
            description,
            job_type,
            experience_level,
            source_url,
            source_name,
            published_at,
        ) {
            (
                Some(title),
                Some(company),
                Some(location),
                Some(description),
                Some(job_type),
                Some(experience_level),
                Some(source_url),
                Some(source_name),
                Some(published_at),
            ) => errors.finish(|| NewJob {
                title,
                company,
                location,
                salary,
                description,
                requirements,
                tags,
                job_type,
                experience_level,
                education_level,
                source_url,
                source_name,
                published_at,
            }),
            _ => Err(errors.into_error()),
        }
    }
}

/// Acknowledgement returned for a newly stored posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub job_id: RecordId,
    pub title: String,
    pub company: String,
}

/// Notice that a scraping batch is about to begin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStartNotice {
    pub sources: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub cities: Option<Vec<String>>,
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStart {
    pub sources: Vec<String>,
    pub keywords: Vec<String>,
    pub cities: Vec<String>,
    pub start_time: DateTime<Utc>,
}

impl Validate for RunStartNotice {
    type Output = RunStart;

    fn validate(self) -> Result<RunStart, ValidationErrors> {
        let mut errors = FieldErrors::new();

        let mut required_list = |field: &str, value: Option<Vec<String>>| {
            value.map_or_else(
                || {
                    errors.push(field, "is required");
                    Vec::new()
                },
                |items| items.into_iter().map(|s| s.trim().to_string()).collect(),
            )
        };

        let sources = required_list("sources", self.sources);
        let keywords = required_list("keywords", self.keywords);
        let cities = required_list("cities", self.cities);
        let start_time = required_timestamp(&mut errors, "startTime", self.start_time.as_deref());

        errors.finish(|| RunStart {
            sources,
            keywords,
            cities,
            start_time: start_time.unwrap_or_default(),
        })
    }
}

/// Notice that a scraping batch has completed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFinishNotice {
    #[serde(alias = "totalScraped")]
    pub total_ingested: Option<i64>,
    pub finish_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFinish {
    pub total_ingested: u64,
    pub finish_time: DateTime<Utc>,
}

impl Validate for RunFinishNotice {
    type Output = RunFinish;

    fn validate(self) -> Result<RunFinish, ValidationErrors> {
        let mut errors = FieldErrors::new();

        let total_ingested = match self.total_ingested {
            Some(n) => u64::try_from(n).unwrap_or_else(|_| {
                errors.push("totalIngested", "must be a non-negative integer");
                0
            }),
            None => {
                errors.push("totalIngested", "is required");
                0
            }
        };
        let finish_time =
            required_timestamp(&mut errors, "finishTime", self.finish_time.as_deref());

        errors.finish(|| RunFinish {
            total_ingested,
            finish_time: finish_time.unwrap_or_default(),
        })
    }
}

fn required_timestamp(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
) -> Option<DateTime<Utc>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                errors.push(field, "must be an ISO 8601 timestamp");
            }
            parsed
        }
        _ => {
            errors.push(field, "is required");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    PublishedAt,
    IngestedAt,
    Title,
    Company,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "publishedAt" => Some(Self::PublishedAt),
            // `scrapedAt` is the name older agents and clients still send.
            "ingestedAt" | "scrapedAt" => Some(Self::IngestedAt),
            "title" => Some(Self::Title),
            "company" => Some(Self::Company),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobFilter {
    pub keyword: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<JobType>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Rows to skip before this page, clamped to what the store can address.
    #[must_use]
    pub fn skip(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListRequest {
    pub filter: JobFilter,
    pub pagination: Pagination,
    pub sort: Sort,
}

/// Raw listing query as received on the query string.
///
/// Built from key/value pairs so `tags` may repeat (`tags=a&tags=b`, `tags[]=a`)
/// or arrive comma separated.
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub keyword: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub tags: Vec<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub unknown: Vec<String>,
}

impl JobListQuery {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => query.page = Some(value),
                "limit" => query.limit = Some(value),
                "keyword" => query.keyword = Some(value),
                "company" => query.company = Some(value),
                "location" => query.location = Some(value),
                "jobType" => query.job_type = Some(value),
                "tags" | "tags[]" => query.tags.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                ),
                "sortBy" => query.sort_by = Some(value),
                "sortOrder" => query.sort_order = Some(value),
                _ => query.unknown.push(key),
            }
        }
        query
    }
}

impl Validate for JobListQuery {
    type Output = ListRequest;

    fn validate(self) -> Result<ListRequest, ValidationErrors> {
        let mut errors = FieldErrors::new();

        for key in &self.unknown {
            errors.push(key, "is not allowed");
        }

        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => match raw.parse::<u64>() {
                Ok(p) if p >= 1 => p,
                _ => {
                    errors.push("page", "must be an integer >= 1");
                    1
                }
            },
        };

        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PAGE_SIZE,
            Some(raw) => match raw.parse::<u64>() {
                Ok(l) if (1..=MAX_PAGE_SIZE).contains(&l) => l,
                _ => {
                    errors.push("limit", format!("must be an integer between 1 and {MAX_PAGE_SIZE}"));
                    DEFAULT_PAGE_SIZE
                }
            },
        };

        let keyword = errors.optional_text("keyword", self.keyword, MAX_FILTER_CHARS);
        let company = errors.optional_text("company", self.company, MAX_FILTER_CHARS);
        let location = errors.optional_text("location", self.location, MAX_FILTER_CHARS);

        let job_type = match self.job_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => raw
                .parse()
                .map_err(|msg: String| errors.push("jobType", msg))
                .ok(),
        };

        if self.tags.len() > MAX_FILTER_TAGS {
            errors.push("tags", format!("must contain at most {MAX_FILTER_TAGS} tags"));
        }
        if self
            .tags
            .iter()
            .any(|t| t.chars().count() > MAX_FILTER_TAG_CHARS)
        {
            errors.push(
                "tags",
                format!("each tag must be at most {MAX_FILTER_TAG_CHARS} characters"),
            );
        }

        let field = match self.sort_by.as_deref().map(str::trim) {
            None | Some("") => SortField::default(),
            Some(raw) => SortField::parse(raw).unwrap_or_else(|| {
                errors.push(
                    "sortBy",
                    "must be one of: publishedAt, ingestedAt, title, company",
                );
                SortField::default()
            }),
        };

        let order = match self.sort_order.as_deref().map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => {
                errors.push("sortOrder", "must be one of: asc, desc");
                SortOrder::default()
            }
        };

        let tags = self.tags;
        errors.finish(|| ListRequest {
            filter: JobFilter {
                keyword,
                company,
                location,
                job_type,
                tags,
            },
            pagination: Pagination { page, limit },
            sort: Sort { field, order },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_jobs: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    #[must_use]
    pub const fn new(pagination: Pagination, total: u64) -> Self {
        let total_pages = total.div_ceil(pagination.limit);
        Self {
            current_page: pagination.page,
            total_pages,
            total_jobs: total,
            limit: pagination.limit,
            has_next: pagination.page < total_pages,
            has_prev: pagination.page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobPosting>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total_jobs: u64,
    pub total_companies: u64,
    /// Active postings ingested within the trailing 24 hours.
    pub recent_jobs: u64,
    pub jobs_by_type: BTreeMap<String, u64>,
    pub top_locations: Vec<LocationCount>,
}
