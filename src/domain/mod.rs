//! Domain types shared by the services and the HTTP layer.
//!
//! Identifiers, enums stored as text, and the request schemas that turn
//! loosely-typed payloads into validated values.

pub mod job;
pub mod user;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use validation::{FieldError, ValidationErrors};

/// Number of hex characters in a [`RecordId`].
pub const RECORD_ID_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid identifier: {0}")]
pub struct InvalidRecordId(pub String);

/// Identifier for stored postings and users: 24 lowercase hex characters.
///
/// Parsing happens before anything touches the store, so a malformed id is
/// rejected without a query.
///
/// # Examples
///
/// ```rust
/// use jobhound::domain::RecordId;
///
/// let id = RecordId::parse("64ae0f1c2b3d4e5f60718293").unwrap();
/// assert_eq!(id.as_str(), "64ae0f1c2b3d4e5f60718293");
/// assert!(RecordId::parse("not-24-hex").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn parse(raw: &str) -> Result<Self, InvalidRecordId> {
        if raw.len() == RECORD_ID_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(InvalidRecordId(raw.to_string()))
        }
    }

    /// Generates a fresh id from 12 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;

        let bytes: [u8; RECORD_ID_LEN / 2] = rand::rng().random();

        Self(
            bytes
                .iter()
                .fold(String::with_capacity(RECORD_ID_LEN), |mut acc, b| {
                    use std::fmt::Write;
                    let _ = write!(acc, "{b:02x}");
                    acc
                }),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = InvalidRecordId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl JobType {
    pub const ALL: [Self; 4] = [
        Self::FullTime,
        Self::PartTime,
        Self::Contract,
        Self::Internship,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullTime => "full-time",
            Self::PartTime => "part-time",
            Self::Contract => "contract",
            Self::Internship => "internship",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "must be one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_parse() {
        assert!(RecordId::parse("0123456789abcdefABCDEF01").is_ok());
        assert!(RecordId::parse("0123456789abcdef0123456").is_err());
        assert!(RecordId::parse("0123456789abcdef012345678").is_err());
        assert!(RecordId::parse("0123456789abcdef0123456g").is_err());
        assert!(RecordId::parse("").is_err());
    }

    #[test]
    fn test_record_id_normalizes_case() {
        let id = RecordId::parse("ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(id.as_str(), "abcdef0123456789abcdef01");
    }

    #[test]
    fn test_generated_ids_are_well_formed_and_distinct() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert!(RecordId::parse(a.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_job_type_wire_format() {
        assert_eq!("part-time".parse::<JobType>(), Ok(JobType::PartTime));
        assert!("fulltime".parse::<JobType>().is_err());
        assert_eq!(
            serde_json::to_string(&JobType::Internship).unwrap(),
            "\"internship\""
        );
        assert_eq!(JobType::default(), JobType::FullTime);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }
}
