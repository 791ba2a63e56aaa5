//! Field-level validation for inbound payloads.
//!
//! Every request schema implements [`Validate`], turning its raw form into a
//! typed value or a [`ValidationErrors`] listing each offending field.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self(vec![FieldError {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<FieldError> {
        self.0
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(first) if self.0.len() == 1 => write!(f, "{} {}", first.field, first.message),
            Some(first) => write!(
                f,
                "{} {} (and {} more)",
                first.field,
                first.message,
                self.0.len() - 1
            ),
            None => f.write_str("invalid input"),
        }
    }
}

/// Turns a raw schema into its validated form.
pub trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output, ValidationErrors>;
}

/// Collects errors while a schema is checked field by field.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Trims a required text field and checks its length in characters.
    pub fn required_text(
        &mut self,
        field: &str,
        value: Option<String>,
        max_chars: usize,
    ) -> Option<String> {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => self.check_max_chars(field, v, max_chars),
            _ => {
                self.push(field, "is required");
                None
            }
        }
    }

    /// Trims an optional text field; blank values become `None`.
    pub fn optional_text(
        &mut self,
        field: &str,
        value: Option<String>,
        max_chars: usize,
    ) -> Option<String> {
        let v = value.map(|v| v.trim().to_string())?;
        if v.is_empty() {
            return None;
        }
        self.check_max_chars(field, v, max_chars)
    }

    fn check_max_chars(&mut self, field: &str, value: String, max_chars: usize) -> Option<String> {
        if value.chars().count() > max_chars {
            self.push(field, format!("must be at most {max_chars} characters"));
            None
        } else {
            Some(value)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the collected errors, for paths where a required value is
    /// already known to be missing.
    #[must_use]
    pub fn into_error(self) -> ValidationErrors {
        if self.0.is_empty() {
            ValidationErrors::single("body", "is invalid")
        } else {
            ValidationErrors(self.0)
        }
    }

    /// Finishes validation, yielding `value` only when nothing was recorded.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims_and_limits() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            errors.required_text("title", Some("  Engineer ".to_string()), 20),
            Some("Engineer".to_string())
        );
        assert!(errors.is_empty());

        assert_eq!(errors.required_text("title", Some("   ".to_string()), 20), None);
        assert_eq!(errors.required_text("company", None, 20), None);
        assert_eq!(errors.required_text("location", Some("x".repeat(21)), 20), None);

        let err = errors.finish(|| ()).unwrap_err();
        assert_eq!(err.fields().len(), 3);
        assert!(err.has_field("title"));
        assert!(err.has_field("company"));
        assert!(err.has_field("location"));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let mut errors = FieldErrors::new();
        let cjk = "后端开发工程师";
        assert_eq!(
            errors.required_text("title", Some(cjk.to_string()), 7),
            Some(cjk.to_string())
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_optional_text_blank_is_none() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.optional_text("salary", Some("  ".to_string()), 50), None);
        assert_eq!(errors.optional_text("salary", None, 50), None);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_display_summarizes_first_error() {
        let mut errors = FieldErrors::new();
        errors.push("limit", "must be between 1 and 50");
        errors.push("page", "must be a positive integer");
        let err = errors.finish(|| ()).unwrap_err();
        assert_eq!(err.to_string(), "limit must be between 1 and 50 (and 1 more)");
    }
}
