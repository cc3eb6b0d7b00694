//! `AppliedMigrationRecord` - Represents entries in the migrations ledger collection

use crate::executor::{DocError, Document};
use crate::migration::MigrationDefinition;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Represents a ledger document: `{ file, className, appliedAt }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigrationRecord {
    /// Source file the migration was loaded from
    pub file: PathBuf,

    /// Exported name of the migration
    pub class_name: String,

    /// When the migration was applied
    #[serde(with = "applied_at_format")]
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigrationRecord {
    #[must_use]
    pub fn new(file: PathBuf, class_name: impl Into<String>, applied_at: DateTime<Utc>) -> Self {
        Self {
            file,
            class_name: class_name.into(),
            applied_at,
        }
    }

    /// Record for `definition`, applied at `applied_at`
    #[must_use]
    pub fn for_definition(definition: &MigrationDefinition, applied_at: DateTime<Utc>) -> Self {
        Self::new(definition.file.clone(), definition.class_name.clone(), applied_at)
    }

    /// # Errors
    ///
    /// Returns `DocError::Serialization` if the file path is not valid UTF-8.
    pub fn to_document(&self) -> Result<Document, DocError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(DocError::Other(format!(
                "ledger record serialized to a non-object: {other}"
            ))),
        }
    }

    /// Parse a ledger document; unknown fields (store ids) are ignored
    ///
    /// # Errors
    ///
    /// Returns `DocError::Serialization` if a field is missing or malformed.
    pub fn from_document(document: Document) -> Result<Self, DocError> {
        Ok(serde_json::from_value(serde_json::Value::Object(document))?)
    }
}

/// Fixed-width UTC timestamp format: lexicographic order equals chronological order
pub const APPLIED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a timestamp the way the ledger stores it
#[must_use]
pub fn format_applied_at(at: &DateTime<Utc>) -> String {
    at.format(APPLIED_AT_FORMAT).to_string()
}

/// Parse a stored timestamp
///
/// Accepts the canonical format as well as RFC 3339 with any precision or
/// offset and space-separated variants written by other tools.
///
/// # Errors
///
/// Returns a description of the unrecognized input.
pub fn parse_applied_at(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let trimmed = value.trim_end_matches('Z');
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!("Failed to parse timestamp '{value}': unrecognized format"))
}

mod applied_at_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_applied_at(at))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_applied_at(&raw).map_err(serde::de::Error::custom)
    }
}
