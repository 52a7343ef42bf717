//! External record source: paginated listing and archiving of records.
//!
//! The sweep consumes exactly two operations, so the trait stays narrow:
//! fetch one page of a collection, archive one record. [`HttpSource`]
//! talks to the real records API; [`MemorySource`] serves scripted pages
//! for tests and dry runs.

pub mod error;
pub mod http;
pub mod memory;

pub use error::SourceError;
pub use http::HttpSource;
pub use memory::MemorySource;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// A single typed property on a record.
///
/// Records carry a heterogeneous property bag; each value declares its
/// kind so consumers look fields up by kind instead of guessing from
/// the property's name or shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    /// The record's display title.
    Title { value: String },
    /// Free-form text.
    Text { value: String },
    /// Numeric value.
    Number { value: f64 },
    /// Boolean flag.
    Checkbox { value: bool },
}

/// A record as returned by the external source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    /// Source-assigned record id.
    pub id: String,
    /// Named properties keyed by property name.
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
    /// When the record was created at the source.
    pub created_at: DateTime<Utc>,
}

impl SourceRecord {
    /// Creates a record with an empty property bag.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            properties: HashMap::new(),
            created_at,
        }
    }

    /// Adds a named property, replacing any previous value under `name`.
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Returns the record's display title: the value of the title-kind
    /// property, whatever the property is named. Collections declare at
    /// most one title property.
    pub fn display_title(&self) -> Option<&str> {
        self.properties.values().find_map(|value| match value {
            PropertyValue::Title { value } => Some(value.as_str()),
            _ => None,
        })
    }
}

/// One page of records from the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    /// Records in this page.
    pub records: Vec<SourceRecord>,
    /// Continuation token for the next page; meaningful only while
    /// `has_more` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Whether more pages remain after this one.
    pub has_more: bool,
}

/// Paginated record listing and archiving, as consumed by the sweep.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches one page of records from the collection `source_id`,
    /// continuing from `cursor` (`None` starts from the beginning).
    async fn query_page(
        &self,
        credential: &SecretString,
        source_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> error::Result<RecordPage>;

    /// Archives a single record by id.
    async fn archive_record(&self, credential: &SecretString, record_id: &str)
        -> error::Result<()>;
}
