//! Core data models used throughout the datasheet index.
//!
//! These types describe the provenance metadata that travels with every
//! stored chunk, the filter predicates applied during retrieval, and the
//! results handed back to callers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel recorded when a field's value is not known (e.g. a file hash for
/// an unreadable source, or an unspecified manufacturer).
pub const UNKNOWN: &str = "unknown";

/// Caller-supplied description of the component a datasheet belongs to.
///
/// All fields are optional; missing values are recorded with conventional
/// defaults (`"unknown"` for identity fields, empty for free text) so that
/// metadata filters behave predictably.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Manufacturer part number, e.g. `TMP117`.
    pub mpn: Option<String>,
    pub manufacturer: Option<String>,
    /// Component category, e.g. `sensor`, `microcontroller`, `power`.
    pub category: Option<String>,
    pub description: Option<String>,
    pub datasheet_url: Option<String>,
}

impl ComponentInfo {
    /// Seed a metadata record with this component's fields, applying the
    /// conventional defaults for anything unset.
    pub fn record_metadata(&self) -> RecordMetadata {
        RecordMetadata {
            mpn: self.mpn.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            manufacturer: self
                .manufacturer
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            category: self.category.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            description: self.description.clone().unwrap_or_default(),
            datasheet_url: self.datasheet_url.clone().unwrap_or_default(),
            ..RecordMetadata::default()
        }
    }
}

/// Metadata attached to every stored chunk: component provenance plus the
/// chunk's position within its source document.
///
/// Known fields are typed; anything else a caller wants to carry goes in
/// [`extra`](Self::extra), which round-trips through storage and remains
/// filterable by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub mpn: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub datasheet_url: String,
    /// RFC 3339 timestamp of the ingestion that produced this record.
    #[serde(default)]
    pub ingested_at: String,
    /// SHA-256 of the source document bytes, or `"unknown"` when hashing
    /// failed. This is the dedup signal for re-ingestion decisions.
    #[serde(default)]
    pub file_hash: String,
    #[serde(default)]
    pub chunk_index: usize,
    /// Byte offset of the chunk's pre-trim span within the cleaned text.
    #[serde(default)]
    pub chunk_start: usize,
    #[serde(default)]
    pub chunk_end: usize,
    /// Length of the stored (trimmed) chunk text.
    #[serde(default)]
    pub chunk_length: usize,
    #[serde(default)]
    pub total_text_length: usize,
    /// Open extension map for fields not anticipated above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RecordMetadata {
    /// Look up a field by name, covering both the typed fields and the
    /// extension map. Numeric fields are not addressable here; filters are
    /// exact string matches.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "source_file" => Some(&self.source_file),
            "source_path" => Some(&self.source_path),
            "mpn" => Some(&self.mpn),
            "manufacturer" => Some(&self.manufacturer),
            "category" => Some(&self.category),
            "description" => Some(&self.description),
            "datasheet_url" => Some(&self.datasheet_url),
            "ingested_at" => Some(&self.ingested_at),
            "file_hash" => Some(&self.file_hash),
            other => self.extra.get(other).and_then(|v| v.as_str()),
        }
    }
}

/// Exact-match predicate on a single metadata field.
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Filter on the component category field.
    pub fn category(value: impl Into<String>) -> Self {
        Self::new("category", value)
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        metadata.field(&self.field) == Some(self.value.as_str())
    }
}

/// One ranked retrieval hit. Results are ordered by ascending distance;
/// lower means more similar.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub text: String,
    pub metadata: RecordMetadata,
    pub distance: f32,
}

/// Summary of a persisted collection.
#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub total_records: u64,
    pub collection_name: String,
    pub storage_location: PathBuf,
}
