//! Ingestion pipeline orchestration.
//!
//! Takes raw datasheet text plus component provenance and drives the full
//! flow: clean → chunk → dedup → embed → store. Batch ingestion processes
//! each document independently so one unreadable or malformed source never
//! blocks the rest.
//!
//! The pipeline does not refuse to re-ingest a document it has seen before;
//! the stored `file_hash` is the dedup signal, and consulting it (via
//! [`VectorCollection::contains_file_hash`]) before calling [`ingest`] again
//! is the caller's responsibility.
//!
//! [`ingest`]: IngestionPipeline::ingest

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::extract;
use crate::models::{ComponentInfo, UNKNOWN};
use crate::store::VectorCollection;

/// One document in a batch ingestion request.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub component: ComponentInfo,
}

pub struct IngestionPipeline {
    collection: VectorCollection,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(collection: VectorCollection) -> Self {
        Self::with_chunking(collection, ChunkingConfig::default())
    }

    pub fn with_chunking(collection: VectorCollection, chunking: ChunkingConfig) -> Self {
        Self {
            collection,
            chunking,
        }
    }

    pub fn collection(&self) -> &VectorCollection {
        &self.collection
    }

    /// Ingest raw text for one component.
    ///
    /// Empty input short-circuits to an empty id list without touching the
    /// store. The content hash recorded on every chunk is the SHA-256 of the
    /// raw text bytes.
    pub async fn ingest(&self, raw_text: &str, component: &ComponentInfo) -> Result<Vec<Uuid>> {
        let file_hash = hash_bytes(raw_text.as_bytes());
        self.ingest_text(raw_text, component, None, &file_hash)
            .await
    }

    /// Extract text from a source file and ingest it.
    ///
    /// The content hash is computed from the file's bytes; if hashing fails
    /// the `"unknown"` sentinel is recorded instead of failing ingestion.
    pub async fn ingest_file(&self, path: &Path, component: &ComponentInfo) -> Result<Vec<Uuid>> {
        let raw_text = extract::read_text(path)?;
        let file_hash = file_hash(path);
        self.ingest_text(&raw_text, component, Some(path), &file_hash)
            .await
    }

    async fn ingest_text(
        &self,
        raw_text: &str,
        component: &ComponentInfo,
        source: Option<&Path>,
        file_hash: &str,
    ) -> Result<Vec<Uuid>> {
        if raw_text.trim().is_empty() {
            warn!("no text extracted from source, nothing to ingest");
            return Ok(Vec::new());
        }

        let cleaned = clean_text(raw_text);
        let segments = chunk_text(
            &cleaned,
            self.chunking.min_chars,
            self.chunking.max_chars,
            self.chunking.overlap_chars,
        );
        if segments.is_empty() {
            warn!("cleaning left no chunkable text");
            return Ok(Vec::new());
        }

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let (source_file, source_path) = match source {
            Some(path) => (
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                path.to_string_lossy().into_owned(),
            ),
            None => (String::new(), String::new()),
        };

        // Identical chunk texts within one document (repeated boilerplate,
        // overlapping tails of uniform text) collapse to a single record.
        let mut seen = HashSet::new();
        let mut texts = Vec::with_capacity(segments.len());
        let mut metadata = Vec::with_capacity(segments.len());
        for segment in segments {
            if !seen.insert(hash_bytes(segment.text.as_bytes())) {
                debug!(index = segment.index, "skipping duplicate chunk");
                continue;
            }

            let mut meta = component.record_metadata();
            meta.source_file = source_file.clone();
            meta.source_path = source_path.clone();
            meta.ingested_at = ingested_at.clone();
            meta.file_hash = file_hash.to_string();
            meta.chunk_index = segment.index;
            meta.chunk_start = segment.start;
            meta.chunk_end = segment.end;
            meta.chunk_length = segment.text.len();
            meta.total_text_length = segment.total_text_length;

            metadata.push(meta);
            texts.push(segment.text);
        }

        let ids = self.collection.add(texts, metadata).await?;
        info!(
            chunks = ids.len(),
            source = %source_path,
            "ingested document"
        );
        Ok(ids)
    }

    /// Ingest a batch of documents, isolating per-document failures.
    ///
    /// Every entry appears in the returned map; entries whose source is
    /// missing or whose ingestion failed map to an empty id list.
    pub async fn batch_ingest(&self, entries: &[BatchEntry]) -> BTreeMap<PathBuf, Vec<Uuid>> {
        let mut results = BTreeMap::new();
        for entry in entries {
            let ids = match self.ingest_file(&entry.path, &entry.component).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "skipping datasheet");
                    Vec::new()
                }
            };
            results.insert(entry.path.clone(), ids);
        }
        results
    }
}

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*page\s+\d+[^\n]*\n?").expect("valid regex"));
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid regex"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,;:!?\-()\[\]/+=<>@#$%^&*]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize extracted datasheet text before chunking.
///
/// Strips page header/footer lines and bare URLs, replaces characters
/// outside a conservative allow-list with spaces, and collapses whitespace
/// runs to single spaces. Best-effort and infallible.
pub fn clean_text(text: &str) -> String {
    let text = PAGE_MARKER.replace_all(text, "");
    let text = BARE_URL.replace_all(&text, "");
    let text = DISALLOWED.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// SHA-256 of a file's contents, for dedup decisions.
///
/// Returns the `"unknown"` sentinel instead of failing when the file cannot
/// be read.
pub fn file_hash(path: &Path) -> String {
    match hash_file(path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to hash source file");
            UNKNOWN.to_string()
        }
    }
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
