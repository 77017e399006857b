//! Persisted vector collection over SQLite.
//!
//! A [`VectorCollection`] is a named store of (id, text, embedding, metadata)
//! records, retrieved-or-created on first access. Embeddings are computed
//! internally through the collection's [`EmbeddingProvider`] at insertion
//! time, so callers never store vectors directly and queries are guaranteed
//! to use the same embedding space as the stored records. The model bound at
//! creation is recorded in a registry table; reopening a collection with a
//! different model fails instead of silently mixing encoders.
//!
//! Embedding vectors are stored as little-endian f32 BLOBs; similarity
//! ranking fetches the collection's rows and computes cosine distance in
//! Rust. At the intended scale (tens to low hundreds of records) a full scan
//! plus one query embedding completes well inside the 150 ms p95 budget.
//!
//! The storage directory is owned by a single process. Concurrent writers
//! from other processes are not coordinated and must be prevented externally.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob, EmbeddingProvider};
use crate::error::{IndexError, Result};
use crate::models::{CollectionStats, MetadataFilter, RecordMetadata, SearchResult};

/// Name of the collection holding component datasheet chunks.
pub const DEFAULT_COLLECTION: &str = "component_datasheets";

/// Database file created inside the storage directory.
const DB_FILE: &str = "index.sqlite";

pub struct VectorCollection {
    pool: SqlitePool,
    name: String,
    location: PathBuf,
    provider: Arc<EmbeddingProvider>,
}

impl VectorCollection {
    /// Open (or create) the named collection under `store_dir`.
    ///
    /// The directory and database file are created if absent. Opening does
    /// not initialize the embedding encoder; that happens on the first `add`
    /// or `search`.
    pub async fn open(
        store_dir: &Path,
        name: &str,
        provider: Arc<EmbeddingProvider>,
    ) -> Result<Self> {
        std::fs::create_dir_all(store_dir).map_err(|e| IndexError::Storage {
            path: store_dir.to_path_buf(),
            source: e,
        })?;

        let db_path = store_dir.join(DB_FILE);
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let collection = Self {
            pool,
            name: name.to_string(),
            location: store_dir.to_path_buf(),
            provider,
        };
        collection.run_migrations().await?;

        debug!(collection = %collection.name, location = %collection.location.display(), "opened collection");
        Ok(collection)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                seq INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register the collection on first write, or verify that the encoder in
    /// use matches the one the collection was created with.
    async fn ensure_registered(&self, model: &str, dims: usize) -> Result<()> {
        let existing: Option<(String, i64)> =
            sqlx::query_as("SELECT model, dims FROM collections WHERE name = ?")
                .bind(&self.name)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some((recorded, _)) if recorded == model => Ok(()),
            Some((recorded, _)) => Err(IndexError::ModelMismatch {
                name: self.name.clone(),
                expected: recorded,
                actual: model.to_string(),
            }),
            None => {
                sqlx::query(
                    "INSERT OR IGNORE INTO collections (name, model, dims, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&self.name)
                .bind(model)
                .bind(dims as i64)
                .bind(chrono::Utc::now().timestamp())
                .execute(&self.pool)
                .await?;
                info!(collection = %self.name, model, dims, "registered collection");
                Ok(())
            }
        }
    }

    /// Insert texts with their metadata, embedding each text internally.
    ///
    /// Fails with [`IndexError::LengthMismatch`] when the two lists disagree
    /// in length. Each stored record gets a fresh v4 UUID; the returned ids
    /// correspond to the stored records in input order. Blank texts cannot be
    /// embedded and are skipped with a warning rather than stored.
    pub async fn add(
        &self,
        texts: Vec<String>,
        metadata: Vec<RecordMetadata>,
    ) -> Result<Vec<Uuid>> {
        if texts.len() != metadata.len() {
            return Err(IndexError::LengthMismatch {
                texts: texts.len(),
                metadata: metadata.len(),
            });
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embedded = self.provider.embed_many(&texts).await?;
        let model = self.provider.model_name().await?;
        let dims = self.provider.dimension().await?;
        self.ensure_registered(&model, dims).await?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let mut seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq), -1) + 1 FROM records WHERE collection = ?")
                .bind(&self.name)
                .fetch_one(&mut *tx)
                .await?;

        let mut ids = Vec::with_capacity(texts.len());
        for ((text, meta), vector) in texts.iter().zip(metadata.iter()).zip(embedded.into_iter()) {
            let Some(vector) = vector else {
                tracing::warn!("skipping blank text at insert");
                continue;
            };

            let id = Uuid::new_v4();
            let metadata_json = serde_json::to_string(meta)?;
            sqlx::query(
                r#"
                INSERT INTO records (id, collection, seq, text, embedding, metadata_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(&self.name)
            .bind(seq)
            .bind(text)
            .bind(vec_to_blob(&vector))
            .bind(metadata_json)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            seq += 1;
            ids.push(id);
        }

        tx.commit().await?;
        info!(collection = %self.name, added = ids.len(), "stored records");
        Ok(ids)
    }

    /// Return up to `k` stored records nearest to `query`, optionally
    /// restricted to records matching `filter`.
    ///
    /// The query is embedded with the same provider used at insertion.
    /// Results are ordered by ascending cosine distance; ties break on record
    /// id, so ranking is deterministic for a fixed dataset and query. Fewer
    /// than `k` results (possibly none) is not an error.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.provider.embed_one(query).await?;
        let model = self.provider.model_name().await?;
        let dims = self.provider.dimension().await?;
        self.ensure_registered(&model, dims).await?;

        let rows = sqlx::query(
            "SELECT id, text, embedding, metadata_json FROM records WHERE collection = ?",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        struct Scored {
            id: String,
            result: SearchResult,
        }

        let mut scored = Vec::new();
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: RecordMetadata = serde_json::from_str(&metadata_json)?;
            if let Some(filter) = filter {
                if !filter.matches(&metadata) {
                    continue;
                }
            }

            let blob: Vec<u8> = row.get("embedding");
            let distance = cosine_distance(&query_vec, &blob_to_vec(&blob));
            scored.push(Scored {
                id: row.get("id"),
                result: SearchResult {
                    text: row.get("text"),
                    metadata,
                    distance,
                },
            });
        }

        scored.sort_by(|a, b| {
            a.result
                .distance
                .partial_cmp(&b.result.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);

        debug!(
            collection = %self.name,
            candidates = rows.len(),
            returned = scored.len(),
            "search complete"
        );
        Ok(scored.into_iter().map(|s| s.result).collect())
    }

    /// Search restricted to one component category.
    pub async fn search_by_category(
        &self,
        query: &str,
        category: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search(query, k, Some(&MetadataFilter::category(category)))
            .await
    }

    /// Number of records currently stored in this collection.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            total_records: self.count().await?,
            collection_name: self.name.clone(),
            storage_location: self.location.clone(),
        })
    }

    /// Whether any stored record carries the given source-document hash.
    /// This is the signal callers consult before re-ingesting a document.
    pub async fn contains_file_hash(&self, file_hash: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM records
                WHERE collection = ?
                  AND json_extract(metadata_json, '$.file_hash') = ?
            )
            "#,
        )
        .bind(&self.name)
        .bind(file_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    /// Irreversibly delete the collection and all of its records.
    ///
    /// Afterwards the name behaves as if the collection never existed; the
    /// next `add` recreates it (binding whatever encoder is then in use).
    pub async fn delete_collection(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(collection = %self.name, "deleted collection");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of the SQLite file backing this collection.
    pub fn db_path(&self) -> PathBuf {
        self.location.join(DB_FILE)
    }
}
