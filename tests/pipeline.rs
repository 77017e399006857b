//! End-to-end tests for the ingestion and retrieval pipeline.
//!
//! These tests inject a deterministic bag-of-words encoder so that storage,
//! ranking, filtering, and the pipeline orchestration are exercised without
//! model downloads or network access.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use datasheet_index::config::ChunkingConfig;
use datasheet_index::embedding::{EmbeddingProvider, TextEncoder};
use datasheet_index::error::{IndexError, Result};
use datasheet_index::ingest::{self, BatchEntry, IngestionPipeline};
use datasheet_index::models::{ComponentInfo, MetadataFilter, RecordMetadata, UNKNOWN};
use datasheet_index::store::{VectorCollection, DEFAULT_COLLECTION};

const DIMS: usize = 64;

/// Deterministic encoder: hashed bag-of-words projection, L2-normalized.
/// Identical texts embed identically; texts sharing vocabulary are closer
/// than unrelated ones.
struct HashEncoder {
    name: &'static str,
}

impl HashEncoder {
    fn boxed() -> Box<dyn TextEncoder> {
        Box::new(Self {
            name: "test-hash-encoder",
        })
    }

    fn named(name: &'static str) -> Box<dyn TextEncoder> {
        Box::new(Self { name })
    }
}

#[async_trait]
impl TextEncoder for HashEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIMS
    }

    fn model_name(&self) -> &str {
        self.name
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut h = 0usize;
        for b in token.bytes() {
            h = h.wrapping_mul(31).wrapping_add(b as usize);
        }
        v[h % DIMS] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

async fn open_collection(dir: &TempDir) -> VectorCollection {
    let provider = Arc::new(EmbeddingProvider::with_encoder(HashEncoder::boxed()));
    VectorCollection::open(dir.path(), DEFAULT_COLLECTION, provider)
        .await
        .unwrap()
}

fn meta(mpn: &str, category: &str) -> RecordMetadata {
    ComponentInfo {
        mpn: Some(mpn.to_string()),
        category: Some(category.to_string()),
        ..ComponentInfo::default()
    }
    .record_metadata()
}

/// Four component chunks with distinct categories, mirroring a small but
/// realistic slice of an indexed datasheet corpus.
fn sample_records() -> (Vec<String>, Vec<RecordMetadata>) {
    let records = vec![
        (
            "ESP32-WROOM-32 is a powerful Wi-Fi and Bluetooth MCU module targeting \
             a wide variety of applications, with configurable GPIO, PWM, ADC, I2C, \
             SPI and UART peripherals.",
            meta("ESP32-WROOM-32", "microcontroller"),
        ),
        (
            "The TMP117 is a high-accuracy, low-power digital temperature sensor \
             providing a 16-bit temperature result with 0.0078 C resolution.",
            meta("TMP117", "sensor"),
        ),
        (
            "The DS18B20 digital thermometer provides 9-bit to 12-bit Celsius \
             temperature measurements over a 1-Wire bus with alarm trigger points.",
            meta("DS18B20", "sensor"),
        ),
        (
            "The LM2596 series of regulators are monolithic integrated circuits \
             providing a step-down buck switching regulator capable of driving a \
             3A load with excellent line and load regulation.",
            meta("LM2596", "power"),
        ),
    ];
    records
        .into_iter()
        .map(|(text, meta)| (text.to_string(), meta))
        .unzip()
}

fn small_chunking() -> ChunkingConfig {
    ChunkingConfig {
        min_chars: 50,
        max_chars: 200,
        overlap_chars: 20,
    }
}

// ============ VectorCollection ============

#[tokio::test]
async fn add_then_search_round_trips_the_record() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    let query = texts[1].clone();

    let ids = collection.add(texts, metadata).await.unwrap();
    assert_eq!(ids.len(), 4);

    let results = collection.search(&query, 4, None).await.unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].metadata.mpn, "TMP117");
    assert!(results[0].distance < 1e-5, "exact text should rank first");
}

#[tokio::test]
async fn search_distances_are_non_decreasing() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    collection.add(texts, metadata).await.unwrap();

    let results = collection
        .search("temperature measurement accuracy", 10, None)
        .await
        .unwrap();
    assert!(!results.is_empty());
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn category_filter_returns_only_matching_records() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    collection.add(texts, metadata).await.unwrap();

    let results = collection
        .search_by_category("temperature sensor", "sensor", 5)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.metadata.category, "sensor");
    }
}

#[tokio::test]
async fn filter_on_extension_field_works_without_schema_changes() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;

    let mut tagged = meta("TPS62840", "power");
    tagged
        .extra
        .insert("package".to_string(), serde_json::json!("SOT-23"));
    let plain = meta("LM2596", "power");

    collection
        .add(
            vec![
                "Ultra-low quiescent current buck converter.".to_string(),
                "Step-down switching regulator.".to_string(),
            ],
            vec![tagged, plain],
        )
        .await
        .unwrap();

    let filter = MetadataFilter::new("package", "SOT-23");
    let results = collection
        .search("buck converter", 5, Some(&filter))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.mpn, "TPS62840");
}

#[tokio::test]
async fn mismatched_lengths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;

    let err = collection
        .add(
            vec!["a".to_string(), "b".to_string()],
            vec![
                RecordMetadata::default(),
                RecordMetadata::default(),
                RecordMetadata::default(),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::LengthMismatch {
            texts: 2,
            metadata: 3
        }
    ));
}

#[tokio::test]
async fn blank_texts_are_skipped_not_stored() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;

    let ids = collection
        .add(
            vec!["real content here".to_string(), "   ".to_string()],
            vec![RecordMetadata::default(), RecordMetadata::default()],
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(collection.count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_query_fails_with_empty_input() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let err = collection.search("   ", 5, None).await.unwrap_err();
    assert!(matches!(err, IndexError::EmptyInput));
}

#[tokio::test]
async fn returns_fewer_than_k_when_collection_is_small() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    collection.add(texts, metadata).await.unwrap();

    let results = collection.search("anything at all", 50, None).await.unwrap();
    assert_eq!(results.len(), 4);

    let none = collection
        .search_by_category("anything", "rf-transceiver", 5)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn stats_report_count_name_and_location() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    collection.add(texts, metadata).await.unwrap();

    let stats = collection.stats().await.unwrap();
    assert_eq!(stats.total_records, 4);
    assert_eq!(stats.collection_name, DEFAULT_COLLECTION);
    assert_eq!(stats.storage_location, dir.path());
}

#[tokio::test]
async fn delete_collection_is_lazily_recreated_on_next_add() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    collection.add(texts.clone(), metadata.clone()).await.unwrap();

    collection.delete_collection().await.unwrap();
    assert_eq!(collection.count().await.unwrap(), 0);
    assert!(collection
        .search("temperature", 5, None)
        .await
        .unwrap()
        .is_empty());

    let ids = collection.add(texts, metadata).await.unwrap();
    assert_eq!(ids.len(), 4);
    assert_eq!(collection.count().await.unwrap(), 4);
}

#[tokio::test]
async fn collection_rejects_a_different_encoder_model() {
    let dir = TempDir::new().unwrap();

    let first = Arc::new(EmbeddingProvider::with_encoder(HashEncoder::named(
        "model-a",
    )));
    let collection = VectorCollection::open(dir.path(), DEFAULT_COLLECTION, first)
        .await
        .unwrap();
    collection
        .add(
            vec!["hall-effect current sensor".to_string()],
            vec![RecordMetadata::default()],
        )
        .await
        .unwrap();
    drop(collection);

    let second = Arc::new(EmbeddingProvider::with_encoder(HashEncoder::named(
        "model-b",
    )));
    let reopened = VectorCollection::open(dir.path(), DEFAULT_COLLECTION, second)
        .await
        .unwrap();
    let err = reopened
        .add(
            vec!["another chunk".to_string()],
            vec![RecordMetadata::default()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::ModelMismatch { .. }));
}

#[tokio::test]
async fn search_completes_within_latency_budget() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;

    let texts: Vec<String> = (0..120)
        .map(|i| {
            format!(
                "Component number {i} provides regulation monitoring and interface \
                 features for embedded designs with variant {i} packaging."
            )
        })
        .collect();
    let metadata = vec![meta("GEN", "misc"); texts.len()];
    collection.add(texts, metadata).await.unwrap();

    let started = Instant::now();
    let results = collection
        .search("regulation interface for embedded designs", 10, None)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 10);
    assert!(
        elapsed.as_millis() < 150,
        "search took {} ms, budget is 150 ms",
        elapsed.as_millis()
    );
}

// ============ IngestionPipeline ============

async fn pipeline_in(dir: &TempDir) -> IngestionPipeline {
    IngestionPipeline::with_chunking(open_collection(dir).await, small_chunking())
}

fn sentences(n: usize) -> String {
    (0..n)
        .map(|i| format!("Sensor reading mode {i} draws very little current. "))
        .collect()
}

#[tokio::test]
async fn ingest_attaches_provenance_and_chunk_metadata() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir).await;

    let component = ComponentInfo {
        mpn: Some("TMP117".to_string()),
        manufacturer: Some("Texas Instruments".to_string()),
        category: Some("sensor".to_string()),
        ..ComponentInfo::default()
    };
    let raw = sentences(12);
    let ids = pipeline.ingest(&raw, &component).await.unwrap();
    assert!(!ids.is_empty());

    let results = pipeline
        .collection()
        .search("sensor reading current", 1, None)
        .await
        .unwrap();
    let meta = &results[0].metadata;
    assert_eq!(meta.mpn, "TMP117");
    assert_eq!(meta.manufacturer, "Texas Instruments");
    assert_eq!(meta.category, "sensor");
    assert_eq!(meta.file_hash.len(), 64, "content hash should be SHA-256 hex");
    assert!(!meta.ingested_at.is_empty());
    assert!(meta.chunk_end > meta.chunk_start);
    assert_eq!(meta.chunk_length, results[0].text.len());
    assert!(meta.total_text_length >= meta.chunk_end);
}

#[tokio::test]
async fn ingest_empty_text_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir).await;

    let ids = pipeline
        .ingest("", &ComponentInfo::default())
        .await
        .unwrap();
    assert!(ids.is_empty());
    let ids = pipeline
        .ingest("   \n\t ", &ComponentInfo::default())
        .await
        .unwrap();
    assert!(ids.is_empty());
    assert_eq!(pipeline.collection().count().await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_deduplicates_identical_chunks() {
    let dir = TempDir::new().unwrap();
    let chunking = ChunkingConfig {
        min_chars: 18,
        max_chars: 19,
        overlap_chars: 0,
    };
    let pipeline = IngestionPipeline::with_chunking(open_collection(&dir).await, chunking);

    // Fixed-width windows over uniform text produce identical chunk texts.
    let raw = "Lorem ipsum dolor. ".repeat(10);
    let ids = pipeline.ingest(&raw, &ComponentInfo::default()).await.unwrap();
    assert_eq!(ids.len(), 1, "identical chunks should collapse to one record");
}

#[tokio::test]
async fn same_content_produces_same_file_hash() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir).await;

    let doc = dir.path().join("ds.txt");
    std::fs::write(&doc, sentences(10)).unwrap();

    let ids = pipeline
        .ingest_file(&doc, &ComponentInfo::default())
        .await
        .unwrap();
    assert!(!ids.is_empty());

    let hash = ingest::file_hash(&doc);
    assert_ne!(hash, UNKNOWN);
    assert!(pipeline
        .collection()
        .contains_file_hash(&hash)
        .await
        .unwrap());
    assert!(!pipeline
        .collection()
        .contains_file_hash("0000000000000000000000000000000000000000000000000000000000000000")
        .await
        .unwrap());
}

#[tokio::test]
async fn batch_ingest_isolates_per_document_failures() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir).await;

    let good_a = dir.path().join("esp32.txt");
    let good_b = dir.path().join("tmp117.txt");
    std::fs::write(&good_a, sentences(8)).unwrap();
    std::fs::write(&good_b, sentences(9)).unwrap();
    let missing = dir.path().join("does-not-exist.pdf");

    let entries: Vec<BatchEntry> = [&good_a, &missing, &good_b]
        .into_iter()
        .map(|path: &std::path::PathBuf| BatchEntry {
            path: path.clone(),
            component: ComponentInfo::default(),
        })
        .collect();

    let results = pipeline.batch_ingest(&entries).await;
    assert_eq!(results.len(), 3);
    assert!(results[&missing].is_empty());
    assert!(!results[&good_a].is_empty());
    assert!(!results[&good_b].is_empty());
}

#[tokio::test]
async fn returned_ids_are_unique_v4_uuids() {
    let dir = TempDir::new().unwrap();
    let collection = open_collection(&dir).await;
    let (texts, metadata) = sample_records();
    let ids = collection.add(texts, metadata).await.unwrap();

    let unique: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    for id in &ids {
        assert_eq!(id.get_version_num(), 4);
    }
}

#[tokio::test]
async fn reingestion_creates_new_records_not_overwrites() {
    // Re-ingesting the same document is the caller's decision; the pipeline
    // itself never dedups across calls.
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir).await;
    let raw = sentences(8);

    let first = pipeline.ingest(&raw, &ComponentInfo::default()).await.unwrap();
    let second = pipeline.ingest(&raw, &ComponentInfo::default()).await.unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(
        pipeline.collection().count().await.unwrap() as usize,
        first.len() + second.len()
    );
}
