//! Embedding provider: lazy encoder initialization, batching, and vector
//! utilities.
//!
//! [`EmbeddingProvider`] owns a [`TextEncoder`] that is acquired on first use.
//! Initialization is guarded by a once-cell, so concurrent first calls from
//! multiple tasks perform the (potentially multi-second) encoder setup
//! exactly once and every caller observes the same ready encoder afterwards.
//! A failed initialization is not cached; the next call retries.
//!
//! Two encoder backends are supported:
//! - **local** — runs models in-process via fastembed; no network calls after
//!   the initial model download (feature `local-embeddings-fastembed`).
//! - **openai** — calls the OpenAI embeddings API with batching, retry, and
//!   exponential backoff (429/5xx/network errors retry, other 4xx fail fast).
//!
//! Batch embedding returns results aligned to input positions: blank entries
//! are skipped during encoding and come back as `None`, so callers never have
//! to reconstruct a shifted correspondence.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
#[cfg(feature = "local-embeddings-fastembed")]
use tracing::info;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::{IndexError, Result};

/// A text encoder mapping strings to fixed-dimension vectors.
///
/// Implementations must be usable from multiple tasks concurrently; the
/// provider shares one encoder across all callers after initialization.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Fixed output width of this encoder. Stable for its lifetime.
    fn dimension(&self) -> usize;
    /// Model identifier, e.g. `"all-minilm-l6-v2"`.
    fn model_name(&self) -> &str;
}

/// Lazily-initialized embedding service.
///
/// Construct one per process and pass it by handle ([`std::sync::Arc`]) to
/// whichever component needs it; there are no process-wide globals.
pub struct EmbeddingProvider {
    config: EmbeddingConfig,
    encoder: OnceCell<Box<dyn TextEncoder>>,
}

impl EmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            encoder: OnceCell::new(),
        }
    }

    /// Construct a provider around an already-initialized encoder, bypassing
    /// lazy backend setup. Used to inject custom or deterministic encoders.
    pub fn with_encoder(encoder: Box<dyn TextEncoder>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(encoder);
        Self {
            config: EmbeddingConfig::default(),
            encoder: cell,
        }
    }

    async fn encoder(&self) -> Result<&dyn TextEncoder> {
        let boxed = self
            .encoder
            .get_or_try_init(|| build_encoder(&self.config))
            .await?;
        Ok(boxed.as_ref())
    }

    /// Embed a single text. Fails with [`IndexError::EmptyInput`] if the
    /// trimmed text is empty.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(IndexError::EmptyInput);
        }
        let encoder = self.encoder().await?;
        let vectors = encoder.encode(&[text.to_string()]).await?;
        vectors.into_iter().next().ok_or_else(|| {
            IndexError::EncoderUnavailable("encoder returned no embedding".to_string())
        })
    }

    /// Embed a batch of texts, preserving input positions.
    ///
    /// Blank entries are not sent to the encoder and come back as `None` at
    /// their original positions. An empty input list yields an empty result;
    /// a list where *every* entry is blank fails with
    /// [`IndexError::AllInputsEmpty`].
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let kept: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.clone()))
            .collect();
        if kept.is_empty() {
            return Err(IndexError::AllInputsEmpty);
        }
        if kept.len() < texts.len() {
            warn!(
                skipped = texts.len() - kept.len(),
                "dropping blank texts from embedding batch"
            );
        }

        let encoder = self.encoder().await?;
        let batch_size = self.config.batch_size.max(1);
        let payload: Vec<String> = kept.iter().map(|(_, t)| t.clone()).collect();

        let mut vectors = Vec::with_capacity(payload.len());
        for batch in payload.chunks(batch_size) {
            vectors.extend(encoder.encode(batch).await?);
        }
        if vectors.len() != kept.len() {
            return Err(IndexError::EncoderUnavailable(format!(
                "encoder returned {} embeddings for {} texts",
                vectors.len(),
                kept.len()
            )));
        }

        let mut aligned: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for ((position, _), vector) in kept.into_iter().zip(vectors) {
            aligned[position] = Some(vector);
        }
        Ok(aligned)
    }

    /// The encoder's fixed output width. Initializes the encoder on first
    /// call; stable afterwards.
    pub async fn dimension(&self) -> Result<usize> {
        Ok(self.encoder().await?.dimension())
    }

    pub async fn model_name(&self) -> Result<String> {
        Ok(self.encoder().await?.model_name().to_string())
    }
}

async fn build_encoder(config: &EmbeddingConfig) -> Result<Box<dyn TextEncoder>> {
    match config.provider.as_str() {
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalEncoder::load(config).await?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(IndexError::EncoderUnavailable(
            "local provider requires --features local-embeddings-fastembed".to_string(),
        )),
        "openai" => Ok(Box::new(OpenAiEncoder::new(config)?)),
        other => Err(IndexError::UnknownProvider(other.to_string())),
    }
}

// ============ Local encoder (fastembed) ============

/// In-process encoder backed by fastembed. The model is downloaded on first
/// use and cached; afterwards embedding runs entirely offline.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEncoder {
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
    model_name: String,
    dims: usize,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEncoder {
    async fn load(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let dims = config.dims.unwrap_or_else(|| default_dims(&model_name));
        let fastembed_model = resolve_fastembed_model(&model_name)?;

        info!(model = %model_name, "loading local embedding model");
        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
            )
        })
        .await
        .map_err(|e| IndexError::EncoderUnavailable(format!("model load task failed: {e}")))?
        .map_err(|e| {
            IndexError::EncoderUnavailable(format!("failed to initialize embedding model: {e}"))
        })?;
        info!(model = %model_name, dims, "embedding model ready");

        Ok(Self {
            model: std::sync::Arc::new(std::sync::Mutex::new(model)),
            model_name,
            dims,
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl TextEncoder for LocalEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = std::sync::Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| {
                IndexError::EncoderUnavailable("embedding model lock poisoned".to_string())
            })?;
            model
                .embed(texts, None)
                .map_err(|e| IndexError::EncoderUnavailable(format!("local embedding failed: {e}")))
        })
        .await
        .map_err(|e| IndexError::EncoderUnavailable(format!("embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn resolve_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => Err(IndexError::EncoderUnavailable(format!(
            "unknown local embedding model: '{other}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small"
        ))),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_dims(name: &str) -> usize {
    match name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
        _ => 384,
    }
}

// ============ OpenAI encoder ============

/// Remote encoder calling `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAiEncoder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiEncoder {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            IndexError::EncoderUnavailable(
                "embedding.model required for the openai provider".to_string(),
            )
        })?;
        let dims = config.dims.ok_or_else(|| {
            IndexError::EncoderUnavailable(
                "embedding.dims required for the openai provider".to_string(),
            )
        })?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            IndexError::EncoderUnavailable("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                IndexError::EncoderUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextEncoder for OpenAiEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            IndexError::EncoderUnavailable(format!(
                                "invalid embeddings response: {e}"
                            ))
                        })?;
                        return parse_openai_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(%status, attempt, "embeddings API error, retrying");
                        last_err = Some(IndexError::EncoderUnavailable(format!(
                            "OpenAI API error {status}: {body_text}"
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(IndexError::EncoderUnavailable(format!(
                        "OpenAI API error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(IndexError::EncoderUnavailable(format!(
                        "embeddings request failed: {e}"
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            IndexError::EncoderUnavailable("embedding failed after retries".to_string())
        }))
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        IndexError::EncoderUnavailable("invalid embeddings response: missing data array".to_string())
    })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                IndexError::EncoderUnavailable(
                    "invalid embeddings response: missing embedding".to_string(),
                )
            })?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB of little-endian f32 bytes for SQLite.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance: `1 - cosine_similarity`. Lower means more similar.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
