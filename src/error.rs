//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Pure in-process edge cases (empty text, empty chunk lists) are handled as
//! no-ops where a meaningful empty result exists and never surface here.
//! Everything else — mismatched inputs, encoder failures, store failures,
//! unreadable sources — is reported to the immediate caller through
//! [`IndexError`]. Batch ingestion isolates per-document failures instead of
//! propagating them; see [`crate::ingest`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    /// A single-text embedding call was given empty or whitespace-only text.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// Every text in a batch embedding call was empty or whitespace-only.
    #[error("all texts in the batch are empty")]
    AllInputsEmpty,

    /// `add` was called with differing numbers of texts and metadata entries.
    #[error("got {texts} texts but {metadata} metadata entries")]
    LengthMismatch { texts: usize, metadata: usize },

    /// The underlying text encoder failed to initialize or to embed.
    #[error("embedding encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// The configured embedding provider name is not recognized.
    #[error("unknown embedding provider: '{0}'")]
    UnknownProvider(String),

    /// A collection is bound to the encoder it was created with; opening it
    /// with a different model would mix embedding spaces.
    #[error("collection '{name}' was created with model '{expected}' but the configured model is '{actual}'")]
    ModelMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// The persisted collection backend failed to open, read, or write.
    #[error("vector store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The storage directory could not be created or inspected.
    #[error("storage location {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A source document path does not exist or could not be read.
    #[error("source not readable at {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Record metadata failed to serialize or deserialize.
    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),
}
