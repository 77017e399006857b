//! # Datasheet Index
//!
//! An ingestion and semantic retrieval pipeline for electronic component
//! datasheets.
//!
//! Long-form datasheet text is split into overlapping, provenance-tagged
//! chunks, embedded into fixed-dimension vectors, and stored in a persisted
//! collection that serves nearest-neighbor retrieval filtered by structured
//! metadata (e.g. component category).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────┐   ┌───────────┐
//! │ Extractor │──▶│    Pipeline       │──▶│  SQLite    │
//! │ PDF/text  │   │ Clean+Chunk+Embed │   │ records    │
//! └───────────┘   └──────────────────┘   └────┬──────┘
//!                                             │
//!                       query ──▶ embed ──▶ rank by distance
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dsx init                                # create the store
//! dsx ingest tmp117.pdf --category sensor # ingest one datasheet
//! dsx batch --dir ./datasheets            # ingest a directory
//! dsx search "low power temperature sensor" --category sensor
//! dsx stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Provenance metadata, filters, results |
//! | [`chunk`] | Boundary-aware overlapping chunker |
//! | [`embedding`] | Embedding provider and encoders |
//! | [`store`] | Persisted vector collection |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`extract`] | Source text extraction |
//! | [`scan`] | Datasheet directory scanning |
//! | [`error`] | Error taxonomy |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod scan;
pub mod stats;
pub mod store;
