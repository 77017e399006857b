//! # Datasheet Index CLI (`dsx`)
//!
//! The `dsx` binary drives the ingestion and retrieval pipeline: store
//! initialization, single and batch datasheet ingestion, semantic search
//! with category filtering, statistics, and collection deletion.
//!
//! ## Usage
//!
//! ```bash
//! dsx --config ./config/dsx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dsx init` | Create the storage directory and database schema |
//! | `dsx ingest <path>` | Ingest one datasheet with component metadata |
//! | `dsx batch --manifest <toml>` | Ingest every datasheet listed in a manifest |
//! | `dsx batch --dir <dir>` | Ingest every matching file under a directory |
//! | `dsx search "<query>"` | Rank indexed chunks by similarity to the query |
//! | `dsx stats` | Show collection statistics |
//! | `dsx delete --force` | Drop the collection and all records |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use datasheet_index::config::{self, Config};
use datasheet_index::embedding::EmbeddingProvider;
use datasheet_index::ingest::{self, BatchEntry, IngestionPipeline};
use datasheet_index::models::{ComponentInfo, UNKNOWN};
use datasheet_index::scan;
use datasheet_index::stats;
use datasheet_index::store::{VectorCollection, DEFAULT_COLLECTION};

/// Datasheet Index CLI — ingestion and semantic retrieval for electronic
/// component datasheets.
#[derive(Parser)]
#[command(
    name = "dsx",
    about = "Datasheet Index — ingestion and semantic retrieval for component datasheets",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dsx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the storage directory and database schema.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Ingest a single datasheet file.
    ///
    /// Extracts text, cleans and chunks it, embeds every chunk, and stores
    /// the chunks with the supplied component metadata. Skips files whose
    /// content hash is already indexed unless `--force` is given.
    Ingest {
        /// Path to the datasheet (PDF or plain text).
        path: PathBuf,

        /// Manufacturer part number, e.g. TMP117.
        #[arg(long)]
        mpn: Option<String>,

        #[arg(long)]
        manufacturer: Option<String>,

        /// Component category, e.g. sensor, microcontroller, power.
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Original datasheet URL, recorded as provenance.
        #[arg(long)]
        url: Option<String>,

        /// Re-ingest even if this file's content hash is already indexed.
        #[arg(long)]
        force: bool,
    },

    /// Ingest many datasheets from a manifest file or a directory.
    ///
    /// Failures are isolated per document: a missing or unreadable file is
    /// reported and skipped without aborting the rest of the batch.
    Batch {
        /// TOML manifest with one `[[datasheet]]` entry per document.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Directory to scan for datasheets (see [batch] config globs).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Category applied to every document ingested from --dir.
        #[arg(long)]
        category: Option<String>,

        /// Manufacturer applied to every document ingested from --dir.
        #[arg(long)]
        manufacturer: Option<String>,
    },

    /// Search indexed datasheet chunks.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one component category.
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show collection statistics.
    Stats,

    /// Delete the collection and all of its records. Irreversible.
    Delete {
        /// Confirm the deletion.
        #[arg(long)]
        force: bool,
    },
}

/// Manifest format for `dsx batch --manifest`.
#[derive(Debug, Deserialize)]
struct BatchManifest {
    #[serde(default)]
    datasheet: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    #[serde(flatten)]
    component: ComponentInfo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let collection = open_collection(&cfg).await?;
            println!(
                "Store initialized at {} (collection '{}').",
                collection.location().display(),
                collection.name()
            );
        }
        Commands::Ingest {
            path,
            mpn,
            manufacturer,
            category,
            description,
            url,
            force,
        } => {
            let component = ComponentInfo {
                mpn,
                manufacturer,
                category,
                description,
                datasheet_url: url,
            };
            run_ingest(&cfg, &path, &component, force).await?;
        }
        Commands::Batch {
            manifest,
            dir,
            category,
            manufacturer,
        } => {
            let entries = match (manifest, dir) {
                (Some(manifest), None) => load_manifest(&manifest)?,
                (None, Some(dir)) => {
                    let component = ComponentInfo {
                        category,
                        manufacturer,
                        ..ComponentInfo::default()
                    };
                    scan::scan_directory(&dir, &cfg.batch)?
                        .into_iter()
                        .map(|path| BatchEntry {
                            path,
                            component: component.clone(),
                        })
                        .collect()
                }
                _ => anyhow::bail!("Provide exactly one of --manifest or --dir"),
            };
            run_batch(&cfg, &entries).await?;
        }
        Commands::Search {
            query,
            category,
            limit,
        } => {
            run_search(&cfg, &query, category.as_deref(), limit).await?;
        }
        Commands::Stats => {
            let collection = open_collection(&cfg).await?;
            stats::run_stats(&collection).await?;
        }
        Commands::Delete { force } => {
            if !force {
                anyhow::bail!("Deleting the collection is irreversible. Pass --force to confirm.");
            }
            let collection = open_collection(&cfg).await?;
            collection.delete_collection().await?;
            println!("Deleted collection '{}'.", DEFAULT_COLLECTION);
        }
    }

    Ok(())
}

async fn open_collection(cfg: &Config) -> anyhow::Result<VectorCollection> {
    let provider = Arc::new(EmbeddingProvider::new(cfg.embedding.clone()));
    let collection = VectorCollection::open(&cfg.storage.path, DEFAULT_COLLECTION, provider)
        .await
        .context("Failed to open vector collection")?;
    Ok(collection)
}

async fn run_ingest(
    cfg: &Config,
    path: &std::path::Path,
    component: &ComponentInfo,
    force: bool,
) -> anyhow::Result<()> {
    let collection = open_collection(cfg).await?;

    let file_hash = ingest::file_hash(path);
    if !force && file_hash != UNKNOWN && collection.contains_file_hash(&file_hash).await? {
        println!(
            "{} is already indexed (matching content hash). Use --force to re-ingest.",
            path.display()
        );
        return Ok(());
    }

    let pipeline = IngestionPipeline::with_chunking(collection, cfg.chunking.clone());
    let ids = pipeline.ingest_file(path, component).await?;

    if ids.is_empty() {
        println!("{}: no text to index", path.display());
    } else {
        println!("{}: indexed {} chunks", path.display(), ids.len());
    }
    Ok(())
}

async fn run_batch(cfg: &Config, entries: &[BatchEntry]) -> anyhow::Result<()> {
    if entries.is_empty() {
        println!("No datasheets to ingest.");
        return Ok(());
    }

    let collection = open_collection(cfg).await?;
    let pipeline = IngestionPipeline::with_chunking(collection, cfg.chunking.clone());
    let results = pipeline.batch_ingest(entries).await;

    let mut indexed = 0usize;
    let mut skipped = 0usize;
    for (path, ids) in &results {
        if ids.is_empty() {
            println!("  {}: skipped (failed or empty)", path.display());
            skipped += 1;
        } else {
            println!("  {}: {} chunks", path.display(), ids.len());
            indexed += 1;
        }
    }

    println!();
    println!("batch ingest");
    println!("  documents indexed: {}", indexed);
    println!("  documents skipped: {}", skipped);
    println!("ok");
    Ok(())
}

async fn run_search(
    cfg: &Config,
    query: &str,
    category: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let collection = open_collection(cfg).await?;

    let started = std::time::Instant::now();
    let results = match category {
        Some(category) => collection.search_by_category(query, category, limit).await?,
        None => collection.search(query, limit, None).await?,
    };
    let elapsed = started.elapsed();

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let meta = &result.metadata;
        println!(
            "{}. [{:.4}] {} / {}",
            i + 1,
            result.distance,
            meta.mpn,
            meta.category
        );
        if !meta.source_file.is_empty() {
            println!("    source: {}", meta.source_file);
        }
        let excerpt: String = result.text.chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!();
    }
    println!(
        "{} result{} in {} ms",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        elapsed.as_millis()
    );

    Ok(())
}

fn load_manifest(path: &std::path::Path) -> anyhow::Result<Vec<BatchEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let manifest: BatchManifest =
        toml::from_str(&content).with_context(|| "Failed to parse manifest")?;

    Ok(manifest
        .datasheet
        .into_iter()
        .map(|entry| BatchEntry {
            path: entry.path,
            component: entry.component,
        })
        .collect())
}
