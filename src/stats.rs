//! Collection statistics overview.
//!
//! Gives a quick summary of what's indexed: record count, collection name,
//! and storage footprint. Used by `dsx stats` to confirm ingestion is
//! working as expected.

use anyhow::Result;

use crate::store::VectorCollection;

/// Run the stats command: query the collection and print a summary.
pub async fn run_stats(collection: &VectorCollection) -> Result<()> {
    let stats = collection.stats().await?;
    let db_size = std::fs::metadata(collection.db_path())
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Datasheet Index — Collection Stats");
    println!("==================================");
    println!();
    println!("  Storage:     {}", stats.storage_location.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", stats.collection_name);
    println!("  Records:     {}", stats.total_records);
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
