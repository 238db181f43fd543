//! Index statistics and health overview.
//!
//! Summarizes what is indexed: record and document counts, which embedding
//! model produced the vectors, whether answer generation is available, and
//! when each configured source was last refreshed. Used by `crag stats`
//! and by the `stats` command inside `crag chat`.

use anyhow::Result;

use corpus_rag_core::store::IndexStore;

use crate::config::Config;
use crate::generate::create_generator;
use crate::sqlite_store::SqliteStore;
use crate::update_meta::UpdateMetadata;

/// Counts read from an index store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub records: usize,
    pub documents: usize,
}

pub async fn summarize(store: &dyn IndexStore) -> Result<IndexSummary> {
    Ok(IndexSummary {
        records: store.count().await?,
        documents: store.document_paths().await?.len(),
    })
}

/// Run the stats command against the configured database.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::from_config(config).await?;
    let result = print_stats(config, &store).await;
    store.close().await;
    result
}

pub async fn print_stats(config: &Config, store: &SqliteStore) -> Result<()> {
    let summary = summarize(store).await?;
    let stored_models = store.stored_models().await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let generation = match create_generator(&config.generation)? {
        Some(g) => g.name().to_string(),
        None => "disabled (retrieval only)".to_string(),
    };

    println!("Corpus RAG - Index Stats");
    println!("========================");
    println!();
    println!("  Corpus:      {}", config.corpus.root.display());
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Records:     {}", summary.records);
    println!("  Documents:   {}", summary.documents);
    println!("  Embedding:   {}", store.embedding_model());
    if stored_models.iter().any(|m| m != store.embedding_model()) {
        println!("  Stored with: {} (reindex to refresh)", stored_models.join(", "));
    }
    println!("  Generation:  {}", generation);

    let meta = UpdateMetadata::load(&config.update_metadata_path())?;
    if !meta.sources.is_empty() {
        println!();
        println!("  Sources:");
        println!("  {:<24} {:>8}   {}", "SOURCE", "FILES", "LAST UPDATED");
        println!("  {}", "-".repeat(56));
        for (name, s) in &meta.sources {
            println!(
                "  {:<24} {:>8}   {}",
                name,
                s.file_count,
                format_ts_relative(s.last_updated.timestamp())
            );
        }
        println!("  Total files: {}", meta.total_files());
        if let Some(t) = meta.last_full_update {
            println!("  Last full update: {}", format_ts_relative(t.timestamp()));
        }
    }

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

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
