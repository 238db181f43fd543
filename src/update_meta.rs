//! Per-source update metadata.
//!
//! Acquisition of source documents happens outside this tool. After a
//! source has been refreshed, `crag sources record <name>` stamps it here.
//! The file is JSON and is always rewritten in full via a temp file and
//! rename, so readers see either the old or the new version.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::corpus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMetadata {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceUpdate>,
    #[serde(default)]
    pub last_full_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUpdate {
    pub last_updated: DateTime<Utc>,
    pub file_count: usize,
    #[serde(default)]
    pub source: Option<String>,
}

impl UpdateMetadata {
    /// Load from `path`. A missing file is an empty record.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read update metadata: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse update metadata: {}", path.display()))
    }

    /// Atomically replace the file at `path` with this record.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    pub fn record_source(
        &mut self,
        name: &str,
        file_count: usize,
        source: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.sources.insert(
            name.to_string(),
            SourceUpdate {
                last_updated: at,
                file_count,
                source,
            },
        );
    }

    pub fn total_files(&self) -> usize {
        self.sources.values().map(|s| s.file_count).sum()
    }
}

/// `crag sources`: one line per configured source.
pub fn run_sources(config: &Config) -> Result<()> {
    let path = config.update_metadata_path();
    let meta = UpdateMetadata::load(&path)?;

    if config.sources.is_empty() && meta.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!("{:<20} {:<22} {:>8}", "SOURCE", "LAST UPDATED", "FILES");
    let mut names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
    for name in meta.sources.keys() {
        if !names.contains(&name.as_str()) {
            names.push(name.as_str());
        }
    }
    for name in names {
        match meta.sources.get(name) {
            Some(s) => println!(
                "{:<20} {:<22} {:>8}",
                name,
                s.last_updated.format("%Y-%m-%d %H:%M:%S UTC"),
                s.file_count
            ),
            None => println!("{:<20} {:<22} {:>8}", name, "never", "-"),
        }
    }
    println!();
    println!("total files: {}", meta.total_files());
    match meta.last_full_update {
        Some(t) => println!("last full update: {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last full update: never"),
    }
    Ok(())
}

/// `crag sources record <name>`: recount and stamp one source.
pub fn run_record(config: &Config, name: &str) -> Result<()> {
    let Some(source) = config.source(name) else {
        bail!("Unknown source: '{}'", name);
    };
    let dir = config.source_dir(source);
    let count = corpus::count_files(&dir, &config.corpus.extensions, config.corpus.follow_symlinks)?;

    let path = config.update_metadata_path();
    let mut meta = UpdateMetadata::load(&path)?;
    let now = Utc::now();
    meta.record_source(name, count, source.url.clone(), now);
    if config
        .sources
        .iter()
        .all(|s| meta.sources.contains_key(&s.name))
    {
        meta.last_full_update = Some(now);
    }
    meta.save(&path)?;

    info!(source = name, files = count, "recorded source update");
    println!("recorded {}: {} files", name, count);
    Ok(())
}
