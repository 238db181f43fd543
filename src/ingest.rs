//! Indexing pipeline orchestration.
//!
//! Coordinates one pass over the corpus: discovery → fingerprint → diff
//! against the index store → extraction → chunking → batch upsert.
//!
//! # Per-file protocol
//!
//! 1. Read the raw bytes and compute the whole-file digest.
//! 2. Unless `force` is set, look up the records stored for the file's
//!    relative path. When every record carries the same digest and the
//!    store's current embedding model, the file is `Unchanged` and nothing
//!    is written. Otherwise the old records are purged first.
//! 3. Extract text, chunk it, and write the fresh chunk set with one `add`.
//!
//! Per-file failures become a [`FileOutcome::Failed`] and the pass moves on.
//! A store that fails [`MAX_CONSECUTIVE_STORE_FAILURES`] files in a row is
//! treated as down and aborts the pass.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use corpus_rag_core::chunk::{chunk_document, ChunkParams};
use corpus_rag_core::fingerprint::file_digest;
use corpus_rag_core::models::{IndexRecord, RecordMetadata};
use corpus_rag_core::store::IndexStore;

use crate::config::Config;
use crate::corpus::{self, CorpusFile};
use crate::extract::extract_bytes;
use crate::progress::{IndexProgressEvent, IndexProgressReporter, NoProgress, ProgressMode};
use crate::sqlite_store::SqliteStore;

/// Consecutive store-stage failures after which the pass is aborted.
pub const MAX_CONSECUTIVE_STORE_FAILURES: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Reprocess every file regardless of stored digests.
    pub force: bool,
    /// Delete records whose document no longer exists in the corpus.
    pub prune: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Read,
    Extract,
    Store,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Read => "read",
            FailureStage::Extract => "extract",
            FailureStage::Store => "store",
        };
        f.write_str(s)
    }
}

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Indexed { chunks: usize },
    Unchanged,
    /// Extraction succeeded but produced no usable text.
    Empty,
    Failed { stage: FailureStage, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_found: usize,
    pub files_processed: usize,
    pub chunks_created: usize,
    pub files_unchanged: usize,
    pub files_empty: usize,
    pub files_failed: usize,
    pub files_removed: usize,
}

impl IndexStats {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Indexed { chunks } => {
                self.files_processed += 1;
                self.chunks_created += chunks;
            }
            FileOutcome::Unchanged => self.files_unchanged += 1,
            FileOutcome::Empty => self.files_empty += 1,
            FileOutcome::Failed { .. } => self.files_failed += 1,
        }
    }
}

/// Candidate files and the chunks they would produce, without writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunReport {
    pub files_found: usize,
    pub estimated_chunks: usize,
    pub unreadable: usize,
}

pub struct Indexer {
    store: Arc<dyn IndexStore>,
    params: ChunkParams,
    progress: Box<dyn IndexProgressReporter>,
}

impl Indexer {
    pub fn new(store: Arc<dyn IndexStore>, params: ChunkParams) -> Self {
        Self {
            store,
            params,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn IndexProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Index `files` one at a time. Returns `Err` only for systemic
    /// failures: the store failing its health check, or failing
    /// [`MAX_CONSECUTIVE_STORE_FAILURES`] files in a row.
    pub async fn run(&self, files: &[CorpusFile], options: IndexOptions) -> Result<IndexStats> {
        let existing = self
            .store
            .count()
            .await
            .context("Index store is unavailable")?;
        debug!(records = existing, files = files.len(), "starting index pass");

        let mut stats = IndexStats {
            files_found: files.len(),
            ..IndexStats::default()
        };
        let total = files.len() as u64;
        let mut consecutive_store_failures = 0;

        for (i, file) in files.iter().enumerate() {
            self.progress.report(IndexProgressEvent::Indexing {
                n: i as u64 + 1,
                total,
                path: file.rel_path.clone(),
            });

            let outcome = self.index_file(file, options.force).await;
            match &outcome {
                FileOutcome::Indexed { chunks } => {
                    info!(path = %file.rel_path, chunks, "indexed");
                }
                FileOutcome::Unchanged => debug!(path = %file.rel_path, "unchanged"),
                FileOutcome::Empty => warn!(path = %file.rel_path, "no extractable text; skipped"),
                FileOutcome::Failed { stage, error } => {
                    warn!(path = %file.rel_path, %stage, error = %error, "file skipped");
                }
            }

            if let FileOutcome::Failed {
                stage: FailureStage::Store,
                error,
            } = &outcome
            {
                consecutive_store_failures += 1;
                if consecutive_store_failures >= MAX_CONSECUTIVE_STORE_FAILURES {
                    bail!(
                        "Aborting index pass after {} consecutive store failures (last: {})",
                        consecutive_store_failures,
                        error
                    );
                }
            } else {
                consecutive_store_failures = 0;
            }
            stats.record(&outcome);
        }

        if options.prune {
            stats.files_removed = self.prune(files).await?;
        }

        Ok(stats)
    }

    /// Run the per-file protocol for one document. Never returns an error:
    /// every failure is folded into the outcome.
    pub async fn index_file(&self, file: &CorpusFile, force: bool) -> FileOutcome {
        let bytes = match tokio::fs::read(&file.path).await {
            Ok(b) => b,
            Err(e) => {
                return FileOutcome::Failed {
                    stage: FailureStage::Read,
                    error: e.to_string(),
                }
            }
        };
        let digest = file_digest(&bytes);
        let model = self.store.embedding_model().to_string();

        let mut purge = force;
        if !force {
            match self.store.get_by_path(&file.rel_path).await {
                Ok(existing) if existing.is_empty() => {}
                Ok(existing) => {
                    let current = existing.iter().all(|r| {
                        r.metadata.file_hash == digest && r.metadata.embedding_model == model
                    });
                    if current {
                        return FileOutcome::Unchanged;
                    }
                    purge = true;
                }
                Err(e) => {
                    warn!(path = %file.rel_path, error = %e, "lookup failed; reprocessing");
                    purge = true;
                }
            }
        }

        if purge {
            match self.store.delete_by_path(&file.rel_path).await {
                Ok(n) if n > 0 => debug!(path = %file.rel_path, removed = n, "purged old records"),
                Ok(_) => {}
                Err(e) => {
                    return FileOutcome::Failed {
                        stage: FailureStage::Store,
                        error: format!("{:#}", e),
                    }
                }
            }
        }

        let text = match extract_bytes(&bytes, file.format) {
            Ok(t) => t,
            Err(e) => {
                return FileOutcome::Failed {
                    stage: FailureStage::Extract,
                    error: e.to_string(),
                }
            }
        };

        let chunks = chunk_document(&file.rel_path, &text, &self.params);
        if chunks.is_empty() {
            return FileOutcome::Empty;
        }

        let indexed_at = Utc::now();
        let file_name = file.file_name().to_string();
        let records: Vec<IndexRecord> = chunks
            .into_iter()
            .map(|chunk| {
                let chunk_size = chunk.char_len();
                IndexRecord {
                    id: chunk.id,
                    text: chunk.text,
                    metadata: RecordMetadata {
                        file_path: chunk.path,
                        file_name: file_name.clone(),
                        chunk_index: chunk.index,
                        file_hash: digest.clone(),
                        indexed_at,
                        chunk_size,
                        embedding_model: model.clone(),
                    },
                }
            })
            .collect();

        let count = records.len();
        match self.store.add(&records).await {
            Ok(()) => FileOutcome::Indexed { chunks: count },
            Err(e) => FileOutcome::Failed {
                stage: FailureStage::Store,
                error: format!("{:#}", e),
            },
        }
    }

    /// Delete records for document paths absent from `files`.
    async fn prune(&self, files: &[CorpusFile]) -> Result<usize> {
        let present: HashSet<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        let mut removed = 0;
        for path in self.store.document_paths().await? {
            if present.contains(path.as_str()) {
                continue;
            }
            let n = self
                .store
                .delete_by_path(&path)
                .await
                .with_context(|| format!("Failed to prune {}", path))?;
            info!(path = %path, records = n, "pruned vanished document");
            removed += 1;
        }
        Ok(removed)
    }
}

/// Extract and chunk every candidate without touching the store.
pub fn dry_run(files: &[CorpusFile], params: &ChunkParams) -> DryRunReport {
    let mut report = DryRunReport {
        files_found: files.len(),
        ..DryRunReport::default()
    };
    for file in files {
        match crate::extract::extract_file(&file.path) {
            Ok(text) => {
                report.estimated_chunks += chunk_document(&file.rel_path, &text, params).len();
            }
            Err(e) => {
                debug!(path = %file.rel_path, error = %e, "dry run: unreadable");
                report.unreadable += 1;
            }
        }
    }
    report
}

/// `crag index`: discover the corpus and run one pass against the SQLite store.
pub async fn run_index(
    config: &Config,
    options: IndexOptions,
    dry: bool,
    progress: ProgressMode,
) -> Result<()> {
    let params = config.chunking.params()?;
    let reporter = progress.reporter();
    reporter.report(IndexProgressEvent::Discovering {
        root: config.corpus.root.display().to_string(),
    });
    let files = corpus::discover(&config.corpus, &[config.update_metadata_path()])?;

    if dry {
        let report = dry_run(&files, &params);
        println!("index (dry-run)");
        println!("  files found: {}", report.files_found);
        println!("  estimated chunks: {}", report.estimated_chunks);
        if report.unreadable > 0 {
            println!("  unreadable: {}", report.unreadable);
        }
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled; set [embedding].provider to index documents");
    }

    let store = Arc::new(SqliteStore::from_config(config).await?);
    let indexer = Indexer::new(store.clone(), params).with_progress(reporter);
    let result = indexer.run(&files, options).await;
    store.close().await;
    let stats = result?;

    print_summary(&stats, options);
    Ok(())
}

fn print_summary(stats: &IndexStats, options: IndexOptions) {
    if options.force {
        println!("index (force)");
    } else {
        println!("index");
    }
    println!("  files found: {}", stats.files_found);
    println!("  files processed: {}", stats.files_processed);
    println!("  chunks created: {}", stats.chunks_created);
    println!("  unchanged: {}", stats.files_unchanged);
    println!("  empty: {}", stats.files_empty);
    println!("  failed: {}", stats.files_failed);
    if options.prune {
        println!("  removed: {}", stats.files_removed);
    }
    println!("ok");
}
