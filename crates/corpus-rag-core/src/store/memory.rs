//! In-memory [`IndexStore`] implementation for tests and embedding in
//! other tools.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every stored vector.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_distance, Embedder};
use crate::models::{IndexRecord, QueryHit, StoredRecord};

use super::{ensure_unique_ids, IndexStore};

struct Entry {
    record: IndexRecord,
    vector: Vec<f32>,
}

pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    records: RwLock<BTreeMap<String, Entry>>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of mutating calls (`add`, non-empty `delete`) served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Ids of every stored record, sorted.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Entry>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Entry>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl IndexStore for InMemoryStore {
    fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    async fn get_by_path(&self, file_path: &str) -> Result<Vec<StoredRecord>> {
        let records = self.read()?;
        Ok(records
            .values()
            .filter(|e| e.record.metadata.file_path == file_path)
            .map(|e| StoredRecord {
                id: e.record.id.clone(),
                metadata: e.record.metadata.clone(),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut records = self.write()?;
        let removed = ids.iter().filter(|id| records.remove(*id).is_some()).count();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(removed)
    }

    async fn add(&self, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        ensure_unique_ids(records)?;

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.encode(&texts).await?;
        if vectors.len() != records.len() {
            bail!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            );
        }

        let mut stored = self.write()?;
        for (record, vector) in records.iter().zip(vectors) {
            stored.insert(
                record.id.clone(),
                Entry {
                    record: record.clone(),
                    vector,
                },
            );
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryHit>> {
        let empty = self.read()?.is_empty();
        if k == 0 || empty {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .encode(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;

        let records = self.read()?;
        let mut hits: Vec<QueryHit> = records
            .values()
            .map(|e| QueryHit {
                id: e.record.id.clone(),
                text: e.record.text.clone(),
                metadata: e.record.metadata.clone(),
                distance: cosine_distance(&query_vec, &e.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn document_paths(&self) -> Result<Vec<String>> {
        let records = self.read()?;
        let paths: BTreeSet<String> = records
            .values()
            .map(|e| e.record.metadata.file_path.clone())
            .collect();
        Ok(paths.into_iter().collect())
    }
}
