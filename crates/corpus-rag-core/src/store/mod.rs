//! Index store abstraction.
//!
//! The [`IndexStore`] trait is the persistent collection that maps chunk
//! identity to text, metadata and an embedding vector. The store owns its
//! embedding function: callers hand it text, never vectors.
//!
//! # Usage protocol
//!
//! For one document path, the indexer looks up existing records with
//! [`get_by_path`](IndexStore::get_by_path), deletes them when the
//! document changed, then writes the fresh chunk set with a single
//! [`add`](IndexStore::add) call. Implementations must make one `add`
//! call all-or-nothing from the caller's point of view.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_by_path`](IndexStore::get_by_path) | Records whose `file_path` equals the filter |
//! | [`delete`](IndexStore::delete) | Remove records by id |
//! | [`add`](IndexStore::add) | Embed and upsert a batch; duplicate ids in one batch are rejected |
//! | [`query`](IndexStore::query) | Nearest neighbours by cosine distance |
//! | [`count`](IndexStore::count) | Total record count |
//! | [`document_paths`](IndexStore::document_paths) | Distinct indexed document paths |

pub mod memory;

use std::collections::HashSet;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{IndexRecord, QueryHit, StoredRecord};

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Identifier of the embedding model this store embeds with.
    fn embedding_model(&self) -> &str;

    /// All records whose metadata `file_path` equals `file_path`.
    async fn get_by_path(&self, file_path: &str) -> Result<Vec<StoredRecord>>;

    /// Delete records by id. Unknown ids are ignored. Returns the number removed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Embed and upsert `records`. Fails without writing anything when the
    /// batch contains the same id twice.
    async fn add(&self, records: &[IndexRecord]) -> Result<()>;

    /// Up to `k` records nearest to `text`, ordered by ascending distance.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryHit>>;

    async fn count(&self) -> Result<usize>;

    /// Distinct document paths present in the store, sorted.
    async fn document_paths(&self) -> Result<Vec<String>>;

    /// Delete every record belonging to `file_path`.
    async fn delete_by_path(&self, file_path: &str) -> Result<usize> {
        let ids: Vec<String> = self
            .get_by_path(file_path)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete(&ids).await
    }
}

/// Reject a batch that names the same record id more than once.
pub fn ensure_unique_ids(records: &[IndexRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for r in records {
        if !seen.insert(r.id.as_str()) {
            bail!("duplicate record id in batch: {}", r.id);
        }
    }
    Ok(())
}
