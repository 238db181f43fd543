//! Core data types that flow through indexing and retrieval.
//!
//! A [`Chunk`] only lives for the duration of an indexing pass. What gets
//! persisted is an [`IndexRecord`]: chunk text plus [`RecordMetadata`],
//! keyed by the chunk's deterministic identity. The store computes and
//! keeps the embedding vector itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic identity, see [`crate::fingerprint::chunk_id`].
    pub id: String,
    /// Document path relative to the corpus root (`/`-separated).
    pub path: String,
    /// Ordinal position within the document, starting at 0.
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Metadata stored alongside every index record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Document path relative to the corpus root. Lookups filter on this.
    pub file_path: String,
    /// Display name (final path component).
    pub file_name: String,
    pub chunk_index: usize,
    /// Whole-file digest at the time the record was written.
    pub file_hash: String,
    pub indexed_at: DateTime<Utc>,
    /// Chunk length in characters.
    pub chunk_size: usize,
    /// Identifier of the model that produced the record's embedding.
    pub embedding_model: String,
}

/// The persisted unit: chunk text plus metadata, keyed by chunk identity.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// Id and metadata of a stored record, as returned by metadata lookups.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub metadata: RecordMetadata,
}

/// A raw nearest-neighbour hit from an index store.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    /// Cosine distance between the query and the record embedding.
    pub distance: f64,
}
