//! Content fingerprints for change detection and chunk identity.
//!
//! Whole files are identified by the SHA-256 of their raw bytes. File
//! metadata such as mtime never participates, so touching a file without
//! editing it does not trigger a reindex.
//!
//! Chunk identity combines the document path, the chunk's ordinal, and a
//! short digest of the chunk text:
//!
//! ```text
//! guides/setup.md_chunk_3_9f86d081
//! ```
//!
//! Re-running on unchanged content reproduces the same ids (idempotent
//! upsert); edited content yields different ids.

use sha2::{Digest, Sha256};

/// Hex characters of the chunk text digest kept in chunk ids.
pub const SHORT_DIGEST_LEN: usize = 8;

/// SHA-256 of `bytes`, lowercase hex.
pub fn file_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First [`SHORT_DIGEST_LEN`] hex characters of the SHA-256 of `text`.
pub fn short_digest(text: &str) -> String {
    let mut full = file_digest(text.as_bytes());
    full.truncate(SHORT_DIGEST_LEN);
    full
}

/// Build the identity of the `index`-th chunk of the document at `path`.
pub fn chunk_id(path: &str, index: usize, text: &str) -> String {
    format!("{}_chunk_{}_{}", path, index, short_digest(text))
}
