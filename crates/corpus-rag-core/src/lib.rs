//! # corpus-rag core
//!
//! Storage-agnostic logic for corpus-rag: data models, the overlapping
//! chunker, content fingerprinting, the [`store::IndexStore`] contract,
//! the embedding and generation capability traits, and similarity
//! retrieval with extractive fallback.
//!
//! This crate does no filesystem walking, SQL, or HTTP. The application
//! crate supplies concrete stores and backends and drives the indexing
//! pass over a corpus directory.

pub mod chunk;
pub mod embedding;
pub mod fingerprint;
pub mod generate;
pub mod models;
pub mod retrieve;
pub mod store;
