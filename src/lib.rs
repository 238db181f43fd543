//! # Corpus RAG
//!
//! Incremental indexing and retrieval over a local document corpus.
//!
//! Files under a corpus root are extracted to text, split into overlapping
//! chunks, embedded, and stored in SQLite. Re-running the indexer only
//! touches documents whose content changed. Questions are answered from
//! the nearest chunks, through a language model when one is configured
//! and as ranked passages when not.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────────┐
//! │  Corpus  │──▶│   Indexer     │──▶│ SqliteStore  │
//! │ txt/pdf… │   │ extract+chunk │   │ embed+BLOBs  │
//! └──────────┘   └───────────────┘   └──────┬───────┘
//!                                           │
//!                                           ▼
//!                                   ┌──────────────┐
//!                                   │ search / ask │
//!                                   │ (Generator)  │
//!                                   └──────────────┘
//! ```
//!
//! The storage-agnostic pieces (chunker, fingerprints, the `IndexStore`
//! and `Embedder` traits, retrieval) live in the `corpus-rag-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Corpus discovery |
//! | [`extract`] | Text extraction per format |
//! | [`ingest`] | Incremental indexing pass |
//! | [`sqlite_store`] | Persistent index store |
//! | [`embedding`] | Embedding backends |
//! | [`generate`] | Answer generation backends |
//! | [`ask`] | Search, ask, and chat commands |
//! | [`stats`] | Index statistics |
//! | [`update_meta`] | Per-source update metadata |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
pub mod update_meta;
