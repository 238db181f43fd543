//! Idempotent schema setup for the index database.
//!
//! One table, `records`, holds every index record: chunk text, the
//! metadata fields, and the embedding as a little-endian f32 BLOB.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            file_hash TEXT NOT NULL,
            indexed_at TEXT NOT NULL,
            chunk_size INTEGER NOT NULL,
            embedding_model TEXT NOT NULL,
            text TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_file_path ON records(file_path)")
        .execute(pool)
        .await?;

    Ok(())
}
