//! SQLite-backed [`IndexStore`].
//!
//! Each record is one row in `records`. The store embeds text with its
//! configured [`Embedder`] before writing, and answers similarity queries
//! by brute-force cosine distance over the stored BLOBs.
//!
//! An `add` call embeds first, then writes every row inside a single
//! transaction, so a failure leaves none of the batch behind.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

use corpus_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use corpus_rag_core::models::{IndexRecord, QueryHit, RecordMetadata, StoredRecord};
use corpus_rag_core::store::{ensure_unique_ids, IndexStore};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;

pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            pool,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Connect to `db_path`, ensure the schema exists, and wrap the pool.
    pub async fn open(db_path: &Path, embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, embedder, batch_size))
    }

    /// Open the store described by `[db]` and `[embedding]`.
    ///
    /// A disabled embedding provider still opens (stats only needs counts);
    /// any embedding call then fails.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        Self::open(&config.db.path, embedder, config.embedding.batch_size)
            .await
            .with_context(|| format!("Failed to open index at {}", config.db.path.display()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Distinct embedding models present in stored records.
    pub async fn stored_models(&self) -> Result<Vec<String>> {
        let models: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT embedding_model FROM records ORDER BY embedding_model")
                .fetch_all(&self.pool)
                .await?;
        Ok(models)
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let mut out = self.embedder.encode(batch).await?;
            if out.len() != batch.len() {
                bail!(
                    "embedder {} returned {} vectors for {} texts",
                    self.embedder.model_name(),
                    out.len(),
                    batch.len()
                );
            }
            vectors.append(&mut out);
        }
        Ok(vectors)
    }
}

fn metadata_from_row(row: &SqliteRow) -> Result<RecordMetadata> {
    let indexed_at: String = row.try_get("indexed_at")?;
    let indexed_at = DateTime::parse_from_rfc3339(&indexed_at)
        .with_context(|| format!("Invalid indexed_at timestamp: {}", indexed_at))?
        .with_timezone(&Utc);
    let chunk_index: i64 = row.try_get("chunk_index")?;
    let chunk_size: i64 = row.try_get("chunk_size")?;

    Ok(RecordMetadata {
        file_path: row.try_get("file_path")?,
        file_name: row.try_get("file_name")?,
        chunk_index: usize::try_from(chunk_index)?,
        file_hash: row.try_get("file_hash")?,
        indexed_at,
        chunk_size: usize::try_from(chunk_size)?,
        embedding_model: row.try_get("embedding_model")?,
    })
}

#[async_trait]
impl IndexStore for SqliteStore {
    fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    async fn get_by_path(&self, file_path: &str) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, file_name, chunk_index, file_hash, indexed_at,
                   chunk_size, embedding_model
            FROM records
            WHERE file_path = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(file_path)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StoredRecord {
                    id: row.try_get("id")?,
                    metadata: metadata_from_row(row)?,
                })
            })
            .collect()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for id in ids {
            removed += sqlx::query("DELETE FROM records WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn delete_by_path(&self, file_path: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM records WHERE file_path = ?")
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn add(&self, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        ensure_unique_ids(records)?;

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self
            .embed_all(&texts)
            .await
            .with_context(|| format!("Embedding {} chunks failed", texts.len()))?;

        let mut tx = self.pool.begin().await?;
        for (record, vector) in records.iter().zip(vectors.iter()) {
            let m = &record.metadata;
            sqlx::query(
                r#"
                INSERT INTO records (id, file_path, file_name, chunk_index, file_hash, indexed_at,
                                     chunk_size, embedding_model, text, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    file_path = excluded.file_path,
                    file_name = excluded.file_name,
                    chunk_index = excluded.chunk_index,
                    file_hash = excluded.file_hash,
                    indexed_at = excluded.indexed_at,
                    chunk_size = excluded.chunk_size,
                    embedding_model = excluded.embedding_model,
                    text = excluded.text,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(&m.file_path)
            .bind(&m.file_name)
            .bind(m.chunk_index as i64)
            .bind(&m.file_hash)
            .bind(m.indexed_at.to_rfc3339())
            .bind(m.chunk_size as i64)
            .bind(&m.embedding_model)
            .bind(&record.text)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(records = records.len(), "records written");
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryHit>> {
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .encode(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response for query"))?;

        let rows = sqlx::query(
            r#"
            SELECT id, file_path, file_name, chunk_index, file_hash, indexed_at,
                   chunk_size, embedding_model, text, embedding
            FROM records
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            hits.push(QueryHit {
                id: row.try_get("id")?,
                text: row.try_get("text")?,
                metadata: metadata_from_row(row)?,
                distance: cosine_distance(&query_vec, &blob_to_vec(&blob)),
            });
        }

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
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn document_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT file_path FROM records ORDER BY file_path")
                .fetch_all(&self.pool)
                .await?;
        Ok(paths)
    }
}
