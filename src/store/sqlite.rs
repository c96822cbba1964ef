//! SQLite-backed [`VectorIndex`].
//!
//! Chunks and their embeddings live in the `chunks` table, scoped by
//! collection name. Vectors are stored as little-endian `f32` BLOBs and
//! scored by brute-force cosine similarity at query time, which is fine for
//! the collection sizes a single-user knowledge base reaches.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use super::{check_dims, check_query, rank, VectorIndex};
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::Result;
use crate::migrate;
use crate::models::{EmbeddingRecord, ScoredChunk, SourceSummary};

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorIndex {
    /// Open (creating if needed) the database at `db_path` and the named collection.
    pub async fn open(db_path: &Path, collection: &str) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Self::with_pool(pool, collection).await
    }

    /// Use an already-migrated pool.
    pub async fn with_pool(pool: SqlitePool, collection: &str) -> Result<Self> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, dims, created_at) VALUES (?, NULL, ?)")
            .bind(collection)
            .bind(chrono::Utc::now().timestamp())
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            collection: collection.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Dimensionality recorded for the collection, if any records were ever stored.
    pub async fn dims(&self) -> Result<Option<usize>> {
        let dims = sqlx::query_scalar::<_, Option<i64>>("SELECT dims FROM collections WHERE name = ?")
            .bind(&self.collection)
            .fetch_optional(&self.pool)
            .await?
            .flatten();
        Ok(dims.map(|d| d as usize))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let current =
            sqlx::query_scalar::<_, Option<i64>>("SELECT dims FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&mut *tx)
                .await?
                .flatten();
        let dims = check_dims(records, current.map(|d| d as usize))?;

        if current.is_none() {
            sqlx::query("UPDATE collections SET dims = ? WHERE name = ?")
                .bind(dims.map(|d| d as i64))
                .bind(&self.collection)
                .execute(&mut *tx)
                .await?;
        }

        let now = chrono::Utc::now().timestamp();
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, chunk_id, source_id, source_path,
                                    position, text, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, chunk_id) DO UPDATE SET
                    source_id = excluded.source_id,
                    source_path = excluded.source_path,
                    position = excluded.position,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.collection)
            .bind(&record.chunk_id)
            .bind(&record.source_id)
            .bind(&record.source_path)
            .bind(record.position as i64)
            .bind(&record.text)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE collection = ? AND source_id = ?")
            .bind(&self.collection)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let dims = self.dims().await?;
        check_query(vector, k, dims)?;
        if dims.is_none() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, source_id, source_path, position, text, embedding
            FROM chunks
            WHERE collection = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                ScoredChunk {
                    chunk_id: row.get("chunk_id"),
                    source_id: row.get("source_id"),
                    source_path: row.get("source_path"),
                    position: row.get::<i64, _>("position") as usize,
                    text: row.get("text"),
                    score: cosine_similarity(vector, &stored),
                }
            })
            .collect();

        Ok(rank(hits, k))
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE collections SET dims = NULL WHERE name = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT source_id, MIN(source_path) AS source_path, COUNT(*) AS chunk_count
            FROM chunks
            WHERE collection = ?
            GROUP BY source_id
            ORDER BY source_path, source_id
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SourceSummary {
                source_id: row.get("source_id"),
                source_path: row.get("source_path"),
                chunk_count: row.get::<i64, _>("chunk_count") as u64,
            })
            .collect())
    }
}
