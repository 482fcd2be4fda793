//! SQLite-backed [`VectorStore`] persisted at `index.path`.
//!
//! Each build runs in one transaction that clears the previous session and
//! writes the new one, so a reader never sees a half-replaced index.
//! Vectors are stored as little-endian `f32` BLOBs and scored with
//! brute-force cosine similarity. Queries name the session they expect and
//! fail once a later build has replaced it.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::chunk::content_hash;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::Chunk;

use super::{check_lengths, rank, stale_session, ScoredChunk, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Connect to (or create) the index file and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Id of the stored session, if any build has completed.
    pub async fn session_id(&self) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM index_sessions LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Stored chunk texts in build order.
    pub async fn chunk_texts(&self) -> Result<Vec<String>> {
        let texts: Vec<String> = sqlx::query_scalar("SELECT text FROM chunks ORDER BY ordinal")
            .fetch_all(&self.pool)
            .await?;
        Ok(texts)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn replace_all(
        &self,
        session_id: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        check_lengths(chunks, vectors)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_sessions")
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO index_sessions (id, created_at, chunk_count) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(chrono::Utc::now().timestamp())
            .bind(chunks.len() as i64)
            .execute(&mut *tx)
            .await?;

        for (ordinal, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO chunks (ordinal, session_id, source_id, sequence_index, start_char, text, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(ordinal as i64)
            .bind(session_id)
            .bind(chunk.source_id.as_str())
            .bind(chunk.sequence_index as i64)
            .bind(chunk.start as i64)
            .bind(chunk.text.as_str())
            .bind(content_hash(&chunk.text))
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (ordinal, dims, embedding) VALUES (?, ?, ?)")
                .bind(ordinal as i64)
                .bind(vector.len() as i64)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn similarity_query(
        &self,
        session_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        // One read transaction, so a concurrent rebuild from another process
        // cannot slip in between the session check and the vector scan.
        let mut tx = self.pool.begin().await?;

        let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;
        if live == 0 {
            return Err(stale_session(session_id));
        }

        let rows = sqlx::query(
            r#"
            SELECT cv.ordinal, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.ordinal = cv.ordinal
            WHERE c.session_id = ?
            ORDER BY cv.ordinal
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let ordinal: i64 = row.get("ordinal");
                let blob: Vec<u8> = row.get("embedding");
                ScoredChunk {
                    ordinal: ordinal as usize,
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(candidates, k))
    }

    async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
