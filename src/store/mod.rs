//! Vector storage for the per-session embedding index.
//!
//! The [`VectorStore`] trait is the only storage surface the
//! [`index`](crate::index) needs: replace everything with a new session's
//! chunks and vectors, then answer nearest-neighbour queries. Chunks are
//! addressed by their ordinal in the build order, which also breaks
//! similarity ties.
//!
//! | Backend | Module | Persistence |
//! |---------|--------|-------------|
//! | `sqlite` | [`sqlite`] | SQLite file at `index.path` |
//! | `memory` | [`memory`] | none (tests, ephemeral runs) |

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::IndexConfig;
use crate::models::Chunk;

pub use memory::InMemoryStore;
pub use sqlite::SqliteVectorStore;

/// A chunk ordinal with its similarity to the query vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk {
    /// Position of the chunk in the slice passed to [`VectorStore::replace_all`].
    pub ordinal: usize,
    pub score: f32,
}

/// Durable (or not) home of one index session.
///
/// A build overwrites whatever the previous session stored; there is no
/// incremental update.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drop all prior state and store `chunks[i]` with `vectors[i]`.
    async fn replace_all(
        &self,
        session_id: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// The `k` chunks of `session_id` most similar to `query_vec`, by score
    /// descending then ordinal ascending.
    ///
    /// Errors if `session_id` is not the stored session: its ordinals would
    /// point at another request's chunks.
    async fn similarity_query(
        &self,
        session_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Number of chunks in the current session.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Sort candidates by score (desc), ordinal (asc), and keep the top `k`.
///
/// Uses the IEEE total order, so a stray NaN score sorts deterministically
/// instead of breaking the comparator.
pub fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.ordinal.cmp(&b.ordinal))
    });
    candidates.truncate(k);
    candidates
}

pub(crate) fn check_lengths(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        bail!(
            "chunk/vector count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        );
    }
    Ok(())
}

pub(crate) fn stale_session(requested: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "index session {} was replaced by a newer build",
        requested
    )
}

/// Open the backend named by `config.backend`.
pub async fn open_store(config: &IndexConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteVectorStore::open(&config.path).await?)),
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        other => bail!("Unknown index backend: {}", other),
    }
}
