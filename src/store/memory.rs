//! In-memory [`VectorStore`] for tests and `index.backend = "memory"`.
//!
//! Vector search is brute-force cosine similarity over the stored session.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::Chunk;

use super::{check_lengths, rank, stale_session, ScoredChunk, VectorStore};

#[derive(Default)]
struct Session {
    id: String,
    vectors: Vec<Vec<f32>>,
}

/// In-memory store; holds only the latest session.
#[derive(Default)]
pub struct InMemoryStore {
    session: RwLock<Session>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the session currently stored (empty before the first build).
    pub fn session_id(&self) -> String {
        self.session
            .read()
            .map(|s| s.id.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn replace_all(
        &self,
        session_id: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let mut session = self
            .session
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        session.id = session_id.to_string();
        session.vectors = vectors.to_vec();
        Ok(())
    }

    async fn similarity_query(
        &self,
        session_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let session = self
            .session
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        if session.id != session_id {
            return Err(stale_session(session_id));
        }
        let candidates = session
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| ScoredChunk {
                ordinal,
                score: cosine_similarity(query_vec, v),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn chunk_count(&self) -> Result<usize> {
        let session = self
            .session
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        Ok(session.vectors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(i: usize) -> Chunk {
        Chunk {
            text: format!("chunk {}", i),
            source_id: "doc_0".into(),
            sequence_index: i,
            start: 0,
        }
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let store = InMemoryStore::new();
        let chunks = vec![chunk(0), chunk(1), chunk(2)];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        store.replace_all("s1", &chunks, &vectors).await.unwrap();

        let hits = store.similarity_query("s1", &[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits[0].ordinal, 1);
        assert_eq!(hits[1].ordinal, 2);
        assert_eq!(store.session_id(), "s1");
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_session() {
        let store = InMemoryStore::new();
        store
            .replace_all("s1", &[chunk(0), chunk(1)], &[vec![1.0], vec![1.0]])
            .await
            .unwrap();
        store.replace_all("s2", &[chunk(0)], &[vec![1.0]]).await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);
        assert_eq!(store.session_id(), "s2");

        let err = store.similarity_query("s1", &[1.0], 4).await.unwrap_err();
        assert!(err.to_string().contains("replaced by a newer build"));
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let store = InMemoryStore::new();
        assert!(store.replace_all("s", &[chunk(0)], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_session_returns_nothing() {
        let store = InMemoryStore::new();
        store.replace_all("empty", &[], &[]).await.unwrap();
        assert!(store.similarity_query("empty", &[1.0], 4).await.unwrap().is_empty());
    }
}
