//! Per-session embedding and retrieval index.
//!
//! An [`EmbeddingIndex`] is built once per research request from that
//! request's chunks and thrown away afterwards. Building persists the
//! vectors through a [`VectorStore`], overwriting the previous session;
//! querying embeds the topic and returns the nearest chunks in similarity
//! order, ties broken by build order.
//!
//! An index with zero chunks is valid: [`EmbeddingIndex::query`] returns an
//! empty list without calling the embedding provider.

use std::sync::Arc;

use anyhow::anyhow;
use thiserror::Error;
use uuid::Uuid;

use crate::embedding::{embed_batched, embed_one, EmbeddingProvider};
use crate::error::{ArticleError, Flow, Stage};
use crate::models::Chunk;
use crate::store::VectorStore;

/// Index failure, tagged by the step that failed.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding chunks failed: {0}")]
    Embed(#[source] anyhow::Error),
    #[error("embedding query failed: {0}")]
    Retrieve(#[source] anyhow::Error),
    #[error("index storage failed: {0}")]
    Storage(#[source] anyhow::Error),
}

impl IndexError {
    /// Attach the flow that was running.
    pub fn into_article(self, flow: Flow) -> ArticleError {
        match self {
            IndexError::Embed(e) => ArticleError::embedding(flow, Stage::Embed, e),
            IndexError::Retrieve(e) => ArticleError::embedding(flow, Stage::Retrieve, e),
            IndexError::Storage(e) => ArticleError::IndexStorage {
                flow,
                source: e.into(),
            },
        }
    }
}

pub struct EmbeddingIndex {
    session_id: String,
    chunks: Vec<Chunk>,
    store: Arc<dyn VectorStore>,
}

impl EmbeddingIndex {
    /// Embed every chunk and persist the result as a new session.
    ///
    /// Nothing is written unless every chunk embedded, so a failed build
    /// leaves the previous session in place.
    pub async fn build(
        provider: &dyn EmbeddingProvider,
        store: Arc<dyn VectorStore>,
        chunks: &[Chunk],
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        let vectors = Self::embed_chunks(provider, chunks, batch_size).await?;
        Self::persist(store, chunks.to_vec(), vectors).await
    }

    /// Embed chunk texts in batches. No provider call for zero chunks.
    async fn embed_chunks(
        provider: &dyn EmbeddingProvider,
        chunks: &[Chunk],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, IndexError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        embed_batched(provider, &texts, batch_size)
            .await
            .map_err(IndexError::Embed)
    }

    async fn persist(
        store: Arc<dyn VectorStore>,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        let session_id = Uuid::new_v4().to_string();
        store
            .replace_all(&session_id, &chunks, &vectors)
            .await
            .map_err(IndexError::Storage)?;
        tracing::debug!(session = %session_id, chunks = chunks.len(), "index session persisted");
        Ok(Self {
            session_id,
            chunks,
            store,
        })
    }

    /// The `k` chunks most similar to `topic`.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        topic: &str,
        k: usize,
    ) -> Result<Vec<Chunk>, IndexError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(provider, topic)
            .await
            .map_err(IndexError::Retrieve)?;
        self.nearest(&query_vec, k).await
    }

    /// The `k` chunks most similar to an already embedded query.
    ///
    /// Only this index's session is searched. If another build has replaced
    /// it in the store, or the store answers with an ordinal this session
    /// never stored, the query fails with [`IndexError::Storage`].
    pub async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<Chunk>, IndexError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let hits = self
            .store
            .similarity_query(&self.session_id, query_vec, k)
            .await
            .map_err(IndexError::Storage)?;
        hits.into_iter()
            .map(|hit| {
                self.chunks.get(hit.ordinal).cloned().ok_or_else(|| {
                    IndexError::Storage(anyhow!(
                        "index session {} has no chunk at ordinal {}",
                        self.session_id,
                        hit.ordinal
                    ))
                })
            })
            .collect()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Join retrieved chunk texts into the RAG prompt's context block.
pub fn join_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as counts of the letters a, b, c.
    struct LetterProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for LetterProvider {
        fn model_name(&self) -> &str {
            "letters"
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c']
                        .iter()
                        .map(|l| t.chars().filter(|c| c == l).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("model not loaded")
        }
    }

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_id: "doc_0".into(),
            sequence_index: i,
            start: 0,
        }
    }

    #[tokio::test]
    async fn test_build_and_query() {
        let provider = LetterProvider {
            calls: AtomicUsize::new(0),
        };
        let store = Arc::new(InMemoryStore::new());
        let chunks = vec![chunk(0, "aaa"), chunk(1, "bbb"), chunk(2, "ccc"), chunk(3, "abab")];
        let index = EmbeddingIndex::build(&provider, store.clone(), &chunks, 2)
            .await
            .unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(store.session_id(), index.session_id());

        let hits = index.query(&provider, "bb", 2).await.unwrap();
        assert_eq!(hits[0].text, "bbb");
        assert_eq!(hits[1].text, "abab");
    }

    #[tokio::test]
    async fn test_ties_keep_chunk_order() {
        let provider = LetterProvider {
            calls: AtomicUsize::new(0),
        };
        let store = Arc::new(InMemoryStore::new());
        let chunks = vec![chunk(0, "a"), chunk(1, "aa"), chunk(2, "aaa")];
        let index = EmbeddingIndex::build(&provider, store, &chunks, 8).await.unwrap();
        let hits = index.query(&provider, "a", 3).await.unwrap();
        let order: Vec<usize> = hits.iter().map(|c| c.sequence_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_empty_index_never_embeds() {
        let provider = LetterProvider {
            calls: AtomicUsize::new(0),
        };
        let store = Arc::new(InMemoryStore::new());
        let index = EmbeddingIndex::build(&provider, store, &[], 8)
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(index.query(&provider, "anything", 4).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embed_failure_maps_to_embed_stage() {
        let store = Arc::new(InMemoryStore::new());
        let err = match EmbeddingIndex::build(&FailingProvider, store, &[chunk(0, "x")], 8).await {
            Ok(_) => panic!("build should fail"),
            Err(e) => e,
        };
        let err = err.into_article(Flow::Rag);
        assert_eq!(err.flow(), Flow::Rag);
        assert_eq!(err.stage(), Stage::Embed);
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_replaced_session_fails_instead_of_mixing() {
        let provider = LetterProvider {
            calls: AtomicUsize::new(0),
        };
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let first = EmbeddingIndex::build(&provider, store.clone(), &[chunk(0, "aaa")], 8)
            .await
            .unwrap();
        let second = EmbeddingIndex::build(
            &provider,
            store.clone(),
            &[chunk(0, "bbb"), chunk(1, "ccc")],
            8,
        )
        .await
        .unwrap();

        let err = match first.query(&provider, "a", 4).await {
            Ok(hits) => panic!("stale session answered with {:?}", hits),
            Err(e) => e,
        };
        assert!(matches!(err, IndexError::Storage(_)));
        let err = err.into_article(Flow::Rag);
        assert_eq!(err.stage(), Stage::Index);
        assert!(!err.is_transient());

        let hits = second.query(&provider, "b", 4).await.unwrap();
        assert_eq!(hits[0].text, "bbb");
    }

    /// Answers every query with an ordinal past the end of the session.
    struct OutOfRangeStore;

    #[async_trait]
    impl VectorStore for OutOfRangeStore {
        async fn replace_all(&self, _: &str, _: &[Chunk], _: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }

        async fn similarity_query(
            &self,
            _session_id: &str,
            _query_vec: &[f32],
            _k: usize,
        ) -> Result<Vec<crate::store::ScoredChunk>> {
            Ok(vec![crate::store::ScoredChunk {
                ordinal: 7,
                score: 1.0,
            }])
        }

        async fn chunk_count(&self) -> Result<usize> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_unknown_ordinal_is_storage_error() {
        let provider = LetterProvider {
            calls: AtomicUsize::new(0),
        };
        let index = EmbeddingIndex::build(&provider, Arc::new(OutOfRangeStore), &[chunk(0, "a")], 8)
            .await
            .unwrap();
        let err = index.nearest(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, IndexError::Storage(_)));
        assert!(err.to_string().contains("no chunk at ordinal 7"), "{}", err);
    }

    #[test]
    fn test_join_context() {
        let chunks = vec![chunk(0, "one"), chunk(1, "two")];
        assert_eq!(join_context(&chunks), "one\n\ntwo");
        assert_eq!(join_context(&[]), "");
    }
}
