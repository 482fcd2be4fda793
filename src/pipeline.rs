//! The four article flows.
//!
//! [`ArticlePipeline`] owns nothing global: the generation backend, the
//! embedding provider, and the vector store are handed in at construction.
//! Each operation awaits its stages in order and returns either the raw
//! model output or an [`ArticleError`] naming the flow and stage that failed.
//!
//! ```text
//! generate_from_scratch   validate -> render(scratch) -> generate
//! generate_with_research  validate -> chunk -> embed -> index -> retrieve -> render(rag) -> generate
//! enhance_article         validate -> render(enhance) -> generate
//! generate_variants       per tone: [validate ->] render(variant) -> generate
//! ```
//!
//! External calls go through a single policy: an optional per-call deadline
//! and an opt-in bounded retry (`pipeline.max_retries`, off by default).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::chunk::{split_all, ChunkConfig};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{ArticleError, Flow, Result, Stage};
use crate::generation::{GenerationClient, TextGenerator};
use crate::index::{join_context, EmbeddingIndex};
use crate::models::{
    ArticleVariant, EnhancementKind, GenerationRequest, ResearchDocument, TONE_CYCLE,
};
use crate::prompts::{render, PromptParams, RenderedPrompt, TemplateKind};
use crate::store::VectorStore;

/// What the variants flow rewrites.
#[derive(Debug, Clone)]
pub enum VariantSource {
    /// Generate every variant from scratch with the tone swapped in.
    Request(GenerationRequest),
    /// Rewrite an existing article once per tone.
    Article(String),
}

pub struct ArticlePipeline {
    config: Arc<Config>,
    client: GenerationClient,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    deadline: Option<Duration>,
    /// Held across index build and query; the store has a single session slot.
    session_lock: Mutex<()>,
}

impl ArticlePipeline {
    pub fn new(
        config: Arc<Config>,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let client = GenerationClient::new(generator, &config.generation);
        let deadline = match config.pipeline.call_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            config,
            client,
            embedder,
            store,
            deadline,
            session_lock: Mutex::new(()),
        }
    }

    /// Bound every external call by `deadline`, overriding `pipeline.call_timeout_secs`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write an article with no research context.
    #[tracing::instrument(skip_all, fields(flow = "scratch", topic = %request.topic))]
    pub async fn generate_from_scratch(&self, request: &GenerationRequest) -> Result<String> {
        self.validate_request(request, Flow::Scratch)?;
        let prompt = render(TemplateKind::Scratch, &PromptParams::for_request(request))?;
        self.generate(Flow::Scratch, &prompt).await
    }

    /// Write an article grounded in the most relevant chunks of `documents`.
    ///
    /// With no documents this is exactly [`generate_from_scratch`](Self::generate_from_scratch).
    /// Chunking parameters are checked before the embedding provider is touched.
    #[tracing::instrument(skip_all, fields(flow = "rag", topic = %request.topic, documents = documents.len()))]
    pub async fn generate_with_research(
        &self,
        request: &GenerationRequest,
        documents: &[ResearchDocument],
    ) -> Result<String> {
        self.validate_request(request, Flow::Rag)?;
        if documents.is_empty() {
            tracing::info!("no research documents, falling back to scratch flow");
            return self.generate_from_scratch(request).await;
        }

        let chunking = &self.config.chunking;
        let chunk_config = ChunkConfig::new(chunking.chunk_size, chunking.chunk_overlap)?;
        let chunks = split_all(documents, &chunk_config);
        tracing::debug!(chunks = chunks.len(), "research split");

        let context = {
            let _session = self.session_lock.lock().await;

            let embedder = self.embedder.as_ref();
            let batch_size = self.config.embedding.batch_size;
            let chunk_slice = chunks.as_slice();
            let store = &self.store;
            let index = self
                .call_with_policy(Flow::Rag, Stage::Embed, || async move {
                    EmbeddingIndex::build(embedder, store.clone(), chunk_slice, batch_size)
                        .await
                        .map_err(|e| e.into_article(Flow::Rag))
                })
                .await?;

            let topic = request.topic.as_str();
            let k = self.config.retrieval.k;
            let index_ref = &index;
            let retrieved = self
                .call_with_policy(Flow::Rag, Stage::Retrieve, || async move {
                    index_ref
                        .query(embedder, topic, k)
                        .await
                        .map_err(|e| e.into_article(Flow::Rag))
                })
                .await?;
            tracing::info!(
                session = %index.session_id(),
                indexed = index.len(),
                retrieved = retrieved.len(),
                "retrieval complete"
            );
            join_context(&retrieved)
        };

        let prompt = render(
            TemplateKind::Rag,
            &PromptParams::for_rag(&request.topic, request.tone, &context),
        )?;
        self.generate(Flow::Rag, &prompt).await
    }

    /// Post-process an existing article.
    ///
    /// `target_length` only matters for expand and summarize and defaults to
    /// `article.default_length`.
    #[tracing::instrument(skip_all, fields(flow = "enhance", kind = %kind))]
    pub async fn enhance_article(
        &self,
        article: &str,
        kind: EnhancementKind,
        target_length: Option<u32>,
    ) -> Result<String> {
        if article.trim().is_empty() {
            return Err(ArticleError::InvalidRequest {
                flow: Flow::Enhance,
                reason: "article must not be empty".to_string(),
            });
        }
        let target_length = target_length.unwrap_or(self.config.article.default_length);
        if target_length == 0 {
            return Err(ArticleError::InvalidRequest {
                flow: Flow::Enhance,
                reason: "target length must be positive".to_string(),
            });
        }

        let prompt = render(
            TemplateKind::Enhance(kind),
            &PromptParams::for_enhance(article, target_length),
        )?;
        self.generate(Flow::Enhance, &prompt).await
    }

    /// Produce `count` variants cycling through the five tones in fixed order.
    ///
    /// `count <= 0` yields an empty list. Variants are generated one after
    /// another and returned in generation order.
    #[tracing::instrument(skip_all, fields(flow = "variant", count = count))]
    pub async fn generate_variants(
        &self,
        source: &VariantSource,
        count: i64,
    ) -> Result<Vec<ArticleVariant>> {
        if count <= 0 {
            return Ok(Vec::new());
        }
        if let VariantSource::Article(article) = source {
            if article.trim().is_empty() {
                return Err(ArticleError::InvalidRequest {
                    flow: Flow::Variant,
                    reason: "base article must not be empty".to_string(),
                });
            }
        }

        let count = usize::try_from(count).unwrap_or(usize::MAX);
        let mut variants = Vec::with_capacity(count.min(TONE_CYCLE.len() * 4));
        for i in 0..count {
            let tone = TONE_CYCLE[i % TONE_CYCLE.len()];
            tracing::debug!(variant = i + 1, tone = %tone, "generating variant");
            let content = match source {
                VariantSource::Article(article) => {
                    let prompt = render(
                        TemplateKind::Variant,
                        &PromptParams::for_variant(tone, article),
                    )?;
                    self.generate(Flow::Variant, &prompt).await?
                }
                VariantSource::Request(request) => {
                    let request = request.clone().with_tone(tone);
                    self.validate_request(&request, Flow::Variant)?;
                    // No article: the variant template renders as scratch.
                    let prompt =
                        render(TemplateKind::Variant, &PromptParams::for_request(&request))?;
                    self.generate(Flow::Variant, &prompt).await?
                }
            };
            variants.push(ArticleVariant {
                variant_id: i + 1,
                tone,
                content,
            });
        }
        Ok(variants)
    }

    fn validate_request(&self, request: &GenerationRequest, flow: Flow) -> Result<()> {
        if request.topic.trim().is_empty() {
            return Err(ArticleError::InvalidRequest {
                flow,
                reason: "topic must not be empty".to_string(),
            });
        }
        let min_length = self.config.article.min_length.max(1);
        if request.target_length < min_length {
            return Err(ArticleError::InvalidRequest {
                flow,
                reason: format!(
                    "target length {} is below the minimum of {} words",
                    request.target_length, min_length
                ),
            });
        }
        Ok(())
    }

    async fn generate(&self, flow: Flow, prompt: &RenderedPrompt) -> Result<String> {
        let client = &self.client;
        self.call_with_policy(flow, Stage::Generate, || async move {
            client
                .generate(prompt)
                .await
                .map_err(|e| ArticleError::generation(flow, e))
        })
        .await
    }

    /// Run one external call under the deadline and retry policy.
    ///
    /// Only transient failures (HTTP 429/5xx, network errors, deadlines) are
    /// retried, and only when `pipeline.max_retries > 0`; the delay doubles
    /// after every attempt.
    async fn call_with_policy<T, F, Fut>(&self, flow: Flow, stage: Stage, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = &self.config.pipeline;
        let mut attempt: u32 = 0;
        loop {
            let outcome = match self.deadline {
                Some(after) => match tokio::time::timeout(after, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(ArticleError::DeadlineExceeded { flow, stage, after }),
                },
                None => op().await,
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let delay = policy.retry_base_delay_ms.saturating_mul(1u64 << attempt.min(16));
                    tracing::warn!(
                        %flow,
                        %stage,
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        delay_ms = delay,
                        error = %e,
                        "external call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(%flow, %stage, error = %e, "flow failed");
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}
