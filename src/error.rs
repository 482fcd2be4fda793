//! Error taxonomy for the generation pipeline.
//!
//! Every error that leaves the [`pipeline`](crate::pipeline) identifies the
//! [`Flow`] that was running and the [`Stage`] that failed, so callers can
//! tell a failed retrieval apart from a failed generation without parsing
//! messages. External capability errors (embedding, generation) are carried
//! verbatim as the error `source`.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Boxed error from an external capability (HTTP client, model runtime, storage).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ArticleError>;

/// The high-level operation an error originated from.
///
/// The names double as template names: each flow renders exactly one kind
/// of prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Scratch,
    Rag,
    Enhance,
    Variant,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Scratch => "scratch",
            Flow::Rag => "rag",
            Flow::Enhance => "enhance",
            Flow::Variant => "variant",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step within a flow at which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Render,
    Chunk,
    Embed,
    Index,
    Retrieve,
    Generate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Render => "render",
            Stage::Chunk => "chunk",
            Stage::Embed => "embed",
            Stage::Index => "index",
            Stage::Retrieve => "retrieve",
            Stage::Generate => "generate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the generation pipeline.
#[derive(Debug, Error)]
pub enum ArticleError {
    /// A template placeholder had no value. Programmer error; never expected
    /// in normal flow.
    #[error("{flow} flow failed at render: missing template parameter '{name}'")]
    MissingParameter { flow: Flow, name: String },

    /// `chunk_overlap` must be strictly smaller than `chunk_size`.
    #[error(
        "rag flow failed at chunk: invalid chunk config (chunk_size={chunk_size}, chunk_overlap={chunk_overlap}); overlap must be smaller than size"
    )]
    InvalidChunkConfig {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    /// The caller supplied a request that violates the data-model invariants.
    #[error("{flow} flow failed at validate: {reason}")]
    InvalidRequest { flow: Flow, reason: String },

    /// The embedding capability failed. `retryable` records whether the
    /// cause is one a retry policy may re-attempt (see [`is_retryable`]).
    #[error("{flow} flow failed at {stage}: embedding failure: {source}")]
    EmbeddingFailure {
        flow: Flow,
        stage: Stage,
        retryable: bool,
        #[source]
        source: BoxError,
    },

    /// The generation capability failed.
    #[error("{flow} flow failed at {stage}: generation failure: {source}")]
    GenerationFailure {
        flow: Flow,
        stage: Stage,
        retryable: bool,
        #[source]
        source: BoxError,
    },

    /// The vector storage backend could not persist or read the index.
    #[error("{flow} flow failed at index: storage failure: {source}")]
    IndexStorage {
        flow: Flow,
        #[source]
        source: BoxError,
    },

    /// An external call exceeded the caller-supplied deadline.
    #[error("{flow} flow failed at {stage}: deadline of {after:?} exceeded")]
    DeadlineExceeded {
        flow: Flow,
        stage: Stage,
        after: Duration,
    },
}

impl ArticleError {
    /// The flow that failed.
    pub fn flow(&self) -> Flow {
        match self {
            ArticleError::MissingParameter { flow, .. }
            | ArticleError::InvalidRequest { flow, .. }
            | ArticleError::EmbeddingFailure { flow, .. }
            | ArticleError::GenerationFailure { flow, .. }
            | ArticleError::IndexStorage { flow, .. }
            | ArticleError::DeadlineExceeded { flow, .. } => *flow,
            // Only the research flow splits documents.
            ArticleError::InvalidChunkConfig { .. } => Flow::Rag,
        }
    }

    /// The stage within the flow that failed.
    pub fn stage(&self) -> Stage {
        match self {
            ArticleError::MissingParameter { .. } => Stage::Render,
            ArticleError::InvalidChunkConfig { .. } => Stage::Chunk,
            ArticleError::InvalidRequest { .. } => Stage::Validate,
            ArticleError::EmbeddingFailure { stage, .. }
            | ArticleError::GenerationFailure { stage, .. }
            | ArticleError::DeadlineExceeded { stage, .. } => *stage,
            ArticleError::IndexStorage { .. } => Stage::Index,
        }
    }

    /// Wrap an embedding capability error, classifying it for retry.
    pub(crate) fn embedding(flow: Flow, stage: Stage, err: anyhow::Error) -> Self {
        ArticleError::EmbeddingFailure {
            flow,
            stage,
            retryable: is_retryable(&err),
            source: err.into(),
        }
    }

    /// Wrap a generation capability error, classifying it for retry.
    pub(crate) fn generation(flow: Flow, err: anyhow::Error) -> Self {
        ArticleError::GenerationFailure {
            flow,
            stage: Stage::Generate,
            retryable: is_retryable(&err),
            source: err.into(),
        }
    }

    /// Whether a retry policy may re-attempt the failed call.
    pub fn is_transient(&self) -> bool {
        match self {
            ArticleError::EmbeddingFailure { retryable, .. }
            | ArticleError::GenerationFailure { retryable, .. } => *retryable,
            ArticleError::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }
}

/// A non-success HTTP response from a model backend.
#[derive(Debug, Error)]
#[error("{service} returned {status}: {body}")]
pub struct HttpStatusError {
    pub service: &'static str,
    pub status: StatusCode,
    pub body: String,
}

impl HttpStatusError {
    /// Rate limiting (429) and server errors (5xx) may clear up on their own.
    pub fn is_retryable(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || self.status.is_server_error()
    }
}

/// Whether a capability error is worth another attempt.
///
/// Only HTTP 429/5xx responses and network failures (timeout or refused
/// connection) qualify. Anything else, such as a 401 or a missing API key,
/// fails on the first attempt.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(status) = cause.downcast_ref::<HttpStatusError>() {
            return status.is_retryable();
        }
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(|e| e.is_timeout() || e.is_connect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_flow_and_stage() {
        let err = ArticleError::GenerationFailure {
            flow: Flow::Rag,
            stage: Stage::Generate,
            retryable: true,
            source: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("rag flow failed at generate"), "{}", msg);
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_accessors() {
        let err = ArticleError::InvalidChunkConfig {
            chunk_size: 300,
            chunk_overlap: 500,
        };
        assert_eq!(err.flow(), Flow::Rag);
        assert_eq!(err.stage(), Stage::Chunk);

        let err = ArticleError::MissingParameter {
            flow: Flow::Enhance,
            name: "article".into(),
        };
        assert_eq!(err.stage(), Stage::Render);
        assert!(!err.is_transient());
    }

    fn status(code: u16) -> anyhow::Error {
        HttpStatusError {
            service: "OpenAI",
            status: StatusCode::from_u16(code).unwrap(),
            body: "{}".into(),
        }
        .into()
    }

    #[test]
    fn test_only_rate_limits_and_server_errors_are_retryable() {
        assert!(is_retryable(&status(429)));
        assert!(is_retryable(&status(503)));
        assert!(!is_retryable(&status(401)));
        assert!(!is_retryable(&status(400)));
        assert!(!is_retryable(&anyhow::anyhow!(
            "OPENAI_API_KEY environment variable not set"
        )));
        // Context added on top of the status keeps the classification.
        assert!(is_retryable(&status(500).context("embedding batch 2")));
    }

    #[test]
    fn test_is_transient_follows_cause() {
        let err = ArticleError::generation(Flow::Scratch, status(401));
        assert!(!err.is_transient());
        assert_eq!(err.stage(), Stage::Generate);
        assert!(err.to_string().contains("401 Unauthorized"), "{}", err);

        let err = ArticleError::embedding(Flow::Rag, Stage::Retrieve, status(429));
        assert!(err.is_transient());
        assert_eq!(err.stage(), Stage::Retrieve);

        let err = ArticleError::DeadlineExceeded {
            flow: Flow::Variant,
            stage: Stage::Generate,
            after: Duration::from_secs(1),
        };
        assert!(err.is_transient());
    }
}
