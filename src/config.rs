//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all, see
//! [`load_config_or_default`]) yields a working configuration that targets
//! a local Ollama instance. Values are immutable once loaded; the pipeline
//! shares them behind an `Arc`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub article: ArticleConfig,
    pub index: IndexConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    /// `ollama` or `openai`.
    pub provider: String,
    pub model: String,
    /// Base URL for the Ollama provider.
    pub url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "deepseek-r1:7b".to_string(),
            url: default_ollama_url(),
            temperature: 0.8,
            top_p: 0.9,
            max_tokens: 2000,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `disabled`, `ollama`, `openai`, or `local`.
    pub provider: String,
    pub model: String,
    pub url: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "bge-m3".to_string(),
            url: default_ollama_url(),
            batch_size: 64,
            timeout_secs: 120,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be below `chunk_size`;
    /// checked by the chunker before any splitting.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks fed to the RAG prompt.
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArticleConfig {
    /// Target length in words when the caller gives none.
    pub default_length: u32,
    /// Smallest accepted target length in words.
    pub min_length: u32,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            default_length: 800,
            min_length: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// `sqlite` (persisted at `path`) or `memory`.
    pub backend: String,
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: PathBuf::from("./data/article_index.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extra attempts for failed embedding/generation calls. `0` disables retry.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Deadline for each external call. `0` means no deadline.
    pub call_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_base_delay_ms: 1000,
            call_timeout_secs: 0,
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

/// Load `path` if it exists, otherwise fall back to [`Config::default`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    let gen = &config.generation;
    match gen.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be ollama or openai.",
            other
        ),
    }
    if gen.model.trim().is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }
    if !(0.0..=2.0).contains(&gen.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if !(gen.top_p > 0.0 && gen.top_p <= 1.0) {
        anyhow::bail!("generation.top_p must be in (0.0, 1.0]");
    }
    if gen.max_tokens == 0 {
        anyhow::bail!("generation.max_tokens must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, openai, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }

    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    if config.article.min_length > config.article.default_length {
        anyhow::bail!(
            "article.min_length ({}) must not exceed article.default_length ({})",
            config.article.min_length,
            config.article.default_length
        );
    }

    match config.index.backend.as_str() {
        "sqlite" | "memory" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be sqlite or memory.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.generation.model, "deepseek-r1:7b");
        assert_eq!(config.embedding.model, "bge-m3");
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.k, 4);
        assert_eq!(config.pipeline.max_retries, 0);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.article.default_length, 800);
        assert_eq!(config.article.min_length, 300);
        assert_eq!(config.index.backend, "sqlite");
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config(
            r#"
[generation]
model = "llama3"
temperature = 0.2

[chunking]
chunk_size = 500
"#,
        )
        .unwrap();
        assert_eq!(config.generation.model, "llama3");
        assert!((config.generation.temperature - 0.2).abs() < 1e-6);
        assert!((config.generation.top_p - 0.9).abs() < 1e-6);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
    }

    #[test]
    fn test_overlap_not_rejected_at_load() {
        // Rejected later by the chunker, before any embedding.
        let config = parse_config("[chunking]\nchunk_size = 300\nchunk_overlap = 500\n").unwrap();
        assert_eq!(config.chunking.chunk_overlap, 500);
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse_config("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_bad_top_p() {
        assert!(parse_config("[generation]\ntop_p = 0.0\n").is_err());
        assert!(parse_config("[generation]\ntop_p = 1.5\n").is_err());
    }

    #[test]
    fn test_rejects_min_above_default() {
        assert!(parse_config("[article]\nmin_length = 900\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = load_config_or_default(Path::new("/nonexistent/artgen.toml")).unwrap();
        assert_eq!(config.retrieval.k, 4);
    }
}
