//! Text generation backends and the single-shot generation client.
//!
//! [`TextGenerator`] is the opaque "prompt in, text out" capability;
//! [`GenerationClient`] binds one to the configured model parameters and is
//! the single point every flow funnels through. Neither retries: a failed
//! call is reported once and the orchestrator decides what to do. Non-success
//! responses surface as [`HttpStatusError`] so the orchestrator can tell a
//! rate limit from a rejected request.
//!
//! | Config Value | Backend |
//! |-------------|---------|
//! | `"ollama"` | [`OllamaGenerator`] (`POST /api/generate`) |
//! | `"openai"` | [`OpenAIGenerator`] (`POST /v1/chat/completions`) |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::HttpStatusError;
use crate::prompts::RenderedPrompt;

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }
}

/// An opaque text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion for `prompt`. Blocking until the full text is available.
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Renders nothing itself; executes already rendered prompts against the
/// configured model.
#[derive(Clone)]
pub struct GenerationClient {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            params: GenerationParams::from(config),
        }
    }

    /// One completion, no retry, no streaming.
    pub async fn generate(&self, prompt: &RenderedPrompt) -> Result<String> {
        self.generator.complete(prompt.as_str(), &self.params).await
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build Ollama HTTP client")?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = OllamaGenerateRequest {
            model: &params.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                top_p: params.top_p,
                num_predict: params.max_tokens,
            },
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!(HttpStatusError {
                service: "Ollama",
                status,
                body,
            });
        }

        let parsed: OllamaGenerateResponse =
            resp.json().await.context("failed to parse Ollama response")?;
        Ok(parsed.response)
    }
}

// ============ OpenAI ============

/// Chat-completions backend. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self { api_key, client })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = ChatRequest {
            model: &params.model,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!(HttpStatusError {
                service: "OpenAI",
                status,
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await.context("failed to parse OpenAI response")?;
        first_choice(parsed)
    }
}

fn first_choice(parsed: ChatResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no message content"))
}

/// Create the backend named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
