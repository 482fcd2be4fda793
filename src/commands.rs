//! Handlers behind the `artgen` subcommands.
//!
//! Each `run_*` function drives one pipeline flow, prints the result to
//! stdout, and optionally saves it. Logging goes to stderr, so stdout can be
//! redirected into a file unchanged.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::embedding::{create_provider, DisabledProvider, EmbeddingProvider};
use crate::generation::create_generator;
use crate::models::{EnhancementKind, GenerationRequest, Tone};
use crate::output::{estimate_tokens, save_article, variant_path, word_count};
use crate::pipeline::{ArticlePipeline, VariantSource};
use crate::research::load_research;
use crate::store::{open_store, InMemoryStore, VectorStore};

const RULE: &str = "==================================================";

/// Wire the configured backends into a pipeline.
///
/// The embedding provider and persistent index are only opened when
/// `with_index` is set, so flows without research never touch them.
pub async fn build_pipeline(config: Config, with_index: bool) -> Result<ArticlePipeline> {
    let generator = create_generator(&config.generation)?;
    let embedder: Arc<dyn EmbeddingProvider>;
    let store: Arc<dyn VectorStore>;
    if with_index {
        if !config.embedding.is_enabled() {
            anyhow::bail!(
                "Research requires an embedding provider. Set [embedding] provider in config."
            );
        }
        embedder = Arc::from(create_provider(&config.embedding)?);
        store = open_store(&config.index).await?;
    } else {
        embedder = Arc::new(DisabledProvider);
        store = Arc::new(InMemoryStore::new());
    }
    Ok(ArticlePipeline::new(
        Arc::new(config),
        generator,
        embedder,
        store,
    ))
}

fn print_article(title: &str, article: &str) {
    println!();
    println!("{}", RULE);
    println!("{}", title);
    println!("{}", RULE);
    println!("{}", article);
}

fn save_if_requested(article: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        let written = save_article(article, Some(path))?;
        println!("Saved to {}", written.display());
    }
    Ok(())
}

pub async fn run_generate(
    pipeline: &ArticlePipeline,
    request: &GenerationRequest,
    output: Option<&Path>,
) -> Result<()> {
    let article = pipeline.generate_from_scratch(request).await?;
    print_article("GENERATED ARTICLE", &article);
    println!();
    println!("Estimated tokens: {}", estimate_tokens(&article));
    println!("Word count: {}", word_count(&article));
    save_if_requested(&article, output)
}

pub async fn run_research(
    pipeline: &ArticlePipeline,
    request: &GenerationRequest,
    research: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let documents = load_research(research)?;
    let article = pipeline.generate_with_research(request, &documents).await?;
    print_article("RESEARCH-BASED ARTICLE", &article);
    save_if_requested(&article, output)
}

/// What `enhance` starts from.
pub enum EnhanceInput<'a> {
    /// Generate a fresh article first, then enhance it.
    Request(&'a GenerationRequest),
    /// Enhance the contents of an existing file.
    File(&'a Path),
}

pub async fn run_enhance(
    pipeline: &ArticlePipeline,
    input: EnhanceInput<'_>,
    kind: EnhancementKind,
    target_length: Option<u32>,
    output: Option<&Path>,
) -> Result<()> {
    let article = match input {
        EnhanceInput::Request(request) => pipeline.generate_from_scratch(request).await?,
        EnhanceInput::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read article: {}", path.display()))?,
    };
    let enhanced = pipeline.enhance_article(&article, kind, target_length).await?;
    print_article("ENHANCED ARTICLE", &enhanced);
    save_if_requested(&enhanced, output)
}

pub async fn run_variants(
    pipeline: &ArticlePipeline,
    source: &VariantSource,
    count: i64,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let variants = pipeline.generate_variants(source, count).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&variants)?);
    } else {
        for variant in &variants {
            let title = format!(
                "VARIANT {} - {} TONE",
                variant.variant_id,
                variant.tone.as_str().to_uppercase()
            );
            print_article(&title, &variant.content);
        }
    }

    if let Some(base) = output {
        for variant in &variants {
            let path = variant_path(base, variant.variant_id);
            let written = save_article(&variant.content, Some(&path))?;
            if !json {
                println!("Saved to {}", written.display());
            }
        }
    }
    Ok(())
}

/// Ask for a topic and tone, generate, and offer to save.
pub async fn run_interactive(pipeline: &ArticlePipeline) -> Result<()> {
    if !atty::is(atty::Stream::Stdin) {
        tracing::warn!("stdin is not a terminal, reading answers from piped input");
    }
    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    println!();
    println!("Interactive mode");
    println!();
    let topic = prompt_line(&mut input, "Enter article topic: ")?;
    let tone_raw = prompt_line(
        &mut input,
        "Tone (professional/conversational/persuasive/educational/entertaining) [professional]: ",
    )?;
    let tone = if tone_raw.is_empty() {
        Tone::Professional
    } else {
        tone_raw.parse::<Tone>().map_err(anyhow::Error::msg)?
    };

    let request = GenerationRequest::new(topic)
        .with_tone(tone)
        .with_length(pipeline.config().article.default_length);
    let article = pipeline.generate_from_scratch(&request).await?;
    print_article("GENERATED ARTICLE", &article);

    let answer = prompt_line(&mut input, "\nSave article? (y/n): ")?;
    if answer.eq_ignore_ascii_case("y") {
        let written = save_article(&article, None)?;
        println!("Saved to {}", written.display());
    }
    Ok(())
}

fn prompt_line(input: &mut impl BufRead, prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_line_trims() {
        let mut input = std::io::Cursor::new(b"  Tides and moons \nnext".to_vec());
        assert_eq!(prompt_line(&mut input, "").unwrap(), "Tides and moons");
        assert_eq!(prompt_line(&mut input, "").unwrap(), "next");
        assert_eq!(prompt_line(&mut input, "").unwrap(), "");
    }

    #[tokio::test]
    async fn test_research_requires_embeddings() {
        let mut config = Config::default();
        config.embedding.provider = "disabled".into();
        let err = match build_pipeline(config, true).await {
            Ok(_) => panic!("pipeline should not build"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("embedding provider"));
    }
}
