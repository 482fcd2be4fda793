//! # Article Harness CLI (`artgen`)
//!
//! Generates articles with a local or hosted language model, optionally
//! grounded in research files.
//!
//! ## Usage
//!
//! ```bash
//! artgen --config ./config/artgen.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `artgen generate` | Write an article from a topic |
//! | `artgen research` | Write an article grounded in a research file |
//! | `artgen enhance` | Expand, improve, summarize, or rewrite an article |
//! | `artgen variants` | Produce the same article in several tones |
//! | `artgen interactive` | Prompt for topic and tone on stdin |
//! | `artgen completions` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Conversational piece with keywords, saved to a file
//! artgen generate --topic "Urban beekeeping" --tone conversational \
//!     --keywords "honey,rooftops" --output bees.txt
//!
//! # Ground the article in a JSON list of notes
//! artgen research --topic "Tides" --research notes.json
//!
//! # Summarize an existing draft to 200 words
//! artgen enhance --article draft.txt --kind summarize --target-length 200
//!
//! # Seven variants, cycling through the five tones
//! artgen variants --topic "Remote work" --count 7 --output remote.txt
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use article_harness::commands::{self, EnhanceInput};
use article_harness::config::{load_config_or_default, Config};
use article_harness::models::{parse_keywords, EnhancementKind, GenerationRequest, Style, Tone};
use article_harness::pipeline::VariantSource;

/// Article Harness CLI: long-form article generation with optional
/// research grounding.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file falls back to built-in defaults (local Ollama).
#[derive(Parser)]
#[command(
    name = "artgen",
    about = "Article Harness: article generation with retrieval-augmented grounding",
    version,
    long_about = "Article Harness writes articles with a local (Ollama) or hosted (OpenAI) \
    language model. Articles can be written from scratch, grounded in research files, \
    enhanced after the fact, or rewritten in several tones."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/artgen.toml`. Generation, embedding, chunking,
    /// retrieval, and index settings are read from this file.
    #[arg(long, global = true, default_value = "./config/artgen.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Request fields shared by every command that writes a new article.
#[derive(Args)]
struct RequestArgs {
    /// Topic of the article.
    #[arg(long)]
    topic: Option<String>,

    #[arg(long, value_enum, default_value_t = Tone::Professional)]
    tone: Tone,

    /// Target length in words. Defaults to `[article].default_length`.
    #[arg(long)]
    length: Option<u32>,

    /// Comma-separated keywords to include.
    #[arg(long, default_value = "")]
    keywords: String,

    #[arg(long, value_enum, default_value_t = Style::Informative)]
    style: Style,
}

impl RequestArgs {
    fn to_request(&self, cfg: &Config) -> Result<GenerationRequest> {
        let topic = self
            .topic
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--topic is required"))?;
        Ok(GenerationRequest::new(topic)
            .with_tone(self.tone)
            .with_length(self.length.unwrap_or(cfg.article.default_length))
            .with_keywords(parse_keywords(&self.keywords))
            .with_style(self.style))
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Write an article from a topic.
    ///
    /// Prints the article followed by an estimated token count and the
    /// word count.
    Generate {
        #[command(flatten)]
        request: RequestArgs,

        /// Save the article to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write an article grounded in a research file.
    ///
    /// The file is split into overlapping chunks, embedded, and the chunks
    /// closest to the topic are handed to the model as context. JSON arrays
    /// are treated as one document per element; PDF and DOCX are extracted.
    Research {
        #[command(flatten)]
        request: RequestArgs,

        /// Research file (text, JSON, PDF, or DOCX).
        #[arg(long)]
        research: PathBuf,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Enhance an article.
    ///
    /// With `--article`, enhances that file. Otherwise generates an article
    /// from `--topic` first and enhances the result.
    Enhance {
        #[command(flatten)]
        request: RequestArgs,

        /// Existing article to enhance instead of generating one.
        #[arg(long)]
        article: Option<PathBuf>,

        /// `expand`, `improve`, `summarize`, or `rewrite`. Anything else means `improve`.
        #[arg(long, default_value = "improve")]
        kind: String,

        /// Word target for expand and summarize.
        #[arg(long)]
        target_length: Option<u32>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Produce several variants of an article, one tone each.
    ///
    /// Tones cycle professional, conversational, persuasive, educational,
    /// entertaining. With `--output post.txt` each variant is saved as
    /// `post_variant_<n>.txt`.
    Variants {
        #[command(flatten)]
        request: RequestArgs,

        /// Number of variants. Zero or less produces none.
        #[arg(long, allow_negative_numbers = true)]
        count: i64,

        /// Rewrite this article instead of generating each variant from the topic.
        #[arg(long)]
        article: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the variants as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Prompt for topic and tone, generate, and offer to save.
    Interactive,

    /// Print shell completions for `artgen`.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "artgen", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Generate { request, output } => {
            let req = request.to_request(&cfg)?;
            let pipeline = commands::build_pipeline(cfg, false).await?;
            commands::run_generate(&pipeline, &req, output.as_deref()).await?;
        }
        Commands::Research {
            request,
            research,
            output,
        } => {
            let req = request.to_request(&cfg)?;
            let pipeline = commands::build_pipeline(cfg, true).await?;
            commands::run_research(&pipeline, &req, &research, output.as_deref()).await?;
        }
        Commands::Enhance {
            request,
            article,
            kind,
            target_length,
            output,
        } => {
            let kind = EnhancementKind::parse_or_default(&kind);
            match article {
                Some(path) => {
                    let pipeline = commands::build_pipeline(cfg, false).await?;
                    commands::run_enhance(
                        &pipeline,
                        EnhanceInput::File(&path),
                        kind,
                        target_length,
                        output.as_deref(),
                    )
                    .await?;
                }
                None => {
                    let req = request.to_request(&cfg)?;
                    let pipeline = commands::build_pipeline(cfg, false).await?;
                    commands::run_enhance(
                        &pipeline,
                        EnhanceInput::Request(&req),
                        kind,
                        target_length,
                        output.as_deref(),
                    )
                    .await?;
                }
            }
        }
        Commands::Variants {
            request,
            count,
            article,
            output,
            json,
        } => {
            let source = match article {
                Some(path) => VariantSource::Article(std::fs::read_to_string(&path).map_err(
                    |e| anyhow::anyhow!("Failed to read article {}: {}", path.display(), e),
                )?),
                None => VariantSource::Request(request.to_request(&cfg)?),
            };
            let pipeline = commands::build_pipeline(cfg, false).await?;
            commands::run_variants(&pipeline, &source, count, output.as_deref(), json).await?;
        }
        Commands::Interactive => {
            let pipeline = commands::build_pipeline(cfg, false).await?;
            commands::run_interactive(&pipeline).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
