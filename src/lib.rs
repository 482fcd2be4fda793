//! # Article Harness
//!
//! Long-form article generation on top of a local (Ollama) or hosted
//! (OpenAI) language model, optionally grounded in caller-supplied research.
//!
//! Four flows share one pipeline: write from scratch, write from research
//! (chunk, embed, retrieve, then write), enhance an existing article, and
//! rewrite an article in several tones.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────────┐   ┌────────────┐
//! │ research │──▶│  chunker  │──▶│ embed + index │──▶│  prompts   │
//! │  loader  │   │ (overlap) │   │ (SQLite/mem)  │   │ (4 kinds)  │
//! └──────────┘   └───────────┘   └───────────────┘   └─────┬──────┘
//!                                                          ▼
//!                  ┌──────────┐    ┌─────────────────────────────┐
//!                  │   CLI    │◀───│ pipeline -> generation client│
//!                  │ (artgen) │    └─────────────────────────────┘
//!                  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! artgen generate --topic "Urban beekeeping" --tone conversational
//! artgen research --topic "Tides" --research notes.json
//! artgen enhance --article draft.txt --kind summarize --target-length 200
//! artgen variants --topic "Remote work" --count 7 --json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Requests, documents, chunks, variants |
//! | [`error`] | Flow/stage tagged error taxonomy |
//! | [`prompts`] | Prompt templates and rendering |
//! | [`chunk`] | Overlapping text chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector storage backends |
//! | [`index`] | Per-session embedding index |
//! | [`generation`] | Text generation backends |
//! | [`pipeline`] | The four article flows |
//! | [`research`] | Loading research files |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`output`] | Saving and summarizing articles |
//! | [`commands`] | CLI command handlers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod migrate;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod research;
pub mod store;

pub use error::{ArticleError, Flow, Stage};
pub use pipeline::{ArticlePipeline, VariantSource};
