//! Core data models used throughout Article Harness.
//!
//! These types represent the requests, research documents, chunks, and
//! article variants that flow through the generation pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output register requested from the generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Conversational,
    Persuasive,
    Educational,
    Entertaining,
}

/// Fixed tone order used by the variants flow. Wraps around for more than
/// five variants.
pub const TONE_CYCLE: [Tone; 5] = [
    Tone::Professional,
    Tone::Conversational,
    Tone::Persuasive,
    Tone::Educational,
    Tone::Entertaining,
];

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Conversational => "conversational",
            Tone::Persuasive => "persuasive",
            Tone::Educational => "educational",
            Tone::Entertaining => "entertaining",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TONE_CYCLE
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown tone '{}'. Must be professional, conversational, persuasive, educational, or entertaining.",
                    s
                )
            })
    }
}

/// Writing style requested from the generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Informative,
    Persuasive,
    Narrative,
    Descriptive,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Informative => "informative",
            Style::Persuasive => "persuasive",
            Style::Narrative => "narrative",
            Style::Descriptive => "descriptive",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-processing applied to an already generated article.
///
/// Parsing is total: any unrecognised name maps to [`EnhancementKind::Improve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementKind {
    Expand,
    #[default]
    Improve,
    Summarize,
    Rewrite,
}

impl EnhancementKind {
    /// Resolve a user-supplied name, falling back to `Improve`.
    pub fn parse_or_default(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "expand" => EnhancementKind::Expand,
            "summarize" => EnhancementKind::Summarize,
            "rewrite" => EnhancementKind::Rewrite,
            _ => EnhancementKind::Improve,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementKind::Expand => "expand",
            EnhancementKind::Improve => "improve",
            EnhancementKind::Summarize => "summarize",
            EnhancementKind::Rewrite => "rewrite",
        }
    }

    /// Whether the template for this kind mentions a target length.
    pub fn uses_target_length(&self) -> bool {
        matches!(self, EnhancementKind::Expand | EnhancementKind::Summarize)
    }
}

impl fmt::Display for EnhancementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a single article request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub tone: Tone,
    /// Target length in words.
    pub target_length: u32,
    pub keywords: Vec<String>,
    pub style: Style,
}

impl GenerationRequest {
    /// A request with the default settings: professional,
    /// informative, 800 words, no keywords.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            tone: Tone::Professional,
            target_length: 800,
            keywords: Vec::new(),
            style: Style::Informative,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_length(mut self, words: u32) -> Self {
        self.target_length = words;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Keywords as they appear in prompts: `"a, b, c"`.
    pub fn keywords_joined(&self) -> String {
        self.keywords.join(", ")
    }
}

/// Split a comma-separated keyword list, dropping empty entries.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Caller-supplied research text, discarded after the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchDocument {
    pub content: String,
    /// Unique within a request (e.g. `doc_0`, or a file name).
    pub source_id: String,
}

impl ResearchDocument {
    pub fn new(source_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
        }
    }
}

/// A bounded-size segment of a research document; the unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Back-reference to the owning [`ResearchDocument`].
    pub source_id: String,
    /// Position within the owning document, contiguous from 0.
    pub sequence_index: usize,
    /// Character offset of the chunk's first character in the document.
    pub start: usize,
}

/// One article produced by the variants flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleVariant {
    /// 1-based, in generation order.
    pub variant_id: usize,
    pub tone: Tone,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_round_trip_names() {
        for tone in TONE_CYCLE {
            assert_eq!(tone.as_str().parse::<Tone>().unwrap(), tone);
        }
        assert!("sarcastic".parse::<Tone>().is_err());
        assert_eq!(" Persuasive ".parse::<Tone>().unwrap(), Tone::Persuasive);
    }

    #[test]
    fn test_enhancement_unknown_falls_back_to_improve() {
        assert_eq!(
            EnhancementKind::parse_or_default("bogus_kind"),
            EnhancementKind::Improve
        );
        assert_eq!(
            EnhancementKind::parse_or_default("SUMMARIZE"),
            EnhancementKind::Summarize
        );
        assert_eq!(EnhancementKind::default(), EnhancementKind::Improve);
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            parse_keywords("rust, async ,, tokio "),
            vec!["rust", "async", "tokio"]
        );
        assert!(parse_keywords("").is_empty());
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new("Solar power")
            .with_tone(Tone::Educational)
            .with_length(1200)
            .with_keywords(["panels", "grid"])
            .with_style(Style::Narrative);
        assert_eq!(req.tone, Tone::Educational);
        assert_eq!(req.target_length, 1200);
        assert_eq!(req.keywords_joined(), "panels, grid");
        assert_eq!(req.style, Style::Narrative);
    }

    #[test]
    fn test_variant_serializes_lowercase_tone() {
        let v = ArticleVariant {
            variant_id: 1,
            tone: Tone::Conversational,
            content: "hi".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["tone"], "conversational");
        assert_eq!(json["variant_id"], 1);
    }
}
