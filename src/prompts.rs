//! Prompt templates for the four generation flows.
//!
//! [`render`] is pure string substitution over `{name}` placeholders: it
//! never calls a model and only fails when a placeholder has no value.
//! The resulting [`RenderedPrompt`] is opaque to the orchestrator, which
//! only hands it to the [`GenerationClient`](crate::generation::GenerationClient).

use std::collections::BTreeMap;

use crate::error::{ArticleError, Flow, Result};
use crate::models::{EnhancementKind, GenerationRequest, Tone};

const SCRATCH_TEMPLATE: &str = "\
You are a professional article writer.

Topic: {topic}
Tone: {tone}
Target length: {length} words
Keywords: {keywords}
Style: {style}

Write a complete article with headline, intro, body and conclusion.

Article:
";

const RAG_TEMPLATE: &str = "\
Use the following context to write a detailed article about {topic}.

Context:
{context}

Write in a {tone} tone.

Article:
";

const EXPAND_TEMPLATE: &str = "Expand this article to {target_length} words:\n\n{article}";
const IMPROVE_TEMPLATE: &str = "Improve this article:\n\n{article}";
const SUMMARIZE_TEMPLATE: &str = "Summarize this article in {target_length} words:\n\n{article}";
const REWRITE_TEMPLATE: &str = "Rewrite this article:\n\n{article}";

const VARIANT_TEMPLATE: &str = "Rewrite this article in a {tone} tone:\n\n{article}";

/// Which template to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Scratch,
    Rag,
    Enhance(EnhancementKind),
    Variant,
}

impl TemplateKind {
    /// The flow this template belongs to, used to tag render errors.
    pub fn flow(&self) -> Flow {
        match self {
            TemplateKind::Scratch => Flow::Scratch,
            TemplateKind::Rag => Flow::Rag,
            TemplateKind::Enhance(_) => Flow::Enhance,
            TemplateKind::Variant => Flow::Variant,
        }
    }

    fn source(&self) -> &'static str {
        match self {
            TemplateKind::Scratch => SCRATCH_TEMPLATE,
            TemplateKind::Rag => RAG_TEMPLATE,
            TemplateKind::Enhance(EnhancementKind::Expand) => EXPAND_TEMPLATE,
            TemplateKind::Enhance(EnhancementKind::Improve) => IMPROVE_TEMPLATE,
            TemplateKind::Enhance(EnhancementKind::Summarize) => SUMMARIZE_TEMPLATE,
            TemplateKind::Enhance(EnhancementKind::Rewrite) => REWRITE_TEMPLATE,
            TemplateKind::Variant => VARIANT_TEMPLATE,
        }
    }
}

/// Model-ready instruction text. Constructed only by [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt(String);

impl RenderedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for RenderedPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Named template parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptParams {
    values: BTreeMap<&'static str, String>,
}

impl PromptParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Parameters for the scratch template.
    pub fn for_request(req: &GenerationRequest) -> Self {
        Self::new()
            .set("topic", req.topic.clone())
            .set("tone", req.tone.as_str())
            .set("length", req.target_length.to_string())
            .set("keywords", req.keywords_joined())
            .set("style", req.style.as_str())
    }

    /// Parameters for the RAG template.
    pub fn for_rag(topic: &str, tone: Tone, context: &str) -> Self {
        Self::new()
            .set("topic", topic)
            .set("tone", tone.as_str())
            .set("context", context)
    }

    /// Parameters for an enhancement template.
    pub fn for_enhance(article: &str, target_length: u32) -> Self {
        Self::new()
            .set("article", article)
            .set("target_length", target_length.to_string())
    }

    /// Parameters for the variant rewrite template.
    pub fn for_variant(tone: Tone, article: &str) -> Self {
        Self::new().set("tone", tone.as_str()).set("article", article)
    }
}

/// Render `kind` with `params`.
///
/// `Variant` without an `article` parameter renders the scratch template
/// with the variant's tone (render errors still name the variant flow).
/// Placeholders are `{name}` with `name` made of ASCII letters and `_`.
/// Braces that do not form a placeholder are copied through. Parameter
/// values are inserted verbatim and never re-scanned, so an article that
/// itself contains `{article}` cannot recurse.
pub fn render(kind: TemplateKind, params: &PromptParams) -> Result<RenderedPrompt> {
    let template = match kind {
        TemplateKind::Variant if params.get("article").is_none() => SCRATCH_TEMPLATE,
        _ => kind.source(),
    };
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match placeholder_name(after) {
            Some(name) => {
                let value = params
                    .get(name)
                    .ok_or_else(|| ArticleError::MissingParameter {
                        flow: kind.flow(),
                        name: name.to_string(),
                    })?;
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Ok(RenderedPrompt(out))
}

/// Returns the placeholder name if `s` starts with `name}`.
fn placeholder_name(s: &str) -> Option<&str> {
    let close = s.find('}')?;
    let name = &s[..close];
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        Some(name)
    } else {
        None
    }
}

/// Names of the placeholders `kind` requires.
pub fn required_params(kind: TemplateKind) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut rest = kind.source();
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        if let Some(name) = placeholder_name(after) {
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after[name.len() + 1..];
        } else {
            rest = after;
        }
    }
    names
}
