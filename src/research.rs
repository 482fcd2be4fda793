//! Loading research material from disk.
//!
//! | Input | Documents |
//! |-------|-----------|
//! | `.json` array | one per element; strings verbatim, anything else serialized |
//! | `.json` other value | one, serialized |
//! | `.pdf`, `.docx` | one, text extracted |
//! | anything else | one, read as UTF-8 |
//!
//! Documents are numbered `doc_0`, `doc_1`, ... in load order.

use std::path::Path;

use anyhow::{Context, Result};

use crate::extract::{extract_text, BinaryFormat};
use crate::models::ResearchDocument;

/// Read research documents from `path`.
pub fn load_research(path: &Path) -> Result<Vec<ResearchDocument>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let texts = if is_json {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read research file: {}", path.display()))?;
        texts_from_json(&raw)
            .with_context(|| format!("Invalid JSON research file: {}", path.display()))?
    } else if let Some(format) = BinaryFormat::from_path(path) {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read research file: {}", path.display()))?;
        vec![extract_text(&bytes, format)
            .with_context(|| format!("Failed to extract text from {}", path.display()))?]
    } else {
        vec![std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read research file: {}", path.display()))?]
    };

    tracing::debug!(path = %path.display(), documents = texts.len(), "research loaded");
    Ok(documents_from_texts(texts))
}

fn texts_from_json(raw: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let texts = match value {
        serde_json::Value::Array(items) => items.into_iter().map(value_text).collect(),
        other => vec![value_text(other)],
    };
    Ok(texts)
}

fn value_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Wrap raw texts as documents with ids `doc_{i}`.
pub fn documents_from_texts<I, S>(texts: I) -> Vec<ResearchDocument>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| ResearchDocument::new(format!("doc_{}", i), text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_array_one_document_per_element() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, r#"["first note", {"fact": 42}, 7]"#).unwrap();

        let docs = load_research(&path).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].content, "first note");
        assert_eq!(docs[0].source_id, "doc_0");
        assert_eq!(docs[1].content, r#"{"fact":42}"#);
        assert_eq!(docs[2].content, "7");
        assert_eq!(docs[2].source_id, "doc_2");
    }

    #[test]
    fn test_json_object_single_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.JSON");
        std::fs::write(&path, r#"{"title": "Tides"}"#).unwrap();

        let docs = load_research(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, r#"{"title":"Tides"}"#);
    }

    #[test]
    fn test_plain_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Tides\n\nThe moon pulls.").unwrap();

        let docs = load_research(&path).unwrap();
        assert_eq!(docs, vec![ResearchDocument::new("doc_0", "# Tides\n\nThe moon pulls.")]);
    }

    #[test]
    fn test_missing_file_and_bad_json() {
        let dir = TempDir::new().unwrap();
        assert!(load_research(&dir.path().join("absent.txt")).is_err());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let err = load_research(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid JSON research file"));
    }

    #[test]
    fn test_documents_from_texts() {
        let docs = documents_from_texts(["a", "b"]);
        assert_eq!(docs[1].source_id, "doc_1");
        assert_eq!(docs[1].content, "b");
    }
}
