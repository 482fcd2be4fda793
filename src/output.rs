//! Saving articles and summarizing them for the terminal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

/// Write `article` to `path`, or to `article_<timestamp>.txt` in the current
/// directory. Returns the path written.
pub fn save_article(article: &str, path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(default_file_name()),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&path, article)
        .with_context(|| format!("Failed to write article: {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = article.len(), "article saved");
    Ok(path)
}

fn default_file_name() -> String {
    format!("article_{}.txt", Local::now().format("%Y%m%d_%H%M%S"))
}

/// `out/post.txt` -> `out/post_variant_3.txt`. Paths without an extension
/// get the suffix appended.
pub fn variant_path(base: &Path, variant_id: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}_variant_{}.{}", stem, variant_id, ext.to_string_lossy()),
        None => format!("{}_variant_{}", stem, variant_id),
    };
    base.with_file_name(name)
}

/// Rough token count: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
