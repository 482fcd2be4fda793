//! Overlapping boundary-aware text chunker.
//!
//! Splits research documents into [`Chunk`]s of at most `chunk_size`
//! characters. Each window breaks at the latest paragraph break it can,
//! then sentence end, then word boundary, and only cuts mid-word when the
//! window has none of those. Every chunk after the first starts
//! `chunk_overlap` characters before the previous one ended, so dropping
//! those leading characters and concatenating reconstructs the document.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use sha2::{Digest, Sha256};

use crate::error::{ArticleError, Result};
use crate::models::{Chunk, ResearchDocument};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkConfig {
    /// Rejects `chunk_size == 0` and `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ArticleError::InvalidChunkConfig {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

/// Lazily split `doc`. The iterator is `Clone`; cloning it (or calling
/// `split` again) restarts from the same position with identical output.
pub fn split<'a>(doc: &'a ResearchDocument, config: &ChunkConfig) -> Chunks<'a> {
    let text = doc.content.as_str();
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    Chunks {
        text,
        source_id: &doc.source_id,
        offsets,
        size: config.chunk_size,
        overlap: config.chunk_overlap,
        start: 0,
        index: 0,
        done: text.is_empty(),
    }
}

/// Split every document, concatenating chunks in document order.
pub fn split_all(docs: &[ResearchDocument], config: &ChunkConfig) -> Vec<Chunk> {
    docs.iter().flat_map(|doc| split(doc, config)).collect()
}

/// Iterator returned by [`split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    source_id: &'a str,
    /// Byte offset of every char, plus `text.len()` as a sentinel.
    offsets: Vec<usize>,
    size: usize,
    overlap: usize,
    /// Char index where the next chunk begins.
    start: usize,
    index: usize,
    done: bool,
}

impl Chunks<'_> {
    fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, from: usize, to: usize) -> &str {
        &self.text[self.offsets[from]..self.offsets[to]]
    }

    fn char_at(&self, i: usize) -> char {
        self.slice(i, i + 1).chars().next().unwrap_or('\0')
    }

    /// Pick the end (exclusive char index) for a window starting at `start`
    /// that does not fit entirely. Candidates must leave at least one
    /// character past the overlap so every chunk makes progress.
    fn find_break(&self, start: usize) -> usize {
        let limit = start + self.size;
        let floor = start + self.overlap + 1;

        let paragraph = (floor..=limit)
            .rev()
            .find(|&end| end >= 2 && self.char_at(end - 1) == '\n' && self.char_at(end - 2) == '\n');
        if let Some(end) = paragraph {
            return end;
        }

        let sentence = (floor..=limit).rev().find(|&end| {
            end >= 2
                && self.char_at(end - 1).is_whitespace()
                && matches!(self.char_at(end - 2), '.' | '!' | '?')
        });
        if let Some(end) = sentence {
            return end;
        }

        let word = (floor..=limit)
            .rev()
            .find(|&end| self.char_at(end - 1).is_whitespace());
        word.unwrap_or(limit)
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let total = self.char_len();
        let start = self.start;
        let end = if total - start <= self.size {
            self.done = true;
            total
        } else {
            let end = self.find_break(start);
            self.start = end - self.overlap;
            end
        };

        let chunk = Chunk {
            text: self.slice(start, end).to_string(),
            source_id: self.source_id.to_string(),
            sequence_index: self.index,
            start,
        };
        self.index += 1;
        Some(chunk)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Rebuild a document from its chunks by dropping each later chunk's overlap.
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap));
        }
    }
    out
}

/// Hex SHA-256 of a chunk's text, stored alongside its vector.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
