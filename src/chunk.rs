//! Word-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most `size`
//! whitespace-separated words. Chunks never overlap and preserve the
//! order of the source text, so joining them with single spaces yields
//! the whitespace-normalized original.
//!
//! Each chunk receives a positional id (`chunk_<index>`) plus a SHA-256
//! hash of its text.
//!
//! # Example
//!
//! ```rust
//! use study_harness::chunk::chunk_text;
//!
//! let chunks = chunk_text("one two three four five", 2);
//! assert_eq!(chunks, vec!["one two", "three four", "five"]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Default number of words per chunk.
pub const DEFAULT_CHUNK_WORDS: usize = 500;

/// Split `text` into consecutive windows of at most `size` words.
///
/// # Guarantees
///
/// - Empty or whitespace-only text yields no chunks.
/// - Every chunk except possibly the last holds exactly `size` words.
/// - Output is deterministic for a given `(text, size)`.
///
/// A `size` of zero is treated as one.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(size).map(|window| window.join(" ")).collect()
}

/// Chunk `text` and wrap each window in a [`Chunk`] with id, word count
/// and content hash.
pub fn build_chunks(text: &str, size: usize) -> Vec<Chunk> {
    chunk_text(text, size)
        .into_iter()
        .enumerate()
        .map(|(index, text)| make_chunk(index, text))
        .collect()
}

/// Hex SHA-256 of a string.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(index: usize, text: String) -> Chunk {
    Chunk {
        id: format!("chunk_{}", index),
        index,
        word_count: text.split_whitespace().count(),
        hash: content_hash(&text),
        text,
    }
}
