//! Sliding-window text chunker.
//!
//! Splits document text into overlapping windows of `chunk_size` characters.
//! Each window starts `chunk_size - chunk_overlap` characters after the
//! previous one, and the last window is the first that reaches the end of the
//! text. Sizes are counted in `char`s, so a window never splits a character.
//!
//! Every window is then capped to `tokens_per_chunk` whitespace-delimited
//! tokens so it fits the embedding model's input limit. The cap cuts at the
//! end of the last kept token.
//!
//! Chunk IDs are derived from the source ID and the window ordinal, so
//! re-chunking unchanged text always yields the same IDs.
//!
//! # Example
//!
//! ```rust
//! use rag_mind::chunk::ChunkParams;
//!
//! let params = ChunkParams::new(1000, 100, 10_000).unwrap();
//! let text = "x".repeat(2500);
//! let starts: Vec<usize> = params.windows(&text).map(|w| w.start).collect();
//! assert_eq!(starts, vec![0, 900, 1800]);
//! ```

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
    tokens_per_chunk: usize,
}

impl ChunkParams {
    /// Validate and build chunking parameters.
    ///
    /// Fails with [`RagError::Configuration`] when the window would not
    /// advance (`chunk_size <= chunk_overlap`) or any limit is zero.
    pub fn new(chunk_size: usize, chunk_overlap: usize, tokens_per_chunk: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::config("chunk_size must be > 0"));
        }
        if chunk_size <= chunk_overlap {
            return Err(RagError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        if tokens_per_chunk == 0 {
            return Err(RagError::config("tokens_per_chunk must be > 0"));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            tokens_per_chunk,
        })
    }

    /// Distance in characters between consecutive window starts.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Lazily iterate over the windows of `text`.
    ///
    /// The iterator is `Clone`; calling this again restarts from the top.
    pub fn windows<'a>(&self, text: &'a str) -> Windows<'a> {
        Windows {
            text,
            params: *self,
            position: 0,
            start_char: 0,
            start_byte: 0,
            done: false,
        }
    }
}

/// One window of a document, borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Ordinal of the window within the document.
    pub position: usize,
    /// Character offset of the window start.
    pub start: usize,
    /// Window text after the token cap.
    pub text: &'a str,
}

/// Iterator over the windows of a document. See [`ChunkParams::windows`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    text: &'a str,
    params: ChunkParams,
    position: usize,
    start_char: usize,
    start_byte: usize,
    done: bool,
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.start_byte >= self.text.len() {
            return None;
        }

        let rest = &self.text[self.start_byte..];
        let end = byte_offset(rest, self.params.chunk_size);
        let window = Window {
            position: self.position,
            start: self.start_char,
            text: truncate_to_tokens(&rest[..end], self.params.tokens_per_chunk),
        };

        if end == rest.len() {
            self.done = true;
        } else {
            let step = self.params.step();
            self.start_byte += byte_offset(rest, step);
            self.start_char += step;
            self.position += 1;
        }

        Some(window)
    }
}

/// Byte offset of the `n`-th character of `s`, or `s.len()` if shorter.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Cap `text` to `max_tokens` whitespace-delimited tokens.
///
/// Text within the limit is returned unchanged; otherwise the result ends at
/// the last character of the final kept token.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let mut count = 0usize;
    let mut in_token = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_token {
                in_token = false;
                if count == max_tokens {
                    return &text[..i];
                }
            }
        } else if !in_token {
            in_token = true;
            count += 1;
        }
    }

    text
}

/// Deterministic chunk ID: `"{source_id}:{position:06}"`.
///
/// The zero padding keeps lexical ID order equal to positional order.
pub fn chunk_id(source_id: &str, position: usize) -> String {
    format!("{}:{:06}", source_id, position)
}

/// Chunk a whole document.
///
/// Windows that are blank after the token cap are dropped; the remaining
/// chunks keep their window ordinal as `position`, so IDs stay tied to
/// offsets in the text.
pub fn chunk_document(source_id: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    params
        .windows(text)
        .filter(|w| !w.text.trim().is_empty())
        .map(|w| Chunk {
            chunk_id: chunk_id(source_id, w.position),
            source_id: source_id.to_string(),
            position: w.position,
            start: w.start,
            text: w.text.to_string(),
        })
        .collect()
}
