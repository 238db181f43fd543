//! Overlapping, boundary-aware text chunker.
//!
//! Splits extracted document text into ordered, non-empty segments of at
//! most `max_chars` characters. Consecutive segments share `overlap`
//! characters so context survives a cut.
//!
//! # Algorithm
//!
//! 1. Empty or whitespace-only text yields no chunks.
//! 2. Text of at most `max_chars` characters yields one chunk, trimmed.
//! 3. Otherwise a cursor scans forward. Each window `[cursor, cursor + max_chars)`
//!    ends at the last sentence boundary (`". "`) inside the window, else the
//!    last newline, but only when that boundary lies past the window midpoint.
//!    Failing both, the window is cut at exactly `cursor + max_chars`.
//! 4. The window is trimmed and kept if non-empty.
//! 5. The cursor moves to `end - overlap`. A window that reaches the end of
//!    the text is the last one.
//!
//! All lengths and offsets count `char`s, not bytes, so multi-byte text is
//! never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use corpus_rag_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(1000, 200).unwrap();
//! let text = "x".repeat(2500);
//! let chunks = chunk_text(&text, &params);
//! assert_eq!(chunks.len(), 3);
//! ```

use std::fmt;

use crate::fingerprint::chunk_id;
use crate::models::Chunk;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    max_chars: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Validate and build parameters. `overlap` must be smaller than
    /// `max_chars`, and `max_chars` must be positive.
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self, ChunkError> {
        if max_chars == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= max_chars {
            return Err(ChunkError::OverlapTooLarge { overlap, max_chars });
        }
        Ok(Self { max_chars, overlap })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Invalid chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    ZeroSize,
    OverlapTooLarge { overlap: usize, max_chars: usize },
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::ZeroSize => write!(f, "chunk size must be > 0"),
            ChunkError::OverlapTooLarge { overlap, max_chars } => write!(
                f,
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_chars
            ),
        }
    }
}

impl std::error::Error for ChunkError {}

/// Split `text` into ordered, trimmed, non-empty segments.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len <= params.max_chars {
        return vec![text.trim().to_string()];
    }

    let mut chunks = Vec::new();
    let mut cursor = 0usize;
    while cursor < len {
        let end = cut_point(&chars, cursor, params.max_chars);
        let piece: String = chars[cursor..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= len {
            break;
        }
        // A boundary cut close to the midpoint plus a large overlap could
        // step backwards; never let the cursor stall.
        let next = end.saturating_sub(params.overlap);
        cursor = if next > cursor { next } else { end };
    }
    chunks
}

/// Chunk a document and assign each piece its deterministic identity.
pub fn chunk_document(path: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    chunk_text(text, params)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: chunk_id(path, index, &text),
            path: path.to_string(),
            index,
            text,
        })
        .collect()
}

/// Exclusive end of the window starting at `cursor`.
fn cut_point(chars: &[char], cursor: usize, max_chars: usize) -> usize {
    let len = chars.len();
    let end = (cursor + max_chars).min(len);
    if end == len {
        return end;
    }

    let midpoint = cursor + max_chars / 2;

    let sentence = (cursor..end.saturating_sub(1))
        .rev()
        .find(|&i| chars[i] == '.' && chars[i + 1] == ' ');
    if let Some(pos) = sentence.filter(|&pos| pos > midpoint) {
        return pos + 1;
    }

    let line = (cursor..end).rev().find(|&i| chars[i] == '\n');
    if let Some(pos) = line.filter(|&pos| pos > midpoint) {
        return pos + 1;
    }

    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(max, overlap).unwrap()
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        let p = ChunkParams::default();
        assert!(chunk_text("", &p).is_empty());
        assert!(chunk_text("   \n\t  \n", &p).is_empty());
    }

    #[test]
    fn test_short_text_single_trimmed_chunk() {
        let chunks = chunk_text("  Hello, world!\n", &ChunkParams::default());
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_exact_size_is_single_chunk() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_unbroken_text_three_chunks_with_exact_overlap() {
        let text: String = (0..2500)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let chunks = chunk_text(&text, &params(1000, 200));

        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert!(c.chars().count() <= 1000);
        }
        assert_eq!(chunks[0], text[0..1000]);
        assert_eq!(chunks[1], text[800..1800]);
        assert_eq!(chunks[2], text[1600..2500]);
        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - 200..];
            assert_eq!(tail, &pair[1][..200]);
        }
    }

    #[test]
    fn test_prefers_sentence_boundary_past_midpoint() {
        // Sentence end at char 79, inside a 100-char window and past its midpoint.
        let mut text = "a".repeat(79);
        text.push_str(". ");
        text.push_str(&"b".repeat(100));
        let chunks = chunk_text(&text, &params(100, 10));
        assert!(chunks[0].ends_with('.'));
        assert_eq!(chunks[0].chars().count(), 80);
    }

    #[test]
    fn test_ignores_boundary_before_midpoint() {
        let mut text = "a".repeat(20);
        text.push_str(". ");
        text.push_str(&"b".repeat(200));
        let chunks = chunk_text(&text, &params(100, 10));
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn test_falls_back_to_newline_boundary() {
        let mut text = "a".repeat(70);
        text.push('\n');
        text.push_str(&"b".repeat(100));
        let chunks = chunk_text(&text, &params(100, 10));
        assert_eq!(chunks[0], "a".repeat(70));
    }

    #[test]
    fn test_coverage_no_gaps() {
        let text = (0..120)
            .map(|i| {
                if i % 9 == 0 {
                    format!("Heading {}\n", i)
                } else {
                    format!("Sentence number {} talks about topic {}. ", i, i * 7)
                }
            })
            .collect::<String>();
        let chunks = chunk_text(&text, &params(300, 60));
        assert!(chunks.len() > 1);

        let mut covered = vec![false; text.len()];
        let mut from = 0usize;
        for c in &chunks {
            assert!(!c.is_empty());
            let pos = from + text[from..].find(c.as_str()).expect("chunk not found in order");
            for flag in covered.iter_mut().skip(pos).take(c.len()) {
                *flag = true;
            }
            from = pos + 1;
        }
        for (i, ch) in text.char_indices() {
            if !ch.is_whitespace() {
                assert!(covered[i], "gap at byte {}", i);
            }
        }
    }

    #[test]
    fn test_multibyte_chars_counted_as_chars() {
        let text = "é".repeat(250);
        let chunks = chunk_text(&text, &params(100, 20));
        for c in &chunks {
            assert!(c.chars().count() <= 100);
        }
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_large_overlap_still_terminates() {
        let mut text = String::new();
        for _ in 0..40 {
            text.push_str(&"w".repeat(55));
            text.push_str(". ");
        }
        let chunks = chunk_text(&text, &params(100, 99));
        assert!(!chunks.is_empty());
        assert!(chunks.len() < text.len());
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert_eq!(ChunkParams::new(0, 0), Err(ChunkError::ZeroSize));
        assert!(matches!(
            ChunkParams::new(100, 100),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
        assert!(ChunkParams::new(100, 0).is_ok());
    }

    #[test]
    fn test_chunk_document_ids_deterministic() {
        let text = "Alpha beta. ".repeat(300);
        let a = chunk_document("notes/a.md", &text, &ChunkParams::default());
        let b = chunk_document("notes/a.md", &text, &ChunkParams::default());
        assert_eq!(a, b);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.id.starts_with(&format!("notes/a.md_chunk_{}_", i)));
        }
    }
}
