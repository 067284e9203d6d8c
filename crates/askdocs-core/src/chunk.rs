//! Sentence-boundary text chunker with overlap.
//!
//! Splits raw document text into [`TextChunk`]s sized for embedding. Sizes
//! are measured in characters (Unicode scalar values), the same unit the
//! embedders use for their input limit.
//!
//! # Algorithm
//!
//! 1. Cut the text into segments at line breaks and at sentence-ending
//!    punctuation (`.`, `?`, `!`) followed by whitespace. Trailing whitespace
//!    stays attached to the segment it follows, so segments tile the input.
//! 2. Hard-split any segment longer than `target_size` at the last
//!    whitespace before the limit, or at the limit itself.
//! 3. Pack segments greedily into chunk bodies of at most `target_size`
//!    characters. Whitespace-only segments never open a new chunk.
//! 4. Prefix every chunk after the first with up to `overlap` characters of
//!    the preceding text, snapped forward to a word start.
//!
//! The bodies (`start..end`) tile the input exactly, so no text is dropped
//! outside the overlap regions. A sentence cut at a chunk boundary is still
//! present in full in the following chunk whenever it fits in the overlap.
//!
//! # Example
//!
//! ```rust
//! use askdocs_core::chunk::{chunk_text, ChunkParams};
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", &ChunkParams::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].sequence_index, 0);
//! ```

use std::ops::Range;

use crate::error::ChunkingError;

/// Chunk sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Upper bound on the characters of a chunk body.
    pub target_size: usize,
    /// Characters of preceding context repeated at the start of each chunk.
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_size: 1000,
            overlap: 150,
        }
    }
}

impl ChunkParams {
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.target_size == 0 || self.overlap >= self.target_size {
            return Err(ChunkingError::InvalidParameters {
                target_size: self.target_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Longest chunk text this configuration can produce.
    pub fn max_chunk_chars(&self) -> usize {
        self.target_size + self.overlap
    }
}

/// A chunk of document text, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub sequence_index: usize,
    /// Trimmed overlap prefix plus body.
    pub text: String,
    /// Byte offset where the overlap prefix begins (equals `start` when there is none).
    pub overlap_start: usize,
    /// Byte offset of the body start in the source text.
    pub start: usize,
    /// Byte offset one past the body end in the source text.
    pub end: usize,
}

impl TextChunk {
    /// The byte range of the chunk body, excluding overlap.
    pub fn body(&self) -> Range<usize> {
        self.start..self.end
    }
}

struct Segment {
    start: usize,
    chars: usize,
    blank: bool,
}

impl Segment {
    fn new(text: &str, start: usize, end: usize) -> Self {
        let slice = &text[start..end];
        Self {
            start,
            chars: slice.chars().count(),
            blank: slice.trim().is_empty(),
        }
    }
}

/// Split `text` into chunks according to `params`.
///
/// Returns an empty vector for empty or whitespace-only input. Sequence
/// indices are contiguous from 0.
///
/// # Errors
///
/// - [`ChunkingError::InvalidParameters`] if `target_size` is 0 or `overlap`
///   is not smaller than `target_size`.
/// - [`ChunkingError::Unreadable`] if the text contains NUL characters.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Result<Vec<TextChunk>, ChunkingError> {
    params.validate()?;

    if text.contains('\0') {
        return Err(ChunkingError::Unreadable(
            "text contains NUL characters (binary content?)".to_string(),
        ));
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for range in split_sentences(text) {
        split_oversized(text, range, params.target_size, &mut segments);
    }

    let bodies = pack(text, &segments, params.target_size);

    let mut chunks = Vec::with_capacity(bodies.len());
    let mut previous_start = 0;
    for (index, body) in bodies.into_iter().enumerate() {
        let overlap_start = if index == 0 {
            body.start
        } else {
            overlap_start(text, previous_start, body.start, params.overlap)
        };
        previous_start = body.start;
        chunks.push(TextChunk {
            sequence_index: index,
            text: text[overlap_start..body.end].trim().to_string(),
            overlap_start,
            start: body.start,
            end: body.end,
        });
    }

    Ok(chunks)
}

/// Cut at line breaks and sentence ends, keeping following whitespace.
fn split_sentences(text: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let ends_sentence = match c {
            '\n' => true,
            '.' | '?' | '!' => chars.peek().is_some_and(|(_, next)| next.is_whitespace()),
            _ => false,
        };
        if !ends_sentence {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        out.push(start..end);
        start = end;
    }

    if start < text.len() {
        out.push(start..text.len());
    }
    out
}

/// Push `range` as one segment, or several if it exceeds `max_chars`.
fn split_oversized(text: &str, range: Range<usize>, max_chars: usize, out: &mut Vec<Segment>) {
    let mut start = range.start;

    while start < range.end {
        let rest = &text[start..range.end];
        let limit = match rest.char_indices().nth(max_chars) {
            Some((byte, _)) => byte,
            None => {
                out.push(Segment::new(text, start, range.end));
                return;
            }
        };

        let cut = rest[..limit]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(byte, c)| byte + c.len_utf8())
            .unwrap_or(limit);

        out.push(Segment::new(text, start, start + cut));
        start += cut;
    }
}

/// Greedily group segments into body ranges of at most `target` characters.
fn pack(text: &str, segments: &[Segment], target: usize) -> Vec<Range<usize>> {
    let mut bodies = Vec::new();
    let mut start = 0;
    let mut used = 0;

    for seg in segments {
        if seg.blank {
            continue;
        }
        if used > 0 && used + seg.chars > target {
            bodies.push(start..seg.start);
            start = seg.start;
            used = 0;
        }
        used += seg.chars;
    }
    bodies.push(start..text.len());
    bodies
}

/// Where the overlap prefix for a body starting at `body_start` begins.
///
/// Walks back `overlap` characters (never past `floor`, the previous body's
/// start) and then forward to the next word start.
fn overlap_start(text: &str, floor: usize, body_start: usize, overlap: usize) -> usize {
    if overlap == 0 || body_start <= floor {
        return body_start;
    }

    let window = &text[floor..body_start];
    let candidate = window
        .char_indices()
        .rev()
        .nth(overlap - 1)
        .map(|(byte, _)| floor + byte)
        .unwrap_or(floor);

    if candidate == floor {
        return candidate;
    }

    let at_word_start = text[..candidate]
        .chars()
        .next_back()
        .is_some_and(char::is_whitespace);
    if at_word_start {
        return candidate;
    }

    text[candidate..body_start]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(byte, c)| candidate + byte + c.len_utf8())
        .unwrap_or(body_start)
}
