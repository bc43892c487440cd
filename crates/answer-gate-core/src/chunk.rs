//! Paragraph-boundary passage splitter.
//!
//! Uploaded documents are cut into [`SourcePassage`]s before they reach a
//! retriever. Paragraphs (`\n\n`) are packed greedily until the next one
//! would push the passage past `max_tokens × 4` characters. A paragraph
//! that is too large on its own is hard-split at the last newline or
//! space before the limit.
//!
//! ```rust
//! use answer_gate_core::chunk::chunk_text;
//!
//! let passages = chunk_text("notes.md", "md", "One.\n\nTwo.", 250);
//! assert_eq!(passages.len(), 1);
//! assert_eq!(passages[0].metadata.chunk_index, 0);
//! ```

use crate::models::SourcePassage;
use crate::text::floor_char_boundary;

/// Rough characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into passages tagged with `document_id` and `file_kind`.
///
/// Indices are contiguous from 0. Whitespace-only text yields no passages.
pub fn chunk_text(
    document_id: &str,
    file_kind: &str,
    text: &str,
    max_tokens: usize,
) -> Vec<SourcePassage> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let would_be = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };
        if would_be > max_chars && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }

        if para.len() > max_chars {
            pieces.extend(hard_split(para, max_chars));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }
    if !buf.is_empty() {
        pieces.push(buf);
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| SourcePassage::new(piece, document_id, i as i64, file_kind))
        .collect()
}

/// Cut an oversized paragraph into pieces of at most `max_chars` bytes,
/// preferring newline then space boundaries.
fn hard_split(para: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = para;

    while !remaining.is_empty() {
        let mut cut = if remaining.len() <= max_chars {
            remaining.len()
        } else {
            let limit = floor_char_boundary(remaining, max_chars);
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        };
        if cut == 0 {
            // a single char wider than the limit
            cut = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }

        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[cut..];
    }
    out
}
