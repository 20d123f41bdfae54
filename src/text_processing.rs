//! # Text Processing Module
//!
//! ## Purpose
//! Normalization and chunking for juridical document text: cleans the
//! encoding and whitespace artifacts typical of extracted PDF/HTML text and
//! splits structural sections into overlapping word windows for embedding.
//!
//! ## Input/Output Specification
//! - **Input**: Raw extracted text, structural segments
//! - **Output**: Normalized UTF-8 text, embedding-ready chunks
//! - **Guarantees**: Deterministic output; at least one chunk for any
//!   non-empty text
//!
//! ## Key Features
//! - BOM and control character stripping
//! - Line ending and whitespace normalization
//! - Character-budget truncation safe for multi-byte text
//! - Sliding-window chunking with configurable overlap

use crate::clients::nlp::Segment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// A chunk of text ready for embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text (whitespace-joined words)
    pub text: String,
    /// Structural section the chunk belongs to
    pub section: String,
    /// Zero-based index across all chunks of the document
    pub chunk_index: usize,
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn repeated_spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").unwrap())
}

fn leading_spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^ +").unwrap())
}

/// Normalize extracted text for uniform downstream processing.
///
/// Strips byte-order marks, normalizes line endings to `\n`, applies NFC
/// normalization, removes control characters except tab and newline,
/// collapses runs of 3+ newlines to 2, collapses repeated spaces and trims
/// leading whitespace from every line.
pub fn normalize(text: &str) -> String {
    let text = text.replace('\u{FEFF}', "");

    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let text: String = text.nfc().collect();

    let text: String = text
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect();

    let text = blank_lines_re().replace_all(&text, "\n\n");
    let text = repeated_spaces_re().replace_all(&text, " ");
    let text = leading_spaces_re().replace_all(&text, "");

    text.trim().to_string()
}

/// Truncate to at most `max_chars` characters, safe for multi-byte text
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split segments into overlapping word windows.
///
/// Each segment is windowed independently with `max_tokens` words per chunk
/// and `overlap` words shared between consecutive chunks, so chunk *k* of a
/// segment starts at word offset `k * (max_tokens - overlap)`. Chunks of 10
/// characters or fewer are discarded. If no chunk survives but `full_text`
/// is non-empty, a single `body` chunk over the first window is produced.
pub fn chunk_segments(
    segments: &[Segment],
    full_text: &str,
    max_tokens: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let stride = max_tokens.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();

    for segment in segments {
        if segment.text.is_empty() {
            continue;
        }

        let words: Vec<&str> = segment.text.split_whitespace().collect();
        let mut pos = 0;

        while pos < words.len() {
            let end = (pos + max_tokens).min(words.len());
            let chunk_text = words[pos..end].join(" ");

            if chunk_text.chars().count() > 10 {
                chunks.push(Chunk {
                    text: chunk_text,
                    section: segment.section.clone(),
                    chunk_index: chunks.len(),
                });
            }

            pos += stride;
        }
    }

    // At least one chunk whenever there is any text.
    if chunks.is_empty() && !full_text.is_empty() {
        let words: Vec<&str> = full_text.split_whitespace().collect();
        let end = max_tokens.min(words.len());
        chunks.push(Chunk {
            text: words[..end].join(" "),
            section: "body".to_string(),
            chunk_index: 0,
        });
    }

    chunks
}
