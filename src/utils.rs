//! # Utilities Module
//!
//! ## Purpose
//! Common utility functions and helpers used throughout the legal
//! intelligence engine for text handling, scoring and performance
//! measurement.
//!
//! ## Input/Output Specification
//! - **Input**: Various data types requiring common operations
//! - **Output**: Processed data, performance metrics
//! - **Functions**: Text utilities, score rounding, timing helpers

use std::time::Instant;

/// Performance timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

/// Text processing utilities
pub struct TextUtils;

impl Timer {
    /// Start a new timer with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("Timer '{}' completed in {}ms", self.name, elapsed);
        elapsed
    }
}

impl TextUtils {
    /// Truncate text to at most `max_chars` characters with ellipsis,
    /// safe for multi-byte text
    pub fn truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let keep = max_chars.saturating_sub(3);
        let truncated: String = text.chars().take(keep).collect();
        format!("{}...", truncated)
    }

    /// Extract a preview of the first `max_words` words
    pub fn extract_preview(text: &str, max_words: usize) -> String {
        let words: Vec<&str> = text.split_whitespace().take(max_words).collect();
        let preview = words.join(" ");

        if words.len() >= max_words {
            format!("{}...", preview)
        } else {
            preview
        }
    }
}

/// Round a similarity score to 4 decimals, the precision exposed by the API
pub fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_truncate() {
        assert_eq!(TextUtils::truncate("Hola mundo", 20), "Hola mundo");
        assert_eq!(
            TextUtils::truncate("Este es un texto muy largo", 10),
            "Este es..."
        );
        // Multi-byte characters must not split.
        assert_eq!(TextUtils::truncate("artículo único", 10), "artícul...");
    }

    #[test]
    fn test_extract_preview() {
        assert_eq!(
            TextUtils::extract_preview("uno dos tres cuatro", 2),
            "uno dos..."
        );
        assert_eq!(TextUtils::extract_preview("uno dos", 5), "uno dos");
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.123_456), 0.1235);
        assert_eq!(round_score(1.0), 1.0);
        assert_eq!(round_score(0.65), 0.65);
    }
}
