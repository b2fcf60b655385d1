//! Engine configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};

// Default configuration constants
const DEFAULT_SHORT_TERM_LIMIT: usize = 10;
const DEFAULT_CONTEXT_WINDOW_TOKENS: usize = 4096;
const DEFAULT_PROMPT_RESERVE_TOKENS: usize = 512;
const DEFAULT_OUTPUT_RESERVE_TOKENS: usize = 1024;
const DEFAULT_CHARS_PER_TOKEN: f32 = 4.0;
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_RECENT_COMPRESSED_WINDOW_HOURS: i64 = 24;
const DEFAULT_MAX_COMPRESSION_PASSES: usize = 10;
const DEFAULT_FALLBACK_TOP_N: usize = 5;
const DEFAULT_CHUNK_RESERVED_OVERHEAD: usize = 64;
const DEFAULT_EMBEDDING_CACHE_ENTRIES: usize = 2048;
const MIN_SHORT_TERM_LIMIT: usize = 2;

/// Engine configuration.
///
/// All token figures are estimates under `chars_per_token`, not exact
/// tokenizer counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Buffer size at which a compression cycle triggers
    pub short_term_limit: usize,
    /// Total token budget for one summarization call
    pub context_window_tokens: usize,
    /// Tokens reserved for the instruction template
    pub prompt_reserve_tokens: usize,
    /// Tokens reserved for the expected structured output
    pub output_reserve_tokens: usize,
    /// Characters-per-token ratio for estimation
    pub chars_per_token: f32,
    /// Minimum cosine similarity for a graph edge or retrieval hit
    pub similarity_threshold: f32,
    /// Number of primary results a query returns
    pub top_k: usize,
    /// Trailing window for folding in a prior compressed memory
    pub recent_compressed_window_hours: i64,
    /// Cap on consecutive compression cycles per trigger
    pub max_compression_passes: usize,
    /// Entries kept by the deterministic compression fallback
    pub fallback_top_n: usize,
    /// Tokens held back when deciding if text needs chunking at all
    pub chunk_reserved_overhead: usize,
    /// Bound on the in-memory embedding cache
    pub embedding_cache_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            short_term_limit: DEFAULT_SHORT_TERM_LIMIT,
            context_window_tokens: DEFAULT_CONTEXT_WINDOW_TOKENS,
            prompt_reserve_tokens: DEFAULT_PROMPT_RESERVE_TOKENS,
            output_reserve_tokens: DEFAULT_OUTPUT_RESERVE_TOKENS,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            recent_compressed_window_hours: DEFAULT_RECENT_COMPRESSED_WINDOW_HOURS,
            max_compression_passes: DEFAULT_MAX_COMPRESSION_PASSES,
            fallback_top_n: DEFAULT_FALLBACK_TOP_N,
            chunk_reserved_overhead: DEFAULT_CHUNK_RESERVED_OVERHEAD,
            embedding_cache_entries: DEFAULT_EMBEDDING_CACHE_ENTRIES,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.short_term_limit < MIN_SHORT_TERM_LIMIT {
            return Err(anyhow::anyhow!(
                "Short-term limit must be at least {}",
                MIN_SHORT_TERM_LIMIT
            ));
        }

        if self.chars_per_token <= 0.0 {
            return Err(anyhow::anyhow!("Chars-per-token ratio must be positive"));
        }

        let reserved = self.prompt_reserve_tokens + self.output_reserve_tokens;
        if reserved >= self.context_window_tokens {
            return Err(anyhow::anyhow!(
                "Reserved tokens ({}) must leave room in the context window ({})",
                reserved,
                self.context_window_tokens
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(anyhow::anyhow!(
                "Similarity threshold must be within [0, 1]"
            ));
        }

        if self.top_k == 0 {
            return Err(anyhow::anyhow!("Top-K must be at least 1"));
        }

        if self.max_compression_passes == 0 {
            return Err(anyhow::anyhow!(
                "Max compression passes must be at least 1"
            ));
        }

        Ok(())
    }

    /// Tokens available for compression input after reserves.
    pub fn available_tokens(&self) -> usize {
        self.context_window_tokens
            .saturating_sub(self.prompt_reserve_tokens)
            .saturating_sub(self.output_reserve_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_available_tokens() {
        let config = EngineConfig {
            context_window_tokens: 1000,
            prompt_reserve_tokens: 100,
            output_reserve_tokens: 200,
            ..EngineConfig::default()
        };
        assert_eq!(config.available_tokens(), 700);
    }

    #[test]
    fn test_validate_rejects_tiny_buffer() {
        let config = EngineConfig {
            short_term_limit: 1,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overfull_reserves() {
        let config = EngineConfig {
            context_window_tokens: 500,
            prompt_reserve_tokens: 300,
            output_reserve_tokens: 300,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = EngineConfig {
            similarity_threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
