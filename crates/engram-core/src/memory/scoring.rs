//! Importance scoring heuristic.
//!
//! Rates new content 1-10 from its word-level uniqueness against existing
//! memories and its length. Pure and deterministic; this is the default
//! scorer and stays the fallback if an AI-assisted scorer is ever wired in.

use std::collections::HashSet;

const UNIQUENESS_WEIGHT: f32 = 0.7;
const LENGTH_WEIGHT: f32 = 0.3;
const LENGTH_SATURATION_WORDS: f32 = 100.0;

/// Result of scoring a piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceScore {
    /// Importance rating, always within 1-10
    pub score: u8,
    /// Human-readable account of how the score was derived
    pub reasoning: Vec<String>,
}

/// Scores content importance against a project's existing memories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceScorer;

impl ImportanceScorer {
    fn word_set(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Score content against the bodies of existing memories.
    ///
    /// Uniqueness is the minimum over all memories of `1 - overlap`, where
    /// overlap is the fraction of the content's word set shared with that
    /// memory; with no memories the content is maximally unique.
    pub fn score(&self, content: &str, existing: &[&str]) -> ImportanceScore {
        let word_count = content.split_whitespace().count();
        let content_words = Self::word_set(content);

        let mut unique_score: f32 = 1.0;
        if !content_words.is_empty() {
            for memory in existing {
                let memory_words = Self::word_set(memory);
                let overlap = content_words
                    .iter()
                    .filter(|w| memory_words.contains(*w))
                    .count();
                let overlap_ratio = overlap as f32 / content_words.len() as f32;
                unique_score = unique_score.min(1.0 - overlap_ratio);
            }
        }
        let unique_score = unique_score.clamp(0.0, 1.0);

        let length_score = (word_count as f32 / LENGTH_SATURATION_WORDS).min(1.0);

        let combined = unique_score * UNIQUENESS_WEIGHT + length_score * LENGTH_WEIGHT;
        let score = (combined * 10.0).ceil().clamp(1.0, 10.0) as u8;

        ImportanceScore {
            score,
            reasoning: vec![
                format!(
                    "uniqueness {unique_score:.2} against {} existing memories",
                    existing.len()
                ),
                format!("length {word_count} words"),
            ],
        }
    }
}
