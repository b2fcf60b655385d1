//! Token-bounded text segmentation.
//!
//! Long text is split into segments that each fit a token budget, cutting
//! at the most natural boundary available. The granularity ladder runs
//! sentence -> paragraph -> clause -> word, each finer level engaged only
//! when a unit from the coarser level cannot fit the budget on its own.
//! A character-level split is the terminal guarantee, so segmentation
//! always terminates and every segment satisfies the budget.

use super::token::TokenEstimator;

/// Tokens held back before deciding a text needs no splitting at all.
pub const DEFAULT_RESERVED_OVERHEAD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Sentence,
    Paragraph,
    Clause,
    Word,
}

impl Granularity {
    fn next(self) -> Option<Granularity> {
        match self {
            Granularity::Sentence => Some(Granularity::Paragraph),
            Granularity::Paragraph => Some(Granularity::Clause),
            Granularity::Clause => Some(Granularity::Word),
            Granularity::Word => None,
        }
    }

    fn units(self, text: &str) -> Vec<String> {
        match self {
            Granularity::Sentence => split_sentences(text),
            Granularity::Paragraph => split_paragraphs(text),
            Granularity::Clause => text
                .split_inclusive([',', ';'])
                .map(str::to_string)
                .collect(),
            Granularity::Word => text
                .split_inclusive(|c: char| c.is_whitespace())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Sentence units end after `.`/`!`/`?` followed by whitespace, or at a
/// newline run. Trailing whitespace stays attached to the unit.
fn split_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = match c {
            '.' | '!' | '?' => chars.peek().is_none_or(|next| next.is_whitespace()),
            '\n' => true,
            _ => false,
        };
        if at_boundary {
            while let Some(&next) = chars.peek() {
                if next.is_whitespace() {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            units.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}

/// Paragraph units end at a blank-line run, which stays attached.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("\n\n") {
        let mut end = pos + 2;
        while rest[end..].starts_with('\n') {
            end += 1;
        }
        units.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        units.push(rest.to_string());
    }
    units
}

/// Splits text into token-bounded segments along natural boundaries.
#[derive(Debug, Clone)]
pub struct Chunker {
    estimator: TokenEstimator,
    reserved_overhead: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            estimator: TokenEstimator::default(),
            reserved_overhead: DEFAULT_RESERVED_OVERHEAD,
        }
    }
}

impl Chunker {
    pub fn new(estimator: TokenEstimator, reserved_overhead: usize) -> Self {
        Self {
            estimator,
            reserved_overhead,
        }
    }

    /// Split text into segments that each satisfy
    /// `estimate(segment) <= token_limit`.
    ///
    /// Text that fits the limit minus the reserved overhead is returned as
    /// a single segment. Empty or whitespace-only input yields no segments.
    pub fn split(&self, text: &str, token_limit: usize) -> Vec<String> {
        let limit = token_limit.max(1);

        if text.trim().is_empty() {
            return Vec::new();
        }
        if self.estimator.estimate(text) + self.reserved_overhead <= limit {
            return vec![text.to_string()];
        }

        let mut segments = Vec::new();
        self.split_level(text, limit, Granularity::Sentence, &mut segments);
        segments
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn split_level(&self, text: &str, limit: usize, level: Granularity, out: &mut Vec<String>) {
        let mut current = String::new();
        for unit in level.units(text) {
            if !current.is_empty()
                && self.estimator.estimate_bytes(current.len() + unit.len()) > limit
            {
                out.push(std::mem::take(&mut current));
            }

            if self.estimator.estimate(&unit) > limit {
                // The unit alone overflows; descend the ladder.
                match level.next() {
                    Some(finer) => self.split_level(&unit, limit, finer, out),
                    None => self.hard_split(&unit, limit, out),
                }
            } else {
                current.push_str(&unit);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    /// Last resort: cut on char boundaries at the byte budget.
    fn hard_split(&self, text: &str, limit: usize, out: &mut Vec<String>) {
        let max_bytes = self.estimator.bytes_for_tokens(limit).max(1);
        let mut rest = text;
        while !rest.is_empty() {
            let mut end = max_bytes.min(rest.len());
            while end > 0 && !rest.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                end = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            out.push(rest[..end].to_string());
            rest = &rest[end..];
        }
    }
}
