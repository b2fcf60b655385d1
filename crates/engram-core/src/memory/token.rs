//! Token estimation.
//!
//! Every budget decision in the engine runs through one cheap heuristic:
//! byte length divided by a configured characters-per-token ratio. The
//! ratio is a tunable constant, never derived from the text itself, so the
//! estimate is deterministic and O(length).

/// Default characters-per-token ratio (works well for English text).
pub const DEFAULT_CHARS_PER_TOKEN: f32 = 4.0;

/// Cheap, deterministic token count approximation.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    chars_per_token: f32,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator {
    /// Create an estimator with the given ratio. Non-positive ratios fall
    /// back to the default.
    pub fn new(chars_per_token: f32) -> Self {
        let chars_per_token = if chars_per_token > 0.0 {
            chars_per_token
        } else {
            DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    /// Estimate the token count of a string.
    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_bytes(text.len())
    }

    /// Estimate the token count of `byte_len` bytes of text.
    pub fn estimate_bytes(&self, byte_len: usize) -> usize {
        (byte_len as f32 / self.chars_per_token).ceil() as usize
    }

    /// Maximum byte length that still fits a token budget.
    pub fn bytes_for_tokens(&self, tokens: usize) -> usize {
        ((tokens as f32) * self.chars_per_token).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        let estimator = TokenEstimator::default();
        assert_eq!(estimator.estimate(""), 0);
        assert_eq!(estimator.estimate("abcd"), 1);
        assert_eq!(estimator.estimate("abcde"), 2);
        assert_eq!(estimator.estimate(&"a".repeat(100)), 25);
    }

    #[test]
    fn test_custom_ratio() {
        let estimator = TokenEstimator::new(2.0);
        assert_eq!(estimator.estimate("abcd"), 2);
    }

    #[test]
    fn test_non_positive_ratio_falls_back() {
        let estimator = TokenEstimator::new(0.0);
        assert_eq!(estimator.estimate("abcd"), 1);
    }

    #[test]
    fn test_bytes_for_tokens_inverts_estimate() {
        let estimator = TokenEstimator::default();
        let bytes = estimator.bytes_for_tokens(10);
        assert_eq!(estimator.estimate_bytes(bytes), 10);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let estimator = TokenEstimator::default();
        let text = "the same text every time";
        assert_eq!(estimator.estimate(text), estimator.estimate(text));
    }
}
