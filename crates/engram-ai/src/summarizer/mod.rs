//! Text synthesis capability.
//!
//! The engine hands a fully-formed prompt to a [`Summarizer`] and parses
//! labeled sections out of whatever comes back. Anything that can turn a
//! prompt into text can implement the trait; the shipped implementation
//! talks to the OpenAI chat completions API.

mod openai;
pub mod sections;

use async_trait::async_trait;

use crate::error::Result;

pub use openai::OpenAISummarizer;
pub use sections::{SummarySections, key_points_excerpt, parse_sections};

/// Stateless text synthesis.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate a completion for a fully-formed prompt.
    async fn summarize(&self, prompt: &str) -> Result<String>;

    /// Get model name.
    fn model_name(&self) -> &str;
}
