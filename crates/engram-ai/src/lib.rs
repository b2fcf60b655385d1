//! Engram AI - external capability layer
//!
//! This crate provides:
//! - `Summarizer` trait and OpenAI-backed implementation (text synthesis)
//! - `EmbeddingProvider` trait and OpenAI-backed implementation
//! - In-memory embedding cache
//! - Tolerant parser for structured summary sections
//! - Capability error taxonomy shared by the engine's fallback paths

pub mod embedding;
pub mod error;
pub mod summarizer;

// Re-export commonly used types
pub use embedding::{EmbeddingCache, EmbeddingProvider, OpenAIEmbedding};
pub use error::{CapabilityError, Result};
pub use summarizer::{
    OpenAISummarizer, Summarizer, SummarySections, key_points_excerpt, parse_sections,
};
