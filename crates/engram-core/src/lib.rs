//! Engram Core - semantic compression and retrieval engine
//!
//! This crate provides:
//! - Per-project short-term buffering with eviction-by-compression
//! - Token-budget-aware chunking with a natural-boundary ladder
//! - Recursive compression orchestration with deterministic fallback
//! - Importance scoring from uniqueness and length
//! - Density-aware sliding-window batch reprocessing
//! - Embedding-based similarity graph construction and contextual retrieval
//!
//! The engine is an embedded library boundary: callers hand it captured
//! text and queries, it talks to the external summarize/embed capabilities
//! and the embedded store.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{CompressionReport, MemoryEngine};
pub use error::{EngineError, Result};
pub use memory::{
    BufferEntry, Chunker, CompressionOrchestrator, CompressionOutcome, FALLBACK_MARKER,
    ImportanceScore, ImportanceScorer, MemoryWindow, QueryResult, RankedMemory, RetrievalEngine,
    ScoredMemory, ShortTermBuffer, SimilarityGraphBuilder, SlidingWindowProcessor, TokenEstimator,
    cosine_similarity,
};
pub use models::{EdgeKind, GraphEdge, Memory, MemoryKind, MemoryMetadata, Project};
pub use store::MemoryStore;
