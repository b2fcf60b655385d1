//! The compression and retrieval engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Memory Engine                          │
//! │                                                              │
//! │  ingest ──► ShortTermBuffer ──► CompressionOrchestrator      │
//! │                │ (threshold)        │        ▲               │
//! │                │                Chunker  TokenEstimator      │
//! │                ▼                    │                        │
//! │         ImportanceScorer      Summarize (external)           │
//! │                                     │                        │
//! │                                     ▼                        │
//! │                            persisted memories                │
//! │                                     │                        │
//! │  query ──► RetrievalEngine ◄── SimilarityGraphBuilder        │
//! │                 │                   ▲                        │
//! │                 └──── Embed (external)                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `SlidingWindowProcessor` runs the same compression core over large
//! already-materialized memory sets, outside the live buffer path.

pub mod buffer;
pub mod chunker;
pub mod compress;
pub mod graph;
pub mod retrieval;
pub mod scoring;
pub mod token;
pub mod window;

pub use buffer::{BufferEntry, ShortTermBuffer};
pub use chunker::Chunker;
pub use compress::{CompressionOrchestrator, CompressionOutcome, FALLBACK_MARKER};
pub use graph::{SimilarityGraphBuilder, cosine_similarity};
pub use retrieval::{QueryResult, RankedMemory, RetrievalEngine, ScoredMemory};
pub use scoring::{ImportanceScore, ImportanceScorer};
pub use token::TokenEstimator;
pub use window::{MemoryWindow, SlidingWindowProcessor};
