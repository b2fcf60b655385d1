//! Error types for the engine

use engram_ai::CapabilityError;
use thiserror::Error;

/// Engine error types.
///
/// Capability failures mostly never surface here: the compression and
/// graph paths degrade to deterministic fallbacks instead. What does
/// surface is persistence trouble and caller mistakes.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("memory not found: {0}")]
    MemoryNotFound(String),

    #[error("raw memories are immutable: {0}")]
    RawMemoryImmutable(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
