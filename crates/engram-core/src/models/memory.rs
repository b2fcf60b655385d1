//! Memory models for the accumulator.
//!
//! A memory is one stored unit of captured content. Raw memories arrive
//! through ingestion; compressed and root memories are produced by the
//! compression paths. All persistence is per-project.
//!
//! # Lifecycle
//!
//! ```text
//! ingestion ──► Raw ──┐
//!                     ├──► compression ──► Compressed ──► synthesis ──► Root
//! ingestion ──► Raw ──┘
//! ```
//!
//! Raw memories are immutable after creation except for embedding backfill.
//! Compressed and root memories may be rewritten in place; identity is
//! retained and the previous content is kept for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a stored memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Captured content as ingested
    #[default]
    Raw,
    /// Product of a compression cycle over raw/compressed memories
    Compressed,
    /// Whole-project synthesis; always importance 10
    Root,
}

/// Structured extension data attached to a memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MemoryMetadata {
    /// Vector embedding for semantic similarity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Model used to generate the embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// How many source entries a compressed/root memory subsumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_count: Option<u32>,

    /// IDs of the raw/compressed memories folded into this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ids: Vec<String>,

    /// ID of the prior compressed memory folded into a compression cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_id: Option<String>,

    /// Whether this memory's content has been regenerated
    #[serde(default)]
    pub rewritten: bool,

    /// Content before the most recent rewrite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
}

/// A stored unit of captured or synthesized content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// Unique identifier, stable across updates
    pub id: String,

    /// Owning project; all operations are scoped per-project
    pub project_id: String,

    /// Rendered content: timestamp header, body, optional context footer
    pub content: String,

    /// Raw, compressed, or root
    pub kind: MemoryKind,

    /// Importance rating 1-10 (informational/ordering signal)
    pub importance: u8,

    /// Unix timestamp in milliseconds; ingestion order key
    pub created_at: i64,

    /// SHA-256 hash of content
    pub content_hash: String,

    #[serde(default)]
    pub metadata: MemoryMetadata,
}

impl Memory {
    /// Create a new raw memory with rendered content.
    pub fn new(project_id: impl Into<String>, content: impl Into<String>) -> Self {
        use engram_storage::time_utils;
        use sha2::{Digest, Sha256};

        let content = content.into();
        let id = format!("mem-{}", uuid::Uuid::new_v4());
        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
        let created_at = time_utils::now_ms();

        Self {
            id,
            project_id: project_id.into(),
            content,
            kind: MemoryKind::Raw,
            importance: 5,
            created_at,
            content_hash,
            metadata: MemoryMetadata::default(),
        }
    }

    /// Create a memory with a specific ID (for deserialization/testing)
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the memory kind
    #[must_use]
    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        if kind == MemoryKind::Root {
            self.importance = 10;
        }
        self
    }

    /// Set the importance rating, clamped to 1-10
    #[must_use]
    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.clamp(1, 10);
        self
    }

    /// Set the created_at timestamp
    #[must_use]
    pub fn with_created_at(mut self, timestamp: i64) -> Self {
        self.created_at = timestamp;
        self
    }

    /// Attach an embedding
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>, model: impl Into<String>) -> Self {
        self.metadata.embedding = Some(embedding);
        self.metadata.embedding_model = Some(model.into());
        self
    }

    /// Set provenance metadata for a compressed/root memory
    #[must_use]
    pub fn with_sources(mut self, source_ids: Vec<String>, prior_id: Option<String>) -> Self {
        self.metadata.source_count = Some(source_ids.len() as u32);
        self.metadata.source_ids = source_ids;
        self.metadata.prior_id = prior_id;
        self
    }

    /// Check if this memory has an embedding
    #[must_use]
    pub fn has_embedding(&self) -> bool {
        self.metadata.embedding.is_some()
    }

    /// Replace the content, keeping the old content for audit and
    /// refreshing the hash. Only meaningful for compressed/root memories.
    pub fn rewrite(&mut self, new_content: String) {
        use sha2::{Digest, Sha256};

        self.metadata.original_content = Some(std::mem::replace(&mut self.content, new_content));
        self.metadata.rewritten = true;
        self.content_hash = hex::encode(Sha256::digest(self.content.as_bytes()));
        // Embedding no longer matches the content; drop it for backfill.
        self.metadata.embedding = None;
        self.metadata.embedding_model = None;
    }

    /// Render captured text with a timestamp header and optional context
    /// footer, as stored in raw memory content.
    pub fn compose_content(body: &str, captured_at_ms: i64, context: Option<&str>) -> String {
        let when = DateTime::<Utc>::from_timestamp_millis(captured_at_ms)
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d %H:%M UTC");
        match context {
            Some(ctx) if !ctx.trim().is_empty() => {
                format!("[captured {when}]\n{body}\n\nContext: {}", ctx.trim())
            }
            _ => format!("[captured {when}]\n{body}"),
        }
    }

    /// Content without the timestamp header or context footer, for prompt
    /// assembly.
    pub fn body(&self) -> &str {
        Self::strip_decorations(&self.content)
    }

    /// Strip the rendered header line and context footer from content.
    pub fn strip_decorations(content: &str) -> &str {
        let without_header = match content.strip_prefix("[captured ") {
            Some(rest) => rest.split_once('\n').map(|(_, body)| body).unwrap_or(""),
            None => content,
        };
        match without_header.rfind("\n\nContext: ") {
            Some(pos) => &without_header[..pos],
            None => without_header,
        }
    }
}
