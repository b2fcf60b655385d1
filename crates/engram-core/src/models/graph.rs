//! Similarity graph edge model.
//!
//! Edges are derived data: fully recomputable from memory embeddings, and
//! replaced wholesale whenever a project's memory set changes.

use serde::{Deserialize, Serialize};

/// Kind of relation an edge encodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Embedding cosine similarity above the configured threshold
    #[default]
    Semantic,
}

/// A weighted edge between two memories of the same project.
///
/// Undirected in meaning; stored with a single direction. Weight is the
/// cosine similarity of the endpoint embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub project_id: String,
    pub source_id: String,
    pub target_id: String,
    pub weight: f32,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn semantic(
        project_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        weight: f32,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            weight,
            kind: EdgeKind::Semantic,
        }
    }

    /// True if the edge touches the given memory.
    pub fn touches(&self, memory_id: &str) -> bool {
        self.source_id == memory_id || self.target_id == memory_id
    }

    /// The endpoint opposite to the given memory, if the edge touches it.
    pub fn other_endpoint(&self, memory_id: &str) -> Option<&str> {
        if self.source_id == memory_id {
            Some(&self.target_id)
        } else if self.target_id == memory_id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}
