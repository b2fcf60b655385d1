//! Similarity graph construction.
//!
//! Embeddings are backfilled for any memory missing one, then every
//! unordered pair is compared with cosine similarity and pairs at or above
//! the threshold become edges. The pass is intentionally O(n^2): per-project
//! memory counts stay small in normal use. An implementation targeting much
//! larger corpora would need an approximate nearest-neighbor index instead.
//!
//! The persisted edge set is replaced wholesale on every rebuild, so a
//! concurrent reader sees either the previous graph or the new one.

use engram_ai::EmbeddingProvider;

use crate::error::Result;
use crate::models::{GraphEdge, Memory};
use crate::store::MemoryStore;

/// Cosine similarity of two vectors: dot(a,b) / (|a| * |b|).
///
/// Returns 0 for mismatched dimensions or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Ensure every memory in the list has a persisted embedding.
///
/// Idempotent: memories that already carry one are skipped. A capability
/// failure for a single memory is logged and skipped; it simply contributes
/// no edges this cycle.
pub(crate) async fn ensure_embeddings(
    memories: &mut [Memory],
    store: &MemoryStore,
    embedder: &dyn EmbeddingProvider,
) -> Result<()> {
    for memory in memories.iter_mut() {
        if memory.has_embedding() {
            continue;
        }
        match embedder.embed(memory.body()).await {
            Ok(vector) => {
                memory.metadata.embedding = Some(vector);
                memory.metadata.embedding_model = Some(embedder.model_name().to_string());
                store.update_memory(memory)?;
            }
            Err(err) => {
                tracing::warn!(
                    memory_id = %memory.id,
                    error = %err,
                    "embedding backfill failed, skipping memory this cycle"
                );
            }
        }
    }
    Ok(())
}

/// Builds the weighted similarity graph for a project.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityGraphBuilder {
    threshold: f32,
}

impl SimilarityGraphBuilder {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Rebuild a project's graph from scratch and persist it, replacing the
    /// previous edge set entirely.
    pub async fn build(
        &self,
        project_id: &str,
        store: &MemoryStore,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<GraphEdge>> {
        let mut memories = store.get_all_memories(project_id)?;
        ensure_embeddings(&mut memories, store, embedder).await?;

        let edges = self.edges_for(project_id, &memories);
        store.replace_edges(project_id, &edges)?;

        tracing::info!(
            project_id,
            memories = memories.len(),
            edges = edges.len(),
            "rebuilt similarity graph"
        );
        Ok(edges)
    }

    /// Pure edge computation over memories that carry embeddings.
    pub fn edges_for(&self, project_id: &str, memories: &[Memory]) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = Vec::new();
        for i in 0..memories.len() {
            let Some(a) = memories[i].metadata.embedding.as_deref() else {
                continue;
            };
            for j in (i + 1)..memories.len() {
                let Some(b) = memories[j].metadata.embedding.as_deref() else {
                    continue;
                };
                let weight = cosine_similarity(a, b);
                if weight >= self.threshold {
                    edges.push(GraphEdge::semantic(
                        project_id,
                        &memories[i].id,
                        &memories[j].id,
                        weight,
                    ));
                }
            }
        }
        dedup_highest_weight(edges)
    }
}

/// Keep the highest-weight edge per unordered endpoint pair.
fn dedup_highest_weight(edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let mut best: Vec<GraphEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        let existing = best.iter_mut().find(|e| {
            (e.source_id == edge.source_id && e.target_id == edge.target_id)
                || (e.source_id == edge.target_id && e.target_id == edge.source_id)
        });
        match existing {
            Some(kept) => {
                if edge.weight > kept.weight {
                    *kept = edge;
                }
            }
            None => best.push(edge),
        }
    }
    best
}
