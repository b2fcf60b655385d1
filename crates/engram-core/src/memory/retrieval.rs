//! Contextual retrieval.
//!
//! A query is embedded, compared against every cached memory embedding,
//! and the best matches come back in two tiers: memories similar to the
//! query itself, and memories connected to those through the persisted
//! similarity graph. Retrieval is a pure read path except for the
//! opportunistic embedding backfill it shares with graph construction.

use engram_ai::{EmbeddingCache, EmbeddingProvider};

use super::graph::{cosine_similarity, ensure_embeddings};
use crate::error::Result;
use crate::models::Memory;
use crate::store::MemoryStore;

const SIMILARITY_WEIGHT: f32 = 0.6;
const TEMPORAL_WEIGHT: f32 = 0.2;
const IMPORTANCE_WEIGHT: f32 = 0.2;
const TEMPORAL_HALF_LIFE_DAYS: f32 = 30.0;
const DAY_MS: f32 = 24.0 * 60.0 * 60.0 * 1000.0;

/// A memory with its similarity to the query (primary results) or the
/// weight of the edge that pulled it in (connected results).
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub similarity: f32,
}

/// A memory ranked by the weighted relevance blend.
#[derive(Debug, Clone)]
pub struct RankedMemory {
    pub memory: Memory,
    pub relevance: f32,
}

/// Result of a contextual query.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Top matches by cosine similarity, descending
    pub similar: Vec<ScoredMemory>,
    /// Graph neighbors of the top matches, by edge weight descending
    pub connected: Vec<ScoredMemory>,
}

/// Ranks memories against queries.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalEngine {
    threshold: f32,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(threshold: f32, top_k: usize) -> Self {
        Self { threshold, top_k }
    }

    async fn query_embedding(
        &self,
        text: &str,
        embedder: &dyn EmbeddingProvider,
        cache: Option<&EmbeddingCache>,
    ) -> Result<Vec<f32>> {
        if let Some(cached) = cache.and_then(|c| c.get(text, embedder.model_name())) {
            return Ok(cached);
        }
        let vector = embedder.embed(text).await?;
        if let Some(cache) = cache {
            cache.put(text, embedder.model_name(), vector.clone());
        }
        Ok(vector)
    }

    /// Run a contextual query: top-K similar memories above the threshold,
    /// expanded one hop through the persisted graph.
    pub async fn query(
        &self,
        text: &str,
        project_id: &str,
        store: &MemoryStore,
        embedder: &dyn EmbeddingProvider,
        cache: Option<&EmbeddingCache>,
    ) -> Result<QueryResult> {
        let query_vector = self.query_embedding(text, embedder, cache).await?;

        let mut memories = store.get_all_memories(project_id)?;
        ensure_embeddings(&mut memories, store, embedder).await?;

        let mut scored: Vec<ScoredMemory> = memories
            .into_iter()
            .filter_map(|memory| {
                let embedding = memory.metadata.embedding.as_deref()?;
                let similarity = cosine_similarity(&query_vector, embedding);
                Some(ScoredMemory { memory, similarity })
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let similar: Vec<ScoredMemory> = scored
            .iter()
            .filter(|s| s.similarity >= self.threshold)
            .take(self.top_k)
            .cloned()
            .collect();

        let similar_ids: Vec<&str> = similar.iter().map(|s| s.memory.id.as_str()).collect();
        let edges = store.get_edges(project_id)?;

        let mut connected: Vec<ScoredMemory> = Vec::new();
        for hit in &similar {
            for edge in &edges {
                if edge.weight < self.threshold {
                    continue;
                }
                let Some(neighbor_id) = edge.other_endpoint(&hit.memory.id) else {
                    continue;
                };
                if similar_ids.contains(&neighbor_id)
                    || connected.iter().any(|c| c.memory.id == neighbor_id)
                {
                    continue;
                }
                if let Some(neighbor) = scored.iter().find(|s| s.memory.id == neighbor_id) {
                    connected.push(ScoredMemory {
                        memory: neighbor.memory.clone(),
                        similarity: edge.weight,
                    });
                }
            }
        }
        connected.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        tracing::debug!(
            project_id,
            similar = similar.len(),
            connected = connected.len(),
            "contextual query finished"
        );
        Ok(QueryResult { similar, connected })
    }

    /// Rank a project's memories by the weighted blend of query similarity,
    /// recency, and importance. Unlike `query`, this always returns up to
    /// `limit` results regardless of the similarity threshold.
    pub async fn rank_relevant(
        &self,
        text: &str,
        project_id: &str,
        limit: usize,
        store: &MemoryStore,
        embedder: &dyn EmbeddingProvider,
        cache: Option<&EmbeddingCache>,
    ) -> Result<Vec<RankedMemory>> {
        let query_vector = self.query_embedding(text, embedder, cache).await?;
        let now = engram_storage::time_utils::now_ms();

        let mut memories = store.get_all_memories(project_id)?;
        ensure_embeddings(&mut memories, store, embedder).await?;

        let mut ranked: Vec<RankedMemory> = memories
            .into_iter()
            .filter_map(|memory| {
                let embedding = memory.metadata.embedding.as_deref()?;
                let similarity = cosine_similarity(&query_vector, embedding);
                let age_days = ((now - memory.created_at).max(0) as f32) / DAY_MS;
                let temporal = (-age_days / TEMPORAL_HALF_LIFE_DAYS).exp();
                let importance = memory.importance as f32 / 10.0;
                let relevance = similarity * SIMILARITY_WEIGHT
                    + temporal * TEMPORAL_WEIGHT
                    + importance * IMPORTANCE_WEIGHT;
                Some(RankedMemory { memory, relevance })
            })
            .collect();
        ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        ranked.truncate(limit);
        Ok(ranked)
    }
}
