//! The engine facade.
//!
//! `MemoryEngine` owns the typed store, the external capabilities, and one
//! in-memory buffer per project. Ingestion and compression are serialized
//! per project by holding that project's buffer lock for the whole cycle;
//! operations on different projects run fully in parallel.
//!
//! Durability rules: the raw memory is persisted before the buffer ever
//! sees it, so a failed compression never drops user content, and
//! ingestion succeeds even when every downstream capability degrades to
//! its fallback. State transitions (buffer removal, edge replacement)
//! commit only after the corresponding external call and persistence
//! succeed.

use std::sync::Arc;

use dashmap::DashMap;
use engram_ai::{EmbeddingCache, EmbeddingProvider, Summarizer};
use engram_storage::{Storage, time_utils};
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::memory::{
    BufferEntry, CompressionOrchestrator, CompressionOutcome, ImportanceScorer, QueryResult,
    RankedMemory, RetrievalEngine, ShortTermBuffer, SimilarityGraphBuilder,
    SlidingWindowProcessor, TokenEstimator,
};
use crate::models::{GraphEdge, Memory, MemoryKind, Project};
use crate::store::MemoryStore;

/// Result of an explicit compression run.
#[derive(Debug, Default)]
pub struct CompressionReport {
    /// Outcomes of the cycles that ran, in order
    pub produced: Vec<CompressionOutcome>,
    /// True when the pass cap was hit with the buffer still over threshold
    pub backlog: bool,
}

/// Per-project mutable state. Created on first use, never persisted,
/// discarded on shutdown or project deletion.
#[derive(Default)]
struct ProjectState {
    buffer: Mutex<ShortTermBuffer>,
}

/// The embedded entry point: ingest, query, compress, rebuild.
#[derive(Clone)]
pub struct MemoryEngine {
    store: MemoryStore,
    summarizer: Arc<dyn Summarizer>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: EngineConfig,
    scorer: ImportanceScorer,
    orchestrator: CompressionOrchestrator,
    graph: SimilarityGraphBuilder,
    retrieval: RetrievalEngine,
    window: SlidingWindowProcessor,
    cache: Arc<EmbeddingCache>,
    projects: Arc<DashMap<String, Arc<ProjectState>>>,
}

impl MemoryEngine {
    pub fn new(
        storage: Storage,
        summarizer: Arc<dyn Summarizer>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let estimator = TokenEstimator::new(config.chars_per_token);
        Ok(Self {
            store: MemoryStore::new(storage),
            summarizer,
            embedder,
            orchestrator: CompressionOrchestrator::new(config.clone()),
            graph: SimilarityGraphBuilder::new(config.similarity_threshold),
            retrieval: RetrievalEngine::new(config.similarity_threshold, config.top_k),
            window: SlidingWindowProcessor::new(estimator, config.context_window_tokens),
            cache: Arc::new(EmbeddingCache::new(config.embedding_cache_entries)),
            scorer: ImportanceScorer,
            config,
            projects: Arc::new(DashMap::new()),
        })
    }

    /// Direct access to the typed store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn project_state(&self, project_id: &str) -> Arc<ProjectState> {
        self.projects
            .entry(project_id.to_string())
            .or_default()
            .clone()
    }

    fn require_project(&self, project_id: &str) -> Result<Project> {
        self.store
            .get_project(project_id)?
            .ok_or_else(|| EngineError::ProjectNotFound(project_id.to_string()))
    }

    // ============== Ingestion ==============

    /// Ingest captured content into a project.
    pub async fn ingest(&self, content: &str, project_id: &str) -> Result<Memory> {
        self.ingest_with_context(content, None, project_id).await
    }

    /// Ingest captured content with an optional context footer (page
    /// title, source URL, and the like).
    ///
    /// The raw memory is persisted immediately; buffering and the
    /// threshold-triggered compression happen after, and a compression
    /// failure is retried on the next trigger rather than surfaced here.
    pub async fn ingest_with_context(
        &self,
        content: &str,
        context: Option<&str>,
        project_id: &str,
    ) -> Result<Memory> {
        self.require_project(project_id)?;

        let state = self.project_state(project_id);
        let mut buffer = state.buffer.lock().await;

        let existing = self.store.get_all_memories(project_id)?;
        let bodies: Vec<&str> = existing.iter().map(|m| m.body()).collect();
        let score = self.scorer.score(content, &bodies);

        let now = time_utils::now_ms();
        let composed = Memory::compose_content(content, now, context);
        let memory = Memory::new(project_id, composed)
            .with_importance(score.score)
            .with_created_at(now);
        self.store.add_memory(&memory)?;

        let len = buffer.push(BufferEntry {
            content: memory.content.clone(),
            created_at: memory.created_at,
            project_id: project_id.to_string(),
            importance: memory.importance,
            raw_id: Some(memory.id.clone()),
        });
        tracing::debug!(project_id, buffer_len = len, importance = memory.importance, "ingested memory");

        if len >= self.config.short_term_limit {
            // The buffer lock is already held, so this cycle is the only
            // one in flight for the project. A store failure here leaves
            // the entries buffered for the next trigger; the raw memory is
            // already durable.
            if let Err(err) = self.drain_buffer(project_id, &mut buffer).await {
                tracing::error!(
                    project_id,
                    error = %err,
                    "compression failed during ingestion; entries retained for retry"
                );
            }
        }

        Ok(memory)
    }

    /// Run compression cycles until the buffer drops below threshold or
    /// the pass cap is hit.
    async fn drain_buffer(
        &self,
        project_id: &str,
        buffer: &mut ShortTermBuffer,
    ) -> Result<CompressionReport> {
        let mut report = CompressionReport::default();

        while buffer.len() >= self.config.short_term_limit {
            if report.produced.len() >= self.config.max_compression_passes {
                report.backlog = true;
                tracing::warn!(
                    project_id,
                    remaining = buffer.len(),
                    passes = report.produced.len(),
                    "compression backlog: pass cap hit with buffer still over threshold"
                );
                break;
            }
            match self
                .orchestrator
                .compress_once(project_id, buffer, &self.store, self.summarizer.as_ref())
                .await?
            {
                Some(outcome) => report.produced.push(outcome),
                None => break,
            }
        }

        Ok(report)
    }

    // ============== Compression ==============

    /// Explicitly compress a project's pending buffer. Runs at least one
    /// cycle when anything is buffered, then keeps draining while the
    /// buffer stays at or over threshold.
    pub async fn compress_project(&self, project_id: &str) -> Result<CompressionReport> {
        let state = self.project_state(project_id);
        let mut buffer = state.buffer.lock().await;

        if buffer.is_empty() {
            return Ok(CompressionReport::default());
        }

        let mut report = CompressionReport::default();
        if let Some(outcome) = self
            .orchestrator
            .compress_once(project_id, &mut buffer, &self.store, self.summarizer.as_ref())
            .await?
        {
            report.produced.push(outcome);
        }
        let mut rest = self.drain_buffer(project_id, &mut buffer).await?;
        report.produced.append(&mut rest.produced);
        report.backlog = rest.backlog;
        Ok(report)
    }

    /// Number of entries currently buffered for a project.
    pub async fn buffer_len(&self, project_id: &str) -> usize {
        let state = self.project_state(project_id);
        let buffer = state.buffer.lock().await;
        buffer.len()
    }

    /// Reprocess a project's raw memories through the density-aware
    /// sliding window, persisting one compressed memory per window.
    pub async fn reprocess_project(&self, project_id: &str) -> Result<Vec<Memory>> {
        self.require_project(project_id)?;
        let raw: Vec<Memory> = self
            .store
            .get_all_memories(project_id)?
            .into_iter()
            .filter(|m| m.kind == MemoryKind::Raw)
            .collect();
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        self.window
            .process(project_id, &raw, &self.store, self.summarizer.as_ref())
            .await
    }

    /// Synthesize a root memory covering the whole project.
    pub async fn form_root_memory(&self, project_id: &str) -> Result<Option<Memory>> {
        self.require_project(project_id)?;
        self.orchestrator
            .form_root(project_id, &self.store, self.summarizer.as_ref())
            .await
    }

    /// Regenerate a compressed or root memory in place. The memory keeps
    /// its identity; the previous content is retained for audit and the
    /// embedding is dropped for backfill.
    pub async fn rewrite_memory(&self, memory_id: &str) -> Result<Memory> {
        let mut memory = self
            .store
            .get_memory(memory_id)?
            .ok_or_else(|| EngineError::MemoryNotFound(memory_id.to_string()))?;
        if memory.kind == MemoryKind::Raw {
            return Err(EngineError::RawMemoryImmutable(memory_id.to_string()));
        }

        let prompt = CompressionOrchestrator::rewrite_prompt(&memory.content);
        let reply = self.summarizer.summarize(&prompt).await?;
        let content = CompressionOrchestrator::render_rewritten(
            &reply,
            memory.kind,
            &memory.metadata.source_ids,
            memory.metadata.prior_id.as_deref(),
        );

        memory.rewrite(content);
        self.store.update_memory(&memory)?;
        tracing::info!(memory_id, "rewrote memory");
        Ok(memory)
    }

    // ============== Retrieval ==============

    /// Contextual query: top-K similar memories plus graph-connected
    /// secondary context, both similarity-descending.
    pub async fn query(&self, text: &str, project_id: &str) -> Result<QueryResult> {
        self.require_project(project_id)?;
        self.retrieval
            .query(
                text,
                project_id,
                &self.store,
                self.embedder.as_ref(),
                Some(self.cache.as_ref()),
            )
            .await
    }

    /// Rank memories by the weighted blend of similarity, recency, and
    /// importance.
    pub async fn rank_relevant(
        &self,
        text: &str,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<RankedMemory>> {
        self.require_project(project_id)?;
        self.retrieval
            .rank_relevant(
                text,
                project_id,
                limit,
                &self.store,
                self.embedder.as_ref(),
                Some(self.cache.as_ref()),
            )
            .await
    }

    /// Render query results as a context block for prompt enhancement.
    /// Empty string when nothing relevant is stored.
    pub async fn context_block(&self, text: &str, project_id: &str) -> Result<String> {
        let result = self.query(text, project_id).await?;
        let hits: Vec<&crate::memory::ScoredMemory> =
            result.similar.iter().chain(result.connected.iter()).collect();
        if hits.is_empty() {
            return Ok(String::new());
        }

        let mut block = String::from("Context from your saved memories:\n\n");
        for hit in hits {
            block.push_str(&format!("[Memory {}]: {}\n\n", hit.memory.id, hit.memory.body()));
        }
        Ok(block.trim_end().to_string())
    }

    // ============== Graph ==============

    /// Rebuild a project's similarity graph from scratch.
    pub async fn rebuild_graph(&self, project_id: &str) -> Result<Vec<GraphEdge>> {
        self.require_project(project_id)?;
        self.graph
            .build(project_id, &self.store, self.embedder.as_ref())
            .await
    }

    /// Current persisted edge set for a project.
    pub fn get_edges(&self, project_id: &str) -> Result<Vec<GraphEdge>> {
        Ok(self.store.get_edges(project_id)?)
    }

    // ============== Memories & projects ==============

    /// All memories of a project in ingestion order.
    pub fn get_all_memories(&self, project_id: &str) -> Result<Vec<Memory>> {
        Ok(self.store.get_all_memories(project_id)?)
    }

    /// Delete a memory, cascading its graph edges.
    pub fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        Ok(self.store.delete_memory(memory_id)?)
    }

    /// Create a project.
    pub fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let mut project = Project::new(name);
        if let Some(description) = description {
            project = project.with_description(description);
        }
        self.store.add_project(&project)?;
        tracing::info!(project_id = %project.id, name, "created project");
        Ok(project)
    }

    /// Get a project by ID.
    pub fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        Ok(self.store.get_project(project_id)?)
    }

    /// List all projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.store.list_projects()?)
    }

    /// Delete a project, cascading memories, edges, and buffer state.
    pub fn delete_project(&self, project_id: &str) -> Result<bool> {
        self.projects.remove(project_id);
        Ok(self.store.delete_project(project_id)?)
    }
}
