//! Typed store wrapper.
//!
//! Provides type-safe access to persistence by wrapping the byte-level APIs
//! from engram-storage with the models from this crate. Records are
//! serialized as JSON. This is the only durable, cross-restart state the
//! engine touches; the short-term buffer lives in memory only.

use std::sync::Arc;

use anyhow::Result;
use engram_storage::{Storage, time_utils};

use crate::models::{GraphEdge, Memory, MemoryKind, Project};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Typed wrapper around engram-storage.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Storage>,
}

impl MemoryStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    // ============== Memory Operations ==============

    /// Persist a memory record (insert or overwrite).
    pub fn add_memory(&self, memory: &Memory) -> Result<()> {
        let bytes = serde_json::to_vec(memory)?;
        self.inner
            .memories
            .put_memory_raw(&memory.id, &memory.project_id, &bytes)
    }

    /// Update an existing memory record. Same write path as `add_memory`;
    /// the distinction exists for readability at call sites.
    pub fn update_memory(&self, memory: &Memory) -> Result<()> {
        self.add_memory(memory)
    }

    /// Get a memory by ID
    pub fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>> {
        if let Some(bytes) = self.inner.memories.get_memory_raw(memory_id)? {
            Ok(Some(serde_json::from_slice(&bytes)?))
        } else {
            Ok(None)
        }
    }

    /// List all memories for a project in ingestion (timestamp) order.
    pub fn get_all_memories(&self, project_id: &str) -> Result<Vec<Memory>> {
        let records = self.inner.memories.list_memories_by_project_raw(project_id)?;
        let mut memories = Vec::with_capacity(records.len());
        for (_, bytes) in records {
            let memory: Memory = serde_json::from_slice(&bytes)?;
            memories.push(memory);
        }
        memories.sort_by_key(|m| m.created_at);
        Ok(memories)
    }

    /// Most recently compressed memory within a trailing time window.
    pub fn get_recent_compressed(
        &self,
        project_id: &str,
        window_hours: i64,
    ) -> Result<Option<Memory>> {
        let cutoff = time_utils::now_ms() - window_hours * HOUR_MS;
        let memories = self.get_all_memories(project_id)?;
        Ok(memories
            .into_iter()
            .filter(|m| m.kind == MemoryKind::Compressed && m.created_at >= cutoff)
            .max_by_key(|m| m.created_at))
    }

    /// Delete a memory and any graph edges touching it.
    pub fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        let Some(memory) = self.get_memory(memory_id)? else {
            return Ok(false);
        };

        let existed = self
            .inner
            .memories
            .delete_memory(memory_id, &memory.project_id)?;

        let edges = self.get_edges(&memory.project_id)?;
        if edges.iter().any(|e| e.touches(memory_id)) {
            let retained: Vec<GraphEdge> = edges
                .into_iter()
                .filter(|e| !e.touches(memory_id))
                .collect();
            self.replace_edges(&memory.project_id, &retained)?;
        }

        Ok(existed)
    }

    /// Count memories for a project
    pub fn count_memories(&self, project_id: &str) -> Result<u32> {
        self.inner.memories.count_by_project(project_id)
    }

    // ============== Graph Operations ==============

    /// Replace a project's entire edge set atomically.
    pub fn replace_edges(&self, project_id: &str, edges: &[GraphEdge]) -> Result<()> {
        let bytes = serde_json::to_vec(edges)?;
        self.inner.edges.replace_edges_raw(project_id, &bytes)
    }

    /// Get a project's edge set (empty if never built).
    pub fn get_edges(&self, project_id: &str) -> Result<Vec<GraphEdge>> {
        if let Some(bytes) = self.inner.edges.get_edges_raw(project_id)? {
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            Ok(Vec::new())
        }
    }

    // ============== Project Operations ==============

    /// Persist a project record.
    pub fn add_project(&self, project: &Project) -> Result<()> {
        let bytes = serde_json::to_vec(project)?;
        self.inner.projects.put_project_raw(&project.id, &bytes)
    }

    /// Get a project by ID
    pub fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        if let Some(bytes) = self.inner.projects.get_project_raw(project_id)? {
            Ok(Some(serde_json::from_slice(&bytes)?))
        } else {
            Ok(None)
        }
    }

    /// List all projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let records = self.inner.projects.list_projects_raw()?;
        let mut projects = Vec::with_capacity(records.len());
        for (_, bytes) in records {
            let project: Project = serde_json::from_slice(&bytes)?;
            projects.push(project);
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    /// Delete a project, cascading to its memories and edge set.
    pub fn delete_project(&self, project_id: &str) -> Result<bool> {
        let removed_memories = self.inner.memories.delete_all_for_project(project_id)?;
        self.inner.edges.delete_edges(project_id)?;
        let existed = self.inner.projects.delete_project(project_id)?;

        if existed {
            tracing::info!(
                project_id,
                removed_memories,
                "deleted project with cascade"
            );
        }
        Ok(existed)
    }
}
