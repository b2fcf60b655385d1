//! Engram Storage - Low-level storage abstraction layer
//!
//! This crate provides the persistence layer for Engram, using redb as the
//! embedded database. It exposes byte-level APIs to avoid circular
//! dependencies with the engine crate's models.
//!
//! # Architecture
//!
//! The storage layer uses a simple key-value design with separate tables for
//! different entity types. Higher-level type wrappers are provided by the
//! engram-core crate.
//!
//! # Tables
//!
//! - `memories` / `memory_project_index` - Persisted memory records
//! - `graph_edges` - Per-project similarity graph edge sets
//! - `projects` - Project records

pub mod graph;
pub mod memory;
pub mod project;
pub mod time_utils;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use graph::GraphStorage;
pub use memory::MemoryStorage;
pub use project::ProjectStorage;

/// Central storage manager that initializes all storage subsystems
pub struct Storage {
    db: Arc<Database>,
    pub memories: MemoryStorage,
    pub edges: GraphStorage,
    pub projects: ProjectStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and initialize
    /// all required tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);
        Self::with_db(db)
    }

    /// Create a storage instance over an already-open database.
    pub fn with_db(db: Arc<Database>) -> Result<Self> {
        let memories = MemoryStorage::new(db.clone())?;
        let edges = GraphStorage::new(db.clone())?;
        let projects = ProjectStorage::new(db.clone())?;

        Ok(Self {
            db,
            memories,
            edges,
            projects,
        })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
