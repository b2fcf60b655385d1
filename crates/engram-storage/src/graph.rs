//! Graph edge storage - byte-level API for similarity graph persistence.
//!
//! The whole edge set of a project is stored as one record, so replacing it
//! is a single insert inside one transaction. Readers either see the old
//! set or the new one, never a partially written graph.
//!
//! # Tables
//!
//! - `graph_edges`: project_id -> serialized edge set

use anyhow::Result;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::sync::Arc;

const EDGE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("graph_edges");

/// Low-level graph edge storage with byte-level API
#[derive(Clone)]
pub struct GraphStorage {
    db: Arc<Database>,
}

impl GraphStorage {
    /// Create a new GraphStorage instance
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(EDGE_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Replace a project's entire edge set with the given serialized bytes.
    pub fn replace_edges_raw(&self, project_id: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(EDGE_TABLE)?;
            table.insert(project_id, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a project's serialized edge set, if any has been stored.
    pub fn get_edges_raw(&self, project_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EDGE_TABLE)?;

        if let Some(value) = table.get(project_id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Delete a project's edge set entirely.
    pub fn delete_edges(&self, project_id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(EDGE_TABLE)?;
            table.remove(project_id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_storage() -> GraphStorage {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        GraphStorage::new(db).unwrap()
    }

    #[test]
    fn test_replace_and_get_edges() {
        let storage = create_test_storage();

        storage.replace_edges_raw("proj-001", b"edge set v1").unwrap();
        let edges = storage.get_edges_raw("proj-001").unwrap();
        assert_eq!(edges.unwrap(), b"edge set v1");
    }

    #[test]
    fn test_replace_overwrites_previous_set() {
        let storage = create_test_storage();

        storage.replace_edges_raw("proj-001", b"edge set v1").unwrap();
        storage.replace_edges_raw("proj-001", b"edge set v2").unwrap();

        let edges = storage.get_edges_raw("proj-001").unwrap();
        assert_eq!(edges.unwrap(), b"edge set v2");
    }

    #[test]
    fn test_get_edges_for_unknown_project() {
        let storage = create_test_storage();
        assert!(storage.get_edges_raw("proj-missing").unwrap().is_none());
    }

    #[test]
    fn test_delete_edges() {
        let storage = create_test_storage();

        storage.replace_edges_raw("proj-001", b"edges").unwrap();
        assert!(storage.delete_edges("proj-001").unwrap());
        assert!(storage.get_edges_raw("proj-001").unwrap().is_none());
        assert!(!storage.delete_edges("proj-001").unwrap());
    }

    #[test]
    fn test_projects_are_isolated() {
        let storage = create_test_storage();

        storage.replace_edges_raw("proj-001", b"first").unwrap();
        storage.replace_edges_raw("proj-002", b"second").unwrap();
        storage.delete_edges("proj-001").unwrap();

        assert!(storage.get_edges_raw("proj-001").unwrap().is_none());
        assert_eq!(storage.get_edges_raw("proj-002").unwrap().unwrap(), b"second");
    }
}
