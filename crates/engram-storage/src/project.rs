//! Project storage - byte-level API for project records.
//!
//! # Tables
//!
//! - `projects`: project_id -> record bytes

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const PROJECT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Low-level project storage with byte-level API
#[derive(Clone)]
pub struct ProjectStorage {
    db: Arc<Database>,
}

impl ProjectStorage {
    /// Create a new ProjectStorage instance
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(PROJECT_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a project record, inserting or overwriting.
    pub fn put_project_raw(&self, project_id: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROJECT_TABLE)?;
            table.insert(project_id, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw record bytes by project ID
    pub fn get_project_raw(&self, project_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROJECT_TABLE)?;

        if let Some(value) = table.get(project_id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// List all project records
    pub fn list_projects_raw(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROJECT_TABLE)?;

        let mut records = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            records.push((key.value().to_string(), value.value().to_vec()));
        }

        Ok(records)
    }

    /// Delete a project record. Does not touch memories or edges; the typed
    /// layer performs the cascade.
    pub fn delete_project(&self, project_id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(PROJECT_TABLE)?;
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

    fn create_test_storage() -> ProjectStorage {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        ProjectStorage::new(db).unwrap()
    }

    #[test]
    fn test_put_and_get_project() {
        let storage = create_test_storage();

        storage.put_project_raw("proj-001", b"record").unwrap();
        assert_eq!(
            storage.get_project_raw("proj-001").unwrap().unwrap(),
            b"record"
        );
    }

    #[test]
    fn test_list_projects() {
        let storage = create_test_storage();

        storage.put_project_raw("proj-001", b"a").unwrap();
        storage.put_project_raw("proj-002", b"b").unwrap();

        let projects = storage.list_projects_raw().unwrap();
        assert_eq!(projects.len(), 2);
    }

    #[test]
    fn test_delete_project() {
        let storage = create_test_storage();

        storage.put_project_raw("proj-001", b"record").unwrap();
        assert!(storage.delete_project("proj-001").unwrap());
        assert!(storage.get_project_raw("proj-001").unwrap().is_none());
        assert!(!storage.delete_project("proj-001").unwrap());
    }
}
