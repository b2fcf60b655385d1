//! Memory record storage - byte-level API for persisted memories.
//!
//! Stores serialized memory records in the redb embedded database, indexed
//! by owning project for prefix-scan listing. The typed layer in
//! engram-core handles serialization; this layer only moves bytes.
//!
//! # Tables
//!
//! - `memories`: memory_id -> record bytes
//! - `memory_project_index`: project_id:memory_id -> memory_id

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const MEMORY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memories");

/// Index: project_id:memory_id -> memory_id
const PROJECT_INDEX_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("memory_project_index");

/// Low-level memory storage with byte-level API
#[derive(Clone)]
pub struct MemoryStorage {
    db: Arc<Database>,
}

impl MemoryStorage {
    /// Create a new MemoryStorage instance
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(MEMORY_TABLE)?;
        write_txn.open_table(PROJECT_INDEX_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a memory record, inserting or overwriting, with its project index.
    pub fn put_memory_raw(&self, memory_id: &str, project_id: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut memory_table = write_txn.open_table(MEMORY_TABLE)?;
            memory_table.insert(memory_id, data)?;

            let mut project_index = write_txn.open_table(PROJECT_INDEX_TABLE)?;
            let index_key = format!("{}:{}", project_id, memory_id);
            project_index.insert(index_key.as_str(), memory_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw record bytes by memory ID
    pub fn get_memory_raw(&self, memory_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMORY_TABLE)?;

        if let Some(value) = table.get(memory_id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// List all memory records for a project
    pub fn list_memories_by_project_raw(&self, project_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let project_index = read_txn.open_table(PROJECT_INDEX_TABLE)?;
        let memory_table = read_txn.open_table(MEMORY_TABLE)?;

        let prefix = format!("{}:", project_id);
        let mut records = Vec::new();

        for item in project_index.iter()? {
            let (key, value) = item?;
            let key_str = key.value();

            if key_str.starts_with(&prefix) {
                let memory_id = value.value();
                if let Some(data) = memory_table.get(memory_id)? {
                    records.push((memory_id.to_string(), data.value().to_vec()));
                }
            }
        }

        Ok(records)
    }

    /// Delete a memory record and its index entry.
    pub fn delete_memory(&self, memory_id: &str, project_id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut memory_table = write_txn.open_table(MEMORY_TABLE)?;
            let existed = memory_table.remove(memory_id)?.is_some();

            let mut project_index = write_txn.open_table(PROJECT_INDEX_TABLE)?;
            let index_key = format!("{}:{}", project_id, memory_id);
            project_index.remove(index_key.as_str())?;

            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Count memory records for a project
    pub fn count_by_project(&self, project_id: &str) -> Result<u32> {
        let read_txn = self.db.begin_read()?;
        let project_index = read_txn.open_table(PROJECT_INDEX_TABLE)?;

        let prefix = format!("{}:", project_id);
        let mut count = 0u32;

        for item in project_index.iter()? {
            let (key, _) = item?;
            if key.value().starts_with(&prefix) {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Delete all memory records for a project. Returns the number removed.
    pub fn delete_all_for_project(&self, project_id: &str) -> Result<u32> {
        let records = self.list_memories_by_project_raw(project_id)?;
        let count = records.len() as u32;

        if count == 0 {
            return Ok(0);
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut memory_table = write_txn.open_table(MEMORY_TABLE)?;
            let mut project_index = write_txn.open_table(PROJECT_INDEX_TABLE)?;

            for (memory_id, _) in &records {
                memory_table.remove(memory_id.as_str())?;
                let index_key = format!("{}:{}", project_id, memory_id);
                project_index.remove(index_key.as_str())?;
            }
        }
        write_txn.commit()?;

        tracing::debug!(project_id, count, "deleted all memory records for project");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_storage() -> MemoryStorage {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        MemoryStorage::new(db).unwrap()
    }

    #[test]
    fn test_put_and_get_memory_raw() {
        let storage = create_test_storage();

        let data = b"memory record bytes";
        storage.put_memory_raw("mem-001", "proj-001", data).unwrap();

        let retrieved = storage.get_memory_raw("mem-001").unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap(), data);
    }

    #[test]
    fn test_get_nonexistent_memory() {
        let storage = create_test_storage();

        let result = storage.get_memory_raw("nonexistent").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_list_memories_by_project() {
        let storage = create_test_storage();

        storage.put_memory_raw("mem-001", "proj-001", b"a").unwrap();
        storage.put_memory_raw("mem-002", "proj-001", b"b").unwrap();
        storage.put_memory_raw("mem-003", "proj-002", b"c").unwrap();

        let project1 = storage.list_memories_by_project_raw("proj-001").unwrap();
        assert_eq!(project1.len(), 2);

        let project2 = storage.list_memories_by_project_raw("proj-002").unwrap();
        assert_eq!(project2.len(), 1);

        let project3 = storage.list_memories_by_project_raw("proj-003").unwrap();
        assert_eq!(project3.len(), 0);
    }

    #[test]
    fn test_overwrite_preserves_single_index_entry() {
        let storage = create_test_storage();

        storage
            .put_memory_raw("mem-001", "proj-001", b"original")
            .unwrap();
        storage
            .put_memory_raw("mem-001", "proj-001", b"updated")
            .unwrap();

        let records = storage.list_memories_by_project_raw("proj-001").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, b"updated");
    }

    #[test]
    fn test_delete_memory() {
        let storage = create_test_storage();

        storage.put_memory_raw("mem-001", "proj-001", b"a").unwrap();

        let deleted = storage.delete_memory("mem-001", "proj-001").unwrap();
        assert!(deleted);

        assert!(storage.get_memory_raw("mem-001").unwrap().is_none());
        assert!(
            storage
                .list_memories_by_project_raw("proj-001")
                .unwrap()
                .is_empty()
        );

        let deleted_again = storage.delete_memory("mem-001", "proj-001").unwrap();
        assert!(!deleted_again);
    }

    #[test]
    fn test_count_by_project() {
        let storage = create_test_storage();

        storage.put_memory_raw("mem-001", "proj-001", b"a").unwrap();
        storage.put_memory_raw("mem-002", "proj-001", b"b").unwrap();
        storage.put_memory_raw("mem-003", "proj-002", b"c").unwrap();

        assert_eq!(storage.count_by_project("proj-001").unwrap(), 2);
        assert_eq!(storage.count_by_project("proj-002").unwrap(), 1);
        assert_eq!(storage.count_by_project("proj-003").unwrap(), 0);
    }

    #[test]
    fn test_delete_all_for_project() {
        let storage = create_test_storage();

        storage.put_memory_raw("mem-001", "proj-001", b"a").unwrap();
        storage.put_memory_raw("mem-002", "proj-001", b"b").unwrap();
        storage.put_memory_raw("mem-003", "proj-002", b"c").unwrap();

        let deleted = storage.delete_all_for_project("proj-001").unwrap();
        assert_eq!(deleted, 2);

        assert!(
            storage
                .list_memories_by_project_raw("proj-001")
                .unwrap()
                .is_empty()
        );

        // proj-002 records should still exist
        let remaining = storage.list_memories_by_project_raw("proj-002").unwrap();
        assert_eq!(remaining.len(), 1);
    }
}
