//! Snapshot persistence (C4): the whole database as one self-describing binary file.
//!
//! Grounded on the teacher's `StorageEngine::save_catalog`/`save_table` atomic
//! temp-then-rename idiom in `storage.rs`, but collapsed from a catalog.json plus one
//! JSONL file per table into a single file: a fixed magic/version header followed by a
//! bincode-encoded `{ catalog, store }` payload. A single file makes whole-database
//! checkpointing (WAL truncation point) unambiguous.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::catalog::Catalog;
use crate::error::{Result, TinySqlError};
use crate::store::Store;

const MAGIC: &[u8; 8] = b"TINYSQL\0";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    store: Store,
}

/// Reads and atomically writes the single snapshot file for a database.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the snapshot, or an empty store if no snapshot file exists yet (first run).
    pub fn load(&self) -> Result<Store> {
        if !self.path.exists() {
            return Ok(Store::new());
        }
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).map_err(|e| {
            TinySqlError::PersistenceIo(format!("failed to read snapshot header: {}", e))
        })?;
        if &magic != MAGIC {
            return Err(TinySqlError::PersistenceIo(format!(
                "'{}' is not a tinysql snapshot file",
                self.path.display()
            )));
        }

        let mut version_bytes = [0u8; 4];
        reader.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != FORMAT_VERSION {
            return Err(TinySqlError::PersistenceIo(format!(
                "snapshot format version {} is not supported (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let snapshot: Snapshot = bincode::deserialize_from(reader)?;
        Ok(snapshot.store)
    }

    /// Write the whole store atomically: serialize to a temp file in the same directory,
    /// fsync it, then rename over the real path. A reader never observes a partial file.
    pub fn save(&self, store: &Store) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            writer.write_all(MAGIC)?;
            writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
            let snapshot = Snapshot { store: store.clone() };
            bincode::serialize_into(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| TinySqlError::PersistenceIo(e.to_string()))?;
        Ok(())
    }
}

/// Load the catalog view alongside the data store. The catalog is derived from each
/// table's schema rather than stored separately, so it never drifts from the data.
pub fn rebuild_catalog(store: &Store) -> Catalog {
    let mut catalog = Catalog::new();
    for tenant in store.tenants() {
        if let Some(tables) = store.tenant_snapshot(tenant) {
            for schema in tables.values().map(|t| t.schema.clone()) {
                catalog.put_table(tenant, schema);
            }
        }
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, DataType, Schema, Table, Value};
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema {
            name: "users".into(),
            columns: vec![ColumnDef {
                name: "id".into(),
                data_type: DataType::Integer,
                nullable: false,
                default: None,
                primary_key: true,
                auto_increment: true,
                unique: false,
            }],
            auto_increment_counter: 1,
        }
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = tempdir().unwrap();
        let snap = SnapshotStore::new(dir.path().join("snap.db"));
        assert!(!snap.exists());
        let store = snap.load().unwrap();
        assert!(store.list("acme").is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let snap = SnapshotStore::new(dir.path().join("snap.db"));

        let mut store = Store::new();
        store.put("acme", Table::new(schema()), false).unwrap();
        store.insert_row("acme", "users", vec![Value::Integer(1)]).unwrap();
        snap.save(&store).unwrap();

        let loaded = snap.load().unwrap();
        assert_eq!(loaded.scan("acme", "users").unwrap().len(), 1);
    }

    #[test]
    fn rejects_file_with_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.db");
        fs::write(&path, b"not-a-snapshot-file-at-all").unwrap();
        let snap = SnapshotStore::new(path);
        let err = snap.load().unwrap_err();
        assert_eq!(err.kind_name(), "persistence-io");
    }
}
