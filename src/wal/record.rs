//! WAL record shape and change-set diffing.
//!
//! Unlike the teacher's Granite engine, which logs one `LogOperation` per row mutation,
//! tinySQL's commit model swaps a whole transaction snapshot in atomically (`txn.rs`), so
//! the WAL logs whole change-sets: `collect_changes` diffs the pre- and post-transaction
//! `Store` and produces the list of changes a recovering reader must replay.

use serde::{Deserialize, Serialize};

use crate::store::Store;
use crate::types::{Row, Schema};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Change {
    TableCreated { tenant: String, schema: Schema },
    TableDropped { tenant: String, table: String },
    TableTruncated { tenant: String, table: String },
    RowPut { tenant: String, table: String, row: Row },
    RowDeleted { tenant: String, table: String, row_id: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub txn_id: u64,
    pub timestamp: u64,
    pub changes: Vec<Change>,
}

/// Diff two whole-database snapshots into the list of changes that would turn `old` into
/// `new`. Tables are compared by `version` first (teacher-style cheap identity check)
/// before falling back to a row-by-row diff.
pub fn collect_changes(old: &Store, new: &Store) -> Vec<Change> {
    let mut changes = Vec::new();

    for tenant in new.tenants() {
        let old_tables = old.tenant_snapshot(tenant);
        let new_tables = match new.tenant_snapshot(tenant) {
            Some(t) => t,
            None => continue,
        };

        for (table_name, new_table) in new_tables {
            let old_table = old_tables.and_then(|t| t.get(table_name));
            match old_table {
                None => {
                    changes.push(Change::TableCreated {
                        tenant: tenant.clone(),
                        schema: new_table.schema.clone(),
                    });
                    let mut rows: Vec<&Row> = new_table.rows.values().collect();
                    rows.sort_by_key(|r| r.id);
                    for row in rows {
                        changes.push(Change::RowPut {
                            tenant: tenant.clone(),
                            table: table_name.clone(),
                            row: row.clone(),
                        });
                    }
                }
                Some(old_table) if old_table.version == new_table.version => {
                    // Identical fast path: nothing changed for this table.
                }
                Some(old_table) => {
                    for (row_id, new_row) in &new_table.rows {
                        if old_table.rows.get(row_id) != Some(new_row) {
                            changes.push(Change::RowPut {
                                tenant: tenant.clone(),
                                table: table_name.clone(),
                                row: new_row.clone(),
                            });
                        }
                    }
                    for row_id in old_table.rows.keys() {
                        if !new_table.rows.contains_key(row_id) {
                            changes.push(Change::RowDeleted {
                                tenant: tenant.clone(),
                                table: table_name.clone(),
                                row_id: *row_id,
                            });
                        }
                    }
                }
            }
        }

        if let Some(old_tables) = old_tables {
            for table_name in old_tables.keys() {
                if !new_tables.contains_key(table_name) {
                    changes.push(Change::TableDropped {
                        tenant: tenant.clone(),
                        table: table_name.clone(),
                    });
                }
            }
        }
    }

    changes
}

/// Apply a previously-logged change-set to a store (used by recovery and WAL replay).
pub fn apply_changes(store: &mut Store, changes: &[Change]) {
    use crate::types::Table;
    for change in changes {
        match change {
            Change::TableCreated { tenant, schema } => {
                let _ = store.put(tenant, Table::new(schema.clone()), true);
            }
            Change::TableDropped { tenant, table } => {
                let _ = store.drop(tenant, table);
            }
            Change::TableTruncated { tenant, table } => {
                if let Ok(t) = store.get_mut(tenant, table) {
                    t.rows.clear();
                    t.touch();
                }
            }
            Change::RowPut { tenant, table, row } => {
                if let Ok(t) = store.get_mut(tenant, table) {
                    t.rows.insert(row.id, row.clone());
                    t.next_row_id = t.next_row_id.max(row.id + 1);
                    t.touch();
                }
            }
            Change::RowDeleted { tenant, table, row_id } => {
                if let Ok(t) = store.get_mut(tenant, table) {
                    t.rows.remove(row_id);
                    t.touch();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, DataType, Table, Value};

    fn schema(name: &str) -> Schema {
        Schema {
            name: name.to_string(),
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
    fn diff_detects_new_table_and_rows() {
        let old = Store::new();
        let mut new = Store::new();
        new.put("acme", Table::new(schema("users")), false).unwrap();
        new.insert_row("acme", "users", vec![Value::Integer(1)]).unwrap();

        let changes = collect_changes(&old, &new);
        assert!(changes.iter().any(|c| matches!(c, Change::TableCreated { .. })));
        assert!(changes.iter().any(|c| matches!(c, Change::RowPut { .. })));
    }

    #[test]
    fn unchanged_table_produces_no_changes() {
        let mut store = Store::new();
        store.put("acme", Table::new(schema("users")), false).unwrap();
        let snapshot = store.deep_clone();
        assert!(collect_changes(&store, &snapshot).is_empty());
    }

    #[test]
    fn apply_changes_round_trips_through_recovery() {
        let old = Store::new();
        let mut new = Store::new();
        new.put("acme", Table::new(schema("users")), false).unwrap();
        new.insert_row("acme", "users", vec![Value::Integer(7)]).unwrap();
        let changes = collect_changes(&old, &new);

        let mut replay = Store::new();
        apply_changes(&mut replay, &changes);
        assert_eq!(replay.scan("acme", "users").unwrap().len(), 1);
    }
}
