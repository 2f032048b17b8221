//! Tenant-partitioned in-memory table store (C1).
//!
//! Generalizes the teacher's `StorageEngine` from a single flat table map to
//! `tenant -> table name -> Table`. Unlike the teacher, this store does no file I/O of its
//! own: persistence and the WAL both work against whole-store snapshots produced by
//! `deep_clone`, and commit swaps a new snapshot in atomically (see `txn.rs`).

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TinySqlError};
use crate::types::{Row, Schema, Table, Value};

/// All tenants' tables, held behind a single clone-on-write value. Each tenant's tables
/// are kept in an `IndexMap` rather than a `HashMap` so `list` can return them in
/// insertion (creation) order instead of arbitrary hash order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    tenants: HashMap<String, IndexMap<String, Table>>,
}

impl Store {
    pub fn new() -> Self {
        Self { tenants: HashMap::new() }
    }

    fn tenant_tables(&self, tenant: &str) -> Result<&IndexMap<String, Table>> {
        self.tenants
            .get(tenant)
            .ok_or_else(|| TinySqlError::NotFound(format!("tenant '{}' does not exist", tenant)))
    }

    /// Get a table, or `NotFound` if the tenant or table does not exist.
    pub fn get(&self, tenant: &str, table: &str) -> Result<&Table> {
        self.tenant_tables(tenant)?
            .get(table)
            .ok_or_else(|| TinySqlError::not_found_table(table))
    }

    pub fn get_mut(&mut self, tenant: &str, table: &str) -> Result<&mut Table> {
        self.tenants
            .get_mut(tenant)
            .and_then(|t| t.get_mut(table))
            .ok_or_else(|| TinySqlError::not_found_table(table))
    }

    /// List table names for a tenant in the order they were created. Unknown tenants
    /// list as empty rather than erroring: a tenant only exists once it has at least one
    /// table, so "no tables yet" and "no such tenant" are the same observable state.
    pub fn list(&self, tenant: &str) -> Vec<String> {
        self.tenants
            .get(tenant)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Create or replace a table. `replace = false` errors if the table already exists.
    /// Replacing a table keeps its original creation-order position.
    pub fn put(&mut self, tenant: &str, table: Table, replace: bool) -> Result<()> {
        let tables = self.tenants.entry(tenant.to_string()).or_default();
        if !replace && tables.contains_key(&table.schema.name) {
            return Err(TinySqlError::already_exists_table(&table.schema.name));
        }
        tables.insert(table.schema.name.clone(), table);
        Ok(())
    }

    /// Drop a table. Errors if it does not exist.
    pub fn drop(&mut self, tenant: &str, table_name: &str) -> Result<()> {
        let tables = self
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| TinySqlError::not_found_table(table_name))?;
        tables.shift_remove(table_name).ok_or_else(|| TinySqlError::not_found_table(table_name))?;
        Ok(())
    }

    /// Deep-clone the whole store. Used at transaction BEGIN to hand the transaction a
    /// private snapshot it can mutate freely.
    pub fn deep_clone(&self) -> Store {
        self.clone()
    }

    /// Clone just the rows of one table, for diffing at commit time without copying
    /// every other table in the tenant.
    pub fn shallow_clone_for_table(&self, tenant: &str, table_name: &str) -> Option<Table> {
        self.tenants.get(tenant).and_then(|t| t.get(table_name)).cloned()
    }

    pub fn tenants(&self) -> impl Iterator<Item = &String> {
        self.tenants.keys()
    }

    pub fn tenant_snapshot(&self, tenant: &str) -> Option<&IndexMap<String, Table>> {
        self.tenants.get(tenant)
    }

    pub fn insert_tenant_snapshot(&mut self, tenant: String, tables: IndexMap<String, Table>) {
        self.tenants.insert(tenant, tables);
    }

    pub fn insert_row(&mut self, tenant: &str, table_name: &str, values: Vec<Value>) -> Result<u64> {
        let table = self.get_mut(tenant, table_name)?;
        let row_id = table.next_row_id;
        table.next_row_id += 1;
        table.rows.insert(row_id, Row::new(row_id, values));
        table.touch();
        Ok(row_id)
    }

    pub fn update_row(&mut self, tenant: &str, table_name: &str, row_id: u64, values: Vec<Value>) -> Result<bool> {
        let table = self.get_mut(tenant, table_name)?;
        if let Some(row) = table.rows.get_mut(&row_id) {
            row.values = values;
            table.touch();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn delete_row(&mut self, tenant: &str, table_name: &str, row_id: u64) -> Result<bool> {
        let table = self.get_mut(tenant, table_name)?;
        let existed = table.rows.remove(&row_id).is_some();
        if existed {
            table.touch();
        }
        Ok(existed)
    }

    pub fn scan(&self, tenant: &str, table_name: &str) -> Result<Vec<Row>> {
        let table = self.get(tenant, table_name)?;
        let mut rows: Vec<Row> = table.rows.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    pub fn schema(&self, tenant: &str, table_name: &str) -> Result<&Schema> {
        Ok(&self.get(tenant, table_name)?.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, DataType};

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
    fn put_then_get_round_trips() {
        let mut store = Store::new();
        store.put("acme", Table::new(schema("users")), false).unwrap();
        assert!(store.get("acme", "users").is_ok());
        assert!(store.get("other_tenant", "users").is_err());
    }

    #[test]
    fn put_without_replace_rejects_duplicate() {
        let mut store = Store::new();
        store.put("acme", Table::new(schema("users")), false).unwrap();
        let err = store.put("acme", Table::new(schema("users")), false).unwrap_err();
        assert_eq!(err.kind_name(), "constraint-violation");
    }

    #[test]
    fn deep_clone_is_independent() {
        let mut store = Store::new();
        store.put("acme", Table::new(schema("users")), false).unwrap();
        let mut clone = store.deep_clone();
        clone.insert_row("acme", "users", vec![Value::Integer(1)]).unwrap();
        assert_eq!(store.scan("acme", "users").unwrap().len(), 0);
        assert_eq!(clone.scan("acme", "users").unwrap().len(), 1);
    }

    #[test]
    fn drop_missing_table_errors() {
        let mut store = Store::new();
        assert!(store.drop("acme", "ghost").is_err());
    }

    #[test]
    fn list_preserves_creation_order() {
        let mut store = Store::new();
        store.put("acme", Table::new(schema("zebras")), false).unwrap();
        store.put("acme", Table::new(schema("apples")), false).unwrap();
        store.put("acme", Table::new(schema("mangoes")), false).unwrap();
        assert_eq!(store.list("acme"), vec!["zebras", "apples", "mangoes"]);
    }

    #[test]
    fn list_keeps_position_of_a_table_replaced_in_place() {
        let mut store = Store::new();
        store.put("acme", Table::new(schema("zebras")), false).unwrap();
        store.put("acme", Table::new(schema("apples")), false).unwrap();
        store.put("acme", Table::new(schema("zebras")), true).unwrap();
        assert_eq!(store.list("acme"), vec!["zebras", "apples"]);
    }
}
