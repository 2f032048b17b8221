//! INSERT/UPDATE/DELETE against a `Store`. Grounded on the teacher's `executor/dml.rs`
//! for the shape (resolve column list, coerce each value, apply row-by-row) but rewritten
//! against `types::Value`'s affinity rules instead of the teacher's per-engine row codec.

use crate::admission::Context;
use crate::error::{Result, TinySqlError};
use crate::executor::evaluator::eval;
use crate::parser::ast::{DeleteStmt, Expr, InsertStmt, UpdateStmt};
use crate::store::Store;
use crate::types::{Row, Schema, Table, Value};

pub fn insert(store: &mut Store, tenant: &str, stmt: &InsertStmt, params: &[Value], ctx: &Context) -> Result<(u64, u64)> {
    insert_into_table(store.get_mut(tenant, &stmt.table_name)?, stmt, params, ctx)
}

/// Same as `insert`, but against a `Table` directly rather than a tenant's whole `Store`
/// — the shape the autocommit path (`TransactionManager::auto_commit`) needs, since it
/// shallow-clones a single table rather than the whole store.
pub fn insert_into_table(table: &mut Table, stmt: &InsertStmt, params: &[Value], ctx: &Context) -> Result<(u64, u64)> {
    let schema = table.schema.clone();
    let target_columns: Vec<usize> = match &stmt.columns {
        Some(names) => names
            .iter()
            .map(|n| schema.find_column(n).ok_or_else(|| TinySqlError::unknown_column(n)))
            .collect::<Result<_>>()?,
        None => (0..schema.columns.len()).collect(),
    };

    let mut last_insert_id = 0u64;
    let mut rows_affected = 0u64;
    let mut auto_increment_counter = schema.auto_increment_counter;
    let unique_indexes = unique_check_indexes(&schema);
    let mut existing_rows = scan_table(table);

    for value_row in &stmt.values {
        ctx.check()?;
        if value_row.len() != target_columns.len() {
            return Err(TinySqlError::BindMismatch(format!(
                "INSERT has {} values but {} target columns",
                value_row.len(),
                target_columns.len()
            )));
        }

        let mut row = vec![Value::Null; schema.columns.len()];
        let mut provided = vec![false; schema.columns.len()];
        for (&col_idx, expr) in target_columns.iter().zip(value_row) {
            row[col_idx] = eval(expr, &schema, &[], params)?;
            provided[col_idx] = true;
        }

        apply_defaults_and_constraints(&schema, &mut row, &provided, &mut auto_increment_counter)?;
        check_unique_violations(&schema, &unique_indexes, &row, existing_rows.iter(), None)?;

        let row_id = table.next_row_id;
        table.next_row_id += 1;
        table.rows.insert(row_id, Row::new(row_id, row.clone()));
        table.touch();
        existing_rows.push(Row::new(row_id, row));
        rows_affected += 1;
        if schema.auto_increment_column().is_some() {
            last_insert_id = row_id;
        }
    }

    if schema.auto_increment_column().is_some() {
        table.schema.auto_increment_counter = auto_increment_counter;
    }

    Ok((rows_affected, last_insert_id))
}

fn scan_table(table: &Table) -> Vec<Row> {
    let mut rows: Vec<Row> = table.rows.values().cloned().collect();
    rows.sort_by_key(|r| r.id);
    rows
}

fn apply_defaults_and_constraints(
    schema: &Schema,
    row: &mut [Value],
    provided: &[bool],
    auto_increment_counter: &mut i64,
) -> Result<()> {
    for (idx, col) in schema.columns.iter().enumerate() {
        if !provided[idx] {
            if col.auto_increment {
                row[idx] = Value::Integer(*auto_increment_counter);
                *auto_increment_counter += 1;
                continue;
            }
            if let Some(default) = &col.default {
                row[idx] = default.clone();
                continue;
            }
        } else if col.auto_increment {
            if let Value::Integer(provided_value) = row[idx] {
                *auto_increment_counter = (*auto_increment_counter).max(provided_value + 1);
            }
        }
        if row[idx].is_null() && !col.nullable && !col.auto_increment {
            return Err(TinySqlError::Constraint(format!(
                "column '{}' does not allow NULL",
                col.name
            )));
        }
    }
    Ok(())
}

/// Column indexes that must be unique across a table: the PRIMARY KEY columns (as a
/// whole, composite-key style) plus every column individually declared `UNIQUE`.
fn unique_check_indexes(schema: &Schema) -> Vec<usize> {
    let mut indexes = schema.primary_key_columns();
    for idx in schema.unique_columns() {
        if !indexes.contains(&idx) {
            indexes.push(idx);
        }
    }
    indexes
}

/// Check `row` against every row in `existing`, erroring if any PRIMARY KEY or UNIQUE
/// column collides. `skip_row_id` excludes the row being updated from the comparison.
fn check_unique_violations<'a>(
    schema: &Schema,
    unique_indexes: &[usize],
    row: &[Value],
    existing: impl Iterator<Item = &'a Row>,
    skip_row_id: Option<u64>,
) -> Result<()> {
    if unique_indexes.is_empty() {
        return Ok(());
    }
    let pk = schema.primary_key_columns();
    for other in existing {
        if Some(other.id) == skip_row_id {
            continue;
        }
        if !pk.is_empty() && pk.iter().all(|&idx| row[idx] == other.values[idx]) {
            let names: Vec<&str> = pk.iter().map(|&idx| schema.columns[idx].name.as_str()).collect();
            return Err(TinySqlError::Constraint(format!(
                "duplicate value for primary key ({})",
                names.join(", ")
            )));
        }
        for &idx in &schema.unique_columns() {
            if !row[idx].is_null() && row[idx] == other.values[idx] {
                return Err(TinySqlError::Constraint(format!(
                    "duplicate value for unique column '{}'",
                    schema.columns[idx].name
                )));
            }
        }
    }
    Ok(())
}

pub fn update(store: &mut Store, tenant: &str, stmt: &UpdateStmt, params: &[Value], ctx: &Context) -> Result<u64> {
    update_table(store.get_mut(tenant, &stmt.table_name)?, stmt, params, ctx)
}

/// Same as `update`, but against a `Table` directly (see `insert_into_table`).
pub fn update_table(table: &mut Table, stmt: &UpdateStmt, params: &[Value], ctx: &Context) -> Result<u64> {
    let schema = table.schema.clone();
    let assignments: Vec<(usize, &Expr)> = stmt
        .assignments
        .iter()
        .map(|(name, expr)| {
            schema
                .find_column(name)
                .map(|idx| (idx, expr))
                .ok_or_else(|| TinySqlError::unknown_column(name))
        })
        .collect::<Result<_>>()?;

    let rows = scan_table(table);
    let unique_indexes = unique_check_indexes(&schema);
    let mut updated = 0u64;

    for row in &rows {
        ctx.check()?;
        let matches = match &stmt.where_clause {
            Some(expr) => eval(expr, &schema, &row.values, params)?.is_truthy(),
            None => true,
        };
        if !matches {
            continue;
        }

        let mut new_values = row.values.clone();
        for (idx, expr) in &assignments {
            new_values[*idx] = eval(expr, &schema, &row.values, params)?;
        }
        for (idx, col) in schema.columns.iter().enumerate() {
            if new_values[idx].is_null() && !col.nullable {
                return Err(TinySqlError::Constraint(format!(
                    "column '{}' does not allow NULL",
                    col.name
                )));
            }
        }
        check_unique_violations(&schema, &unique_indexes, &new_values, rows.iter(), Some(row.id))?;

        if let Some(existing) = table.rows.get_mut(&row.id) {
            existing.values = new_values;
            table.touch();
            updated += 1;
        }
    }

    Ok(updated)
}

pub fn delete(store: &mut Store, tenant: &str, stmt: &DeleteStmt, params: &[Value], ctx: &Context) -> Result<u64> {
    delete_table(store.get_mut(tenant, &stmt.table_name)?, stmt, params, ctx)
}

/// Same as `delete`, but against a `Table` directly (see `insert_into_table`).
pub fn delete_table(table: &mut Table, stmt: &DeleteStmt, params: &[Value], ctx: &Context) -> Result<u64> {
    let schema = table.schema.clone();
    let rows = scan_table(table);
    let mut deleted = 0u64;

    for row in rows {
        ctx.check()?;
        let matches = match &stmt.where_clause {
            Some(expr) => eval(expr, &schema, &row.values, params)?.is_truthy(),
            None => true,
        };
        if matches && table.rows.remove(&row.id).is_some() {
            table.touch();
            deleted += 1;
        }
    }

    Ok(deleted)
}
