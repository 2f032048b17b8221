//! CREATE/DROP/TRUNCATE TABLE. Operates directly on a `Store` + `Catalog` pair; callers
//! decide whether that pair is a transaction's private snapshot or the live database.

use crate::catalog::Catalog;
use crate::error::{Result, TinySqlError};
use crate::executor::evaluator;
use crate::parser::ast::{ColumnDefAst, CreateTableStmt};
use crate::store::Store;
use crate::types::{ColumnDef, Schema, Table};

pub fn create_table(store: &mut Store, catalog: &mut Catalog, tenant: &str, stmt: &CreateTableStmt) -> Result<()> {
    if stmt.if_not_exists && store.get(tenant, &stmt.table_name).is_ok() {
        return Ok(());
    }

    let auto_increment_columns = stmt.columns.iter().filter(|c| c.auto_increment).count();
    if auto_increment_columns > 1 {
        return Err(TinySqlError::Constraint(
            "a table may have at most one AUTO_INCREMENT column".into(),
        ));
    }

    let columns = stmt
        .columns
        .iter()
        .map(column_def)
        .collect::<Result<Vec<_>>>()?;

    let schema = Schema { name: stmt.table_name.clone(), columns, auto_increment_counter: 1 };
    store.put(tenant, Table::new(schema.clone()), false)?;
    catalog.put_table(tenant, schema);
    Ok(())
}

fn column_def(col: &ColumnDefAst) -> Result<ColumnDef> {
    let default = match &col.default {
        Some(expr) => Some(evaluator::eval_const_expr(expr, 0)?),
        None => None,
    };
    Ok(ColumnDef {
        name: col.name.clone(),
        data_type: col.data_type.clone(),
        nullable: col.nullable,
        default,
        primary_key: col.primary_key,
        auto_increment: col.auto_increment,
        unique: col.unique,
    })
}

pub fn drop_table(store: &mut Store, catalog: &mut Catalog, tenant: &str, table_name: &str, if_exists: bool) -> Result<()> {
    match store.drop(tenant, table_name) {
        Ok(()) => {
            catalog.drop_table(tenant, table_name);
            Ok(())
        }
        Err(e) if if_exists && e.kind_name() == "not-found" => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn truncate_table(store: &mut Store, tenant: &str, table_name: &str) -> Result<u64> {
    Ok(truncate_table_in_place(store.get_mut(tenant, table_name)?))
}

/// Same as `truncate_table`, but against a `Table` directly — the shape the autocommit
/// path needs since it shallow-clones a single table rather than the whole store.
pub fn truncate_table_in_place(table: &mut Table) -> u64 {
    let removed = table.rows.len() as u64;
    table.rows.clear();
    table.touch();
    removed
}
