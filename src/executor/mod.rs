//! Statement execution against a `Store` + `Catalog` pair.
//!
//! Grounded on the teacher's `executor/mod.rs` dispatch shape, narrowed to the simplified
//! single-table AST: no join planning, no index maintenance, no per-engine routing. The
//! caller (`connection.rs`) supplies the `Store`/`Catalog` to operate on — a transaction's
//! private snapshot for an explicit transaction, or the live database wrapped in a
//! begin/commit pair for autocommit.

pub mod ddl;
pub mod dml;
pub mod evaluator;
pub mod query;

use crate::admission::Context;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::parser::ast::Statement;
use crate::store::Store;
use crate::types::{QueryResult, Value};

/// Whether a statement can run read-only. Used to pick reader vs. writer admission and to
/// reject writes against a read-only transaction or connection.
pub fn is_write(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::CreateTable(_)
            | Statement::DropTable { .. }
            | Statement::TruncateTable(_)
            | Statement::Insert(_)
            | Statement::Update(_)
            | Statement::Delete(_)
    )
}

/// Execute one statement against `store`/`catalog`. Transaction control statements
/// (`BEGIN`/`COMMIT`/`ROLLBACK`) are not handled here: `connection.rs` intercepts them
/// before reaching the executor, since they change which `Store` subsequent statements
/// target.
///
/// `ctx` is checked up front and threaded into the row-scanning DML/query paths so a
/// caller's cancellation or a scheduled job's `maxRuntimeMs` deadline actually interrupts
/// a running statement instead of only bounding its admission wait (see `admission.rs`'s
/// `Context::check`).
pub fn execute(store: &mut Store, catalog: &mut Catalog, tenant: &str, stmt: &Statement, params: &[Value], ctx: &Context) -> Result<QueryResult> {
    ctx.check()?;
    match stmt {
        Statement::CreateTable(create) => {
            ddl::create_table(store, catalog, tenant, create)?;
            Ok(QueryResult::Ok)
        }
        Statement::DropTable { table_name, if_exists } => {
            ddl::drop_table(store, catalog, tenant, table_name, *if_exists)?;
            Ok(QueryResult::Ok)
        }
        Statement::TruncateTable(table_name) => {
            let rows_affected = ddl::truncate_table(store, tenant, table_name)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id: 0 })
        }
        Statement::Insert(insert) => {
            let (rows_affected, last_insert_id) = dml::insert(store, tenant, insert, params, ctx)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id })
        }
        Statement::Update(update) => {
            let rows_affected = dml::update(store, tenant, update, params, ctx)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id: 0 })
        }
        Statement::Delete(delete) => {
            let rows_affected = dml::delete(store, tenant, delete, params, ctx)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id: 0 })
        }
        Statement::Select(select) => {
            let result_set = query::select(store, tenant, select, params, ctx)?;
            Ok(QueryResult::Select(result_set))
        }
        Statement::ShowTables => {
            let names = store.list(tenant);
            let mut result = crate::types::ResultSet::new(vec!["table_name".into()], vec![crate::types::DataType::Text]);
            for name in names {
                result.add_row(vec![Value::String(name)]);
            }
            Ok(QueryResult::Select(result))
        }
        Statement::Describe(table_name) => {
            let schema = store.schema(tenant, table_name)?;
            let mut result = crate::types::ResultSet::new(
                vec!["column_name".into(), "data_type".into(), "nullable".into(), "primary_key".into()],
                vec![
                    crate::types::DataType::Text,
                    crate::types::DataType::Text,
                    crate::types::DataType::Boolean,
                    crate::types::DataType::Boolean,
                ],
            );
            for col in &schema.columns {
                result.add_row(vec![
                    Value::String(col.name.clone()),
                    Value::String(col.data_type.to_string()),
                    Value::Boolean(col.nullable),
                    Value::Boolean(col.primary_key),
                ]);
            }
            Ok(QueryResult::Select(result))
        }
        Statement::Begin { .. } | Statement::Commit | Statement::Rollback | Statement::Checkpoint => {
            unreachable!("transaction control statements are handled by the connection layer")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn create_insert_select_round_trip() {
        let mut store = Store::new();
        let mut catalog = Catalog::new();
        let ctx = Context::background();
        let create = Parser::parse("CREATE TABLE t (id INT PRIMARY KEY AUTO_INCREMENT, name TEXT)").unwrap();
        execute(&mut store, &mut catalog, "acme", &create, &[], &ctx).unwrap();

        let insert = Parser::parse("INSERT INTO t (name) VALUES ('ann')").unwrap();
        let result = execute(&mut store, &mut catalog, "acme", &insert, &[], &ctx).unwrap();
        assert!(matches!(result, QueryResult::Modified { rows_affected: 1, .. }));

        let select = Parser::parse("SELECT * FROM t").unwrap();
        match execute(&mut store, &mut catalog, "acme", &select, &[], &ctx).unwrap() {
            QueryResult::Select(rs) => assert_eq!(rs.rows.len(), 1),
            other => panic!("expected Select, got {:?}", other),
        }
    }

    #[test]
    fn show_tables_lists_created_tables() {
        let mut store = Store::new();
        let mut catalog = Catalog::new();
        let ctx = Context::background();
        let create = Parser::parse("CREATE TABLE t (id INT)").unwrap();
        execute(&mut store, &mut catalog, "acme", &create, &[], &ctx).unwrap();

        let show = Parser::parse("SHOW TABLES").unwrap();
        match execute(&mut store, &mut catalog, "acme", &show, &[], &ctx).unwrap() {
            QueryResult::Select(rs) => assert_eq!(rs.rows, vec![vec![Value::String("t".into())]]),
            other => panic!("expected Select, got {:?}", other),
        }
    }

    #[test]
    fn a_context_whose_deadline_already_elapsed_aborts_execution() {
        let mut store = Store::new();
        let mut catalog = Catalog::new();
        let ctx = Context::with_deadline(std::time::Duration::from_millis(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let select = Parser::parse("SELECT 1").unwrap();
        let err = execute(&mut store, &mut catalog, "acme", &select, &[], &ctx).unwrap_err();
        assert_eq!(err.kind_name(), "cancelled");
    }

    #[test]
    fn is_write_classifies_statements() {
        assert!(is_write(&Parser::parse("INSERT INTO t VALUES (1)").unwrap()));
        assert!(!is_write(&Parser::parse("SELECT * FROM t").unwrap()));
    }
}
