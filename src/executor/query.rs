//! SELECT execution: filter, project, order, limit, and (when the select list is
//! entirely aggregate calls) fold the filtered rows down to a single result row.
//!
//! The AST has no GROUP BY, so an aggregate select list is always treated as one
//! implicit group over the whole filtered row set. Mixing aggregate and non-aggregate
//! columns without GROUP BY is rejected, matching the teacher's stance that a bare
//! column next to `COUNT(*)` is ambiguous rather than silently picking an arbitrary row.

use crate::admission::Context;
use crate::error::{Result, TinySqlError};
use crate::executor::evaluator::{eval, is_aggregate};
use crate::parser::ast::{Expr, SelectColumn, SelectStmt, SortOrder};
use crate::store::Store;
use crate::types::{DataType, ResultSet, Row, Schema, Value};

pub fn select(store: &Store, tenant: &str, stmt: &SelectStmt, params: &[Value], ctx: &Context) -> Result<ResultSet> {
    let table_ref = stmt
        .from
        .as_ref()
        .ok_or_else(|| TinySqlError::Parse("SELECT without FROM is not supported".into()))?;
    let schema = store.schema(tenant, &table_ref.name)?.clone();

    let mut rows = store.scan(tenant, &table_ref.name)?;
    if let Some(where_clause) = &stmt.where_clause {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows.drain(..) {
            ctx.check()?;
            if eval(where_clause, &schema, &row.values, params)?.is_truthy() {
                kept.push(row);
            }
        }
        rows = kept;
    }

    let has_aggregate = select_list_has_aggregate(&stmt.columns);
    if has_aggregate {
        return project_aggregate(&schema, &rows, &stmt.columns, params);
    }

    let (out_columns, out_types, projectors) = resolve_projection(&schema, &stmt.columns)?;
    let mut projected: Vec<(Row, Vec<Value>)> = Vec::with_capacity(rows.len());
    for row in rows.drain(..) {
        ctx.check()?;
        let values = projectors
            .iter()
            .map(|e| eval(e, &schema, &row.values, params))
            .collect::<Result<Vec<_>>>()?;
        projected.push((row, values));
    }

    sort_rows(&schema, &mut projected, &stmt.order_by, params)?;

    let mut result = ResultSet::new(out_columns, out_types);
    let limit = stmt.limit.unwrap_or(u64::MAX) as usize;
    for (_, values) in projected.into_iter().take(limit) {
        result.add_row(values);
    }
    Ok(result)
}

fn select_list_has_aggregate(columns: &[SelectColumn]) -> bool {
    columns.iter().any(|c| match c {
        SelectColumn::Expr { expr, .. } => expr_has_aggregate(expr),
        _ => false,
    })
}

fn expr_has_aggregate(expr: &Expr) -> bool {
    matches!(expr, Expr::FunctionCall { name, .. } if is_aggregate(name))
}

fn resolve_projection(schema: &Schema, columns: &[SelectColumn]) -> Result<(Vec<String>, Vec<DataType>, Vec<Expr>)> {
    let mut out_columns = Vec::new();
    let mut out_types = Vec::new();
    let mut exprs = Vec::new();

    for col in columns {
        match col {
            SelectColumn::Star | SelectColumn::QualifiedStar { .. } => {
                for c in &schema.columns {
                    out_columns.push(c.name.clone());
                    out_types.push(c.data_type.clone());
                    exprs.push(Expr::Column { table: None, name: c.name.clone() });
                }
            }
            SelectColumn::Expr { expr, alias } => {
                let name = alias.clone().unwrap_or_else(|| display_name(expr));
                out_columns.push(name);
                out_types.push(infer_type(schema, expr));
                exprs.push(expr.clone());
            }
        }
    }

    Ok((out_columns, out_types, exprs))
}

fn display_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { name, .. } => name.clone(),
        Expr::FunctionCall { name, args } if args.is_empty() => format!("{}()", name),
        Expr::FunctionCall { name, .. } => format!("{}(...)", name),
        _ => "expr".to_string(),
    }
}

fn infer_type(schema: &Schema, expr: &Expr) -> DataType {
    match expr {
        Expr::Column { name, .. } => schema
            .find_column(name)
            .and_then(|i| schema.columns.get(i))
            .map(|c| c.data_type.clone())
            .unwrap_or(DataType::Text),
        Expr::Literal(Value::Integer(_)) => DataType::Integer,
        Expr::Literal(Value::Float(_)) => DataType::Float,
        Expr::Literal(Value::Boolean(_)) => DataType::Boolean,
        _ => DataType::Text,
    }
}

fn sort_rows(
    schema: &Schema,
    rows: &mut [(Row, Vec<Value>)],
    order_by: &[crate::parser::ast::OrderByClause],
    params: &[Value],
) -> Result<()> {
    if order_by.is_empty() {
        return Ok(());
    }
    // Sorting with a fallible comparator: evaluate once up front, sort on the cached keys.
    let mut keyed: Vec<(Vec<Value>, (Row, Vec<Value>))> = Vec::with_capacity(rows.len());
    for (row, projected) in rows.iter() {
        let keys = order_by
            .iter()
            .map(|clause| eval(&clause.expr, schema, &row.values, params))
            .collect::<Result<Vec<_>>>()?;
        keyed.push((keys, (row.clone(), projected.clone())));
    }
    keyed.sort_by(|a, b| {
        for (idx, clause) in order_by.iter().enumerate() {
            let ord = a.0[idx].partial_cmp(&b.0[idx]).unwrap_or(std::cmp::Ordering::Equal);
            let ord = if clause.direction == SortOrder::Desc { ord.reverse() } else { ord };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    for (slot, (_, pair)) in rows.iter_mut().zip(keyed.into_iter()) {
        *slot = pair.1;
    }
    Ok(())
}

fn project_aggregate(schema: &Schema, rows: &[Row], columns: &[SelectColumn], params: &[Value]) -> Result<ResultSet> {
    let mut out_columns = Vec::new();
    let mut out_types = Vec::new();
    let mut values = Vec::new();

    for col in columns {
        let SelectColumn::Expr { expr, alias } = col else {
            return Err(TinySqlError::Parse("'*' cannot be combined with an aggregate function".into()));
        };
        let Expr::FunctionCall { name, args } = expr else {
            return Err(TinySqlError::Parse(
                "a non-aggregate column cannot appear alongside an aggregate without GROUP BY".into(),
            ));
        };
        if !is_aggregate(name) {
            return Err(TinySqlError::Parse(
                "a non-aggregate column cannot appear alongside an aggregate without GROUP BY".into(),
            ));
        }

        let value = eval_aggregate(name, args, schema, rows, params)?;
        out_columns.push(alias.clone().unwrap_or_else(|| display_name(expr)));
        out_types.push(match &value {
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            _ => DataType::Text,
        });
        values.push(value);
    }

    let mut result = ResultSet::new(out_columns, out_types);
    result.add_row(values);
    Ok(result)
}

fn eval_aggregate(name: &str, args: &[Expr], schema: &Schema, rows: &[Row], params: &[Value]) -> Result<Value> {
    match name.to_uppercase().as_str() {
        "COUNT" => {
            if args.is_empty() {
                return Ok(Value::Integer(rows.len() as i64));
            }
            let mut count = 0i64;
            for row in rows {
                let v = eval(&args[0], schema, &row.values, params)?;
                if !v.is_null() {
                    count += 1;
                }
            }
            Ok(Value::Integer(count))
        }
        "SUM" | "AVG" => {
            let arg = args.first().ok_or_else(|| TinySqlError::Parse(format!("{} requires one argument", name)))?;
            let mut sum = 0f64;
            let mut count = 0i64;
            for row in rows {
                match eval(arg, schema, &row.values, params)? {
                    Value::Integer(i) => { sum += i as f64; count += 1; }
                    Value::Float(f) => { sum += f; count += 1; }
                    Value::Null => {}
                    other => return Err(TinySqlError::Type(format!("cannot aggregate non-numeric value {}", other))),
                }
            }
            if name.eq_ignore_ascii_case("AVG") {
                if count == 0 {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Float(sum / count as f64))
                }
            } else if sum.fract() == 0.0 {
                Ok(Value::Integer(sum as i64))
            } else {
                Ok(Value::Float(sum))
            }
        }
        "MIN" | "MAX" => {
            let arg = args.first().ok_or_else(|| TinySqlError::Parse(format!("{} requires one argument", name)))?;
            let mut best: Option<Value> = None;
            for row in rows {
                let v = eval(arg, schema, &row.values, params)?;
                if v.is_null() {
                    continue;
                }
                best = Some(match best {
                    None => v,
                    Some(current) => {
                        let take_new = if name.eq_ignore_ascii_case("MIN") {
                            v.partial_cmp(&current) == Some(std::cmp::Ordering::Less)
                        } else {
                            v.partial_cmp(&current) == Some(std::cmp::Ordering::Greater)
                        };
                        if take_new { v } else { current }
                    }
                });
            }
            Ok(best.unwrap_or(Value::Null))
        }
        other => Err(TinySqlError::Type(format!("unknown aggregate function '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::TableRef;
    use crate::types::{ColumnDef, Table};

    fn populated_store() -> Store {
        let schema = Schema {
            name: "users".into(),
            columns: vec![
                ColumnDef { name: "id".into(), data_type: DataType::Integer, nullable: false, default: None, primary_key: true, auto_increment: true, unique: false },
                ColumnDef { name: "age".into(), data_type: DataType::Integer, nullable: true, default: None, primary_key: false, auto_increment: false, unique: false },
            ],
            auto_increment_counter: 1,
        };
        let mut store = Store::new();
        store.put("acme", Table::new(schema), false).unwrap();
        store.insert_row("acme", "users", vec![Value::Integer(1), Value::Integer(30)]).unwrap();
        store.insert_row("acme", "users", vec![Value::Integer(2), Value::Integer(40)]).unwrap();
        store
    }

    #[test]
    fn select_star_projects_all_columns() {
        let store = populated_store();
        let stmt = SelectStmt {
            columns: vec![SelectColumn::Star],
            from: Some(TableRef { name: "users".into(), alias: None }),
            where_clause: None,
            order_by: vec![],
            limit: None,
        };
        let result = select(&store, "acme", &stmt, &[], &Context::background()).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.columns, vec!["id", "age"]);
    }

    #[test]
    fn order_by_desc_and_limit() {
        let store = populated_store();
        let stmt = SelectStmt {
            columns: vec![SelectColumn::Star],
            from: Some(TableRef { name: "users".into(), alias: None }),
            where_clause: None,
            order_by: vec![crate::parser::ast::OrderByClause {
                expr: Expr::Column { table: None, name: "age".into() },
                direction: SortOrder::Desc,
            }],
            limit: Some(1),
        };
        let result = select(&store, "acme", &stmt, &[], &Context::background()).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][1], Value::Integer(40));
    }

    #[test]
    fn count_star_returns_one_row() {
        let store = populated_store();
        let stmt = SelectStmt {
            columns: vec![SelectColumn::Expr { expr: Expr::FunctionCall { name: "COUNT".into(), args: vec![] }, alias: None }],
            from: Some(TableRef { name: "users".into(), alias: None }),
            where_clause: None,
            order_by: vec![],
            limit: None,
        };
        let result = select(&store, "acme", &stmt, &[], &Context::background()).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Integer(2));
    }

    #[test]
    fn sum_and_avg_over_column() {
        let store = populated_store();
        let stmt = SelectStmt {
            columns: vec![
                SelectColumn::Expr { expr: Expr::FunctionCall { name: "SUM".into(), args: vec![Expr::Column { table: None, name: "age".into() }] }, alias: Some("total".into()) },
                SelectColumn::Expr { expr: Expr::FunctionCall { name: "AVG".into(), args: vec![Expr::Column { table: None, name: "age".into() }] }, alias: Some("mean".into()) },
            ],
            from: Some(TableRef { name: "users".into(), alias: None }),
            where_clause: None,
            order_by: vec![],
            limit: None,
        };
        let result = select(&store, "acme", &stmt, &[], &Context::background()).unwrap();
        assert_eq!(result.rows[0][0], Value::Integer(70));
        assert_eq!(result.rows[0][1], Value::Float(35.0));
    }

    #[test]
    fn mixing_aggregate_and_plain_column_without_group_by_errors() {
        let store = populated_store();
        let stmt = SelectStmt {
            columns: vec![
                SelectColumn::Expr { expr: Expr::Column { table: None, name: "id".into() }, alias: None },
                SelectColumn::Expr { expr: Expr::FunctionCall { name: "COUNT".into(), args: vec![] }, alias: None },
            ],
            from: Some(TableRef { name: "users".into(), alias: None }),
            where_clause: None,
            order_by: vec![],
            limit: None,
        };
        assert!(select(&store, "acme", &stmt, &[], &Context::background()).is_err());
    }
}
