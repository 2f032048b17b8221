use super::*;
use crate::types::Value;

#[test]
fn test_parse_select_star() {
    let stmt = Parser::parse("SELECT * FROM users").unwrap();
    match stmt {
        Statement::Select(s) => {
            let from = s.from.as_ref().unwrap();
            assert_eq!(from.name, "users");
            assert!(from.alias.is_none());
            assert!(matches!(s.columns[0], SelectColumn::Star));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_create_table() {
    let stmt =
        Parser::parse("CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100), data JSON)")
            .unwrap();
    match stmt {
        Statement::CreateTable(c) => {
            assert_eq!(c.table_name, "users");
            assert_eq!(c.columns.len(), 3);
            assert!(c.columns[0].primary_key);
            assert!(!c.columns[0].nullable);
        }
        _ => panic!("Expected CREATE TABLE"),
    }
}

#[test]
fn test_parse_create_table_if_not_exists() {
    let stmt = Parser::parse("CREATE TABLE IF NOT EXISTS t (id INTEGER)").unwrap();
    match stmt {
        Statement::CreateTable(c) => assert!(c.if_not_exists),
        _ => panic!("Expected CREATE TABLE"),
    }
}

#[test]
fn test_parse_json_access() {
    let stmt = Parser::parse("SELECT data->'name' FROM users").unwrap();
    match stmt {
        Statement::Select(s) => {
            assert!(matches!(
                &s.columns[0],
                SelectColumn::Expr { expr: Expr::JsonAccess { as_text: false, .. }, .. }
            ));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_json_access_as_text() {
    let stmt = Parser::parse("SELECT data->>'name' FROM users").unwrap();
    match stmt {
        Statement::Select(s) => {
            assert!(matches!(
                &s.columns[0],
                SelectColumn::Expr { expr: Expr::JsonAccess { as_text: true, .. }, .. }
            ));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_table_alias() {
    let stmt = Parser::parse("SELECT * FROM users u").unwrap();
    match stmt {
        Statement::Select(s) => {
            assert_eq!(s.from.as_ref().unwrap().alias, Some("u".to_string()));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_table_alias_with_as() {
    let stmt = Parser::parse("SELECT * FROM users AS u").unwrap();
    match stmt {
        Statement::Select(s) => {
            assert_eq!(s.from.as_ref().unwrap().alias, Some("u".to_string()));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_qualified_column() {
    let stmt = Parser::parse("SELECT users.id FROM users").unwrap();
    match stmt {
        Statement::Select(s) => match &s.columns[0] {
            SelectColumn::Expr { expr: Expr::Column { table: Some(t), name }, .. } => {
                assert_eq!(t, "users");
                assert_eq!(name, "id");
            }
            _ => panic!("Expected qualified column"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_qualified_star() {
    let stmt = Parser::parse("SELECT users.* FROM users").unwrap();
    match stmt {
        Statement::Select(s) => match &s.columns[0] {
            SelectColumn::QualifiedStar { table } => assert_eq!(table, "users"),
            _ => panic!("Expected QualifiedStar"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_mixed_columns_with_alias() {
    let stmt = Parser::parse("SELECT id, name AS n FROM users").unwrap();
    match stmt {
        Statement::Select(s) => {
            assert_eq!(s.columns.len(), 2);
            match &s.columns[1] {
                SelectColumn::Expr { alias, .. } => assert_eq!(alias.as_deref(), Some("n")),
                _ => panic!("Expected aliased column"),
            }
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_insert() {
    let stmt = Parser::parse("INSERT INTO users VALUES (1, 'Alice')").unwrap();
    match stmt {
        Statement::Insert(i) => {
            assert_eq!(i.table_name, "users");
            assert!(i.columns.is_none());
            assert_eq!(i.values.len(), 1);
            assert_eq!(i.values[0].len(), 2);
        }
        _ => panic!("Expected INSERT"),
    }
}

#[test]
fn test_parse_insert_with_columns_and_multiple_rows() {
    let stmt =
        Parser::parse("INSERT INTO users (id, name) VALUES (1, 'Alice'), (2, 'Bob')").unwrap();
    match stmt {
        Statement::Insert(i) => {
            assert_eq!(i.columns, Some(vec!["id".to_string(), "name".to_string()]));
            assert_eq!(i.values.len(), 2);
        }
        _ => panic!("Expected INSERT"),
    }
}

#[test]
fn test_parse_update() {
    let stmt = Parser::parse("UPDATE users SET name = 'Bob' WHERE id = 1").unwrap();
    match stmt {
        Statement::Update(u) => {
            assert_eq!(u.table_name, "users");
            assert_eq!(u.assignments.len(), 1);
            assert!(u.where_clause.is_some());
        }
        _ => panic!("Expected UPDATE"),
    }
}

#[test]
fn test_parse_delete() {
    let stmt = Parser::parse("DELETE FROM users WHERE id = 1").unwrap();
    match stmt {
        Statement::Delete(d) => {
            assert_eq!(d.table_name, "users");
            assert!(d.where_clause.is_some());
        }
        _ => panic!("Expected DELETE"),
    }
}

#[test]
fn test_parse_drop_table() {
    assert!(matches!(
        Parser::parse("DROP TABLE users").unwrap(),
        Statement::DropTable { table_name, if_exists } if table_name == "users" && !if_exists
    ));
}

#[test]
fn test_parse_drop_table_if_exists() {
    assert!(matches!(
        Parser::parse("DROP TABLE IF EXISTS users").unwrap(),
        Statement::DropTable { table_name, if_exists } if table_name == "users" && if_exists
    ));
}

#[test]
fn test_parse_truncate_table() {
    assert!(matches!(Parser::parse("TRUNCATE TABLE users").unwrap(), Statement::TruncateTable(t) if t == "users"));
}

#[test]
fn test_parse_transactions() {
    assert!(matches!(Parser::parse("BEGIN").unwrap(), Statement::Begin { read_only: false }));
    assert!(matches!(Parser::parse("START TRANSACTION").unwrap(), Statement::Begin { read_only: false }));
    assert!(matches!(Parser::parse("COMMIT").unwrap(), Statement::Commit));
    assert!(matches!(Parser::parse("ROLLBACK").unwrap(), Statement::Rollback));
}

#[test]
fn test_parse_begin_read_only() {
    assert!(matches!(Parser::parse("BEGIN READ ONLY").unwrap(), Statement::Begin { read_only: true }));
    assert!(matches!(Parser::parse("BEGIN READ WRITE").unwrap(), Statement::Begin { read_only: false }));
}

#[test]
fn test_parse_checkpoint_show_describe() {
    assert!(matches!(Parser::parse("CHECKPOINT").unwrap(), Statement::Checkpoint));
    assert!(matches!(Parser::parse("SHOW TABLES").unwrap(), Statement::ShowTables));
    assert!(matches!(Parser::parse("DESCRIBE users").unwrap(), Statement::Describe(t) if t == "users"));
}

#[test]
fn test_parse_where_with_and_or_not() {
    let stmt = Parser::parse("SELECT * FROM t WHERE NOT a = 1 AND (b = 2 OR c = 3)").unwrap();
    assert!(matches!(stmt, Statement::Select(_)));
}

#[test]
fn test_parse_in_and_not_in() {
    let stmt = Parser::parse("SELECT * FROM t WHERE a IN (1, 2, 3)").unwrap();
    match stmt {
        Statement::Select(s) => assert!(matches!(s.where_clause, Some(Expr::In { .. }))),
        _ => panic!("Expected SELECT"),
    }

    let stmt = Parser::parse("SELECT * FROM t WHERE a NOT IN (1, 2)").unwrap();
    match stmt {
        Statement::Select(s) => assert!(matches!(s.where_clause, Some(Expr::NotIn { .. }))),
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_is_null_and_is_not_null() {
    let stmt = Parser::parse("SELECT * FROM t WHERE a IS NULL").unwrap();
    match stmt {
        Statement::Select(s) => assert!(matches!(s.where_clause, Some(Expr::IsNull(_)))),
        _ => panic!("Expected SELECT"),
    }

    let stmt = Parser::parse("SELECT * FROM t WHERE a IS NOT NULL").unwrap();
    match stmt {
        Statement::Select(s) => assert!(matches!(s.where_clause, Some(Expr::IsNotNull(_)))),
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_order_by_and_limit() {
    let stmt = Parser::parse("SELECT * FROM t ORDER BY a DESC, b LIMIT 10").unwrap();
    match stmt {
        Statement::Select(s) => {
            assert_eq!(s.order_by.len(), 2);
            assert_eq!(s.order_by[0].direction, SortOrder::Desc);
            assert_eq!(s.order_by[1].direction, SortOrder::Asc);
            assert_eq!(s.limit, Some(10));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_where_requires_from() {
    let err = Parser::parse("SELECT 1 WHERE 1 = 1");
    assert!(err.is_err());
}

#[test]
fn test_parse_function_call() {
    let stmt = Parser::parse("SELECT UPPER(name) FROM users").unwrap();
    match stmt {
        Statement::Select(s) => match &s.columns[0] {
            SelectColumn::Expr { expr: Expr::FunctionCall { name, args }, .. } => {
                assert_eq!(name, "UPPER");
                assert_eq!(args.len(), 1);
            }
            _ => panic!("Expected function call"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_count_star() {
    let stmt = Parser::parse("SELECT COUNT(*) FROM users").unwrap();
    match stmt {
        Statement::Select(s) => match &s.columns[0] {
            SelectColumn::Expr { expr: Expr::FunctionCall { name, args }, .. } => {
                assert_eq!(name, "COUNT");
                assert!(args.is_empty());
            }
            _ => panic!("Expected function call"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_parse_placeholder_sequence() {
    let stmt = Parser::parse("SELECT * FROM t WHERE a = ? AND b = ?").unwrap();
    match stmt {
        Statement::Select(s) => match &s.where_clause {
            Some(Expr::BinaryOp { left, right, .. }) => {
                assert!(matches!(**left, Expr::BinaryOp { .. }));
                assert!(matches!(**right, Expr::BinaryOp { .. }));
            }
            _ => panic!("Expected WHERE clause"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_placeholders_are_numbered_in_order_of_appearance() {
    let (stmt, count) = Parser::parse_prepared("SELECT ? , ? FROM t WHERE a = ?").unwrap();
    assert_eq!(count, 3);
    match stmt {
        Statement::Select(s) => {
            assert!(matches!(
                &s.columns[0],
                SelectColumn::Expr { expr: Expr::Placeholder(0), .. }
            ));
            assert!(matches!(
                &s.columns[1],
                SelectColumn::Expr { expr: Expr::Placeholder(1), .. }
            ));
        }
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_string_is_not_auto_parsed_as_json() {
    let stmt = Parser::parse("SELECT * FROM t WHERE a = '{hello}'").unwrap();
    match stmt {
        Statement::Select(s) => match &s.where_clause {
            Some(Expr::BinaryOp { right, .. }) => {
                assert!(matches!(**right, Expr::Literal(Value::String(_))));
            }
            _ => panic!("Expected WHERE clause"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_single_quote_escape_in_string_literal() {
    let stmt = Parser::parse("SELECT * FROM t WHERE a = 'O''Hara'").unwrap();
    match stmt {
        Statement::Select(s) => match &s.where_clause {
            Some(Expr::BinaryOp { right, .. }) => match &**right {
                Expr::Literal(Value::String(s)) => assert_eq!(s, "O'Hara"),
                _ => panic!("Expected string literal"),
            },
            _ => panic!("Expected WHERE clause"),
        },
        _ => panic!("Expected SELECT"),
    }
}

#[test]
fn test_error_contains_context_info() {
    let result = Parser::parse("SELECT * FROM users WHERE");
    assert!(result.is_err());
    let err = result.unwrap_err().to_string();
    assert!(err.contains("position") || err.contains("parsing"));
}

#[test]
fn test_empty_input_is_an_error() {
    assert!(Parser::parse("").is_err());
}

#[test]
fn test_incomplete_statements_are_errors() {
    assert!(Parser::parse("SELECT * FROM").is_err());
    assert!(Parser::parse("INSERT INTO users VALUES").is_err());
    assert!(Parser::parse("CREATE TABLE t (").is_err());
    assert!(Parser::parse("UPDATE t SET").is_err());
}

#[test]
fn test_trailing_semicolon_is_optional() {
    assert!(Parser::parse("SELECT * FROM t;").is_ok());
    assert!(Parser::parse("SELECT * FROM t").is_ok());
}

#[test]
fn test_nested_parentheses_in_expression() {
    let stmt = Parser::parse("SELECT * FROM t WHERE ((a = 1) AND (b = 2)) OR c = 3").unwrap();
    assert!(matches!(stmt, Statement::Select(_)));
}

#[test]
fn test_data_type_parsing() {
    let stmt = Parser::parse(
        "CREATE TABLE t (a INTEGER, b FLOAT, c VARCHAR(10), d TEXT, e BOOLEAN, f TIMESTAMP, g BLOB, h JSON, i DECIMAL(10,2), j UUID)",
    )
    .unwrap();
    match stmt {
        Statement::CreateTable(c) => assert_eq!(c.columns.len(), 10),
        _ => panic!("Expected CREATE TABLE"),
    }
}
