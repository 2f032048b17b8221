//! Expression evaluation: WHERE clauses, projections, DEFAULT expressions, and scalar
//! function calls. The executor is treated as a thin, largely out-of-scope collaborator
//! (spec.md §1); this module covers just enough scalar evaluation for single-table
//! SELECT/INSERT/UPDATE/DELETE to run as a pure function over a `Store` snapshot.

use chrono::Utc;

use crate::error::{Result, TinySqlError};
use crate::parser::{BinaryOperator, Expr};
use crate::types::{Schema, Value};

/// Evaluate an expression against one row. `params` resolves `Expr::Placeholder` for a
/// prepared statement being re-executed without re-parsing (see `cache.rs`).
pub fn eval(expr: &Expr, schema: &Schema, row: &[Value], params: &[Value]) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Placeholder(idx) => params
            .get(*idx)
            .cloned()
            .ok_or_else(|| TinySqlError::BindMismatch(format!("missing bound value for placeholder {}", idx))),
        Expr::Column { name, .. } => {
            let idx = schema
                .find_column(name)
                .ok_or_else(|| TinySqlError::unknown_column(name))?;
            Ok(row.get(idx).cloned().unwrap_or(Value::Null))
        }
        Expr::Not(inner) => Ok(Value::Boolean(!eval(inner, schema, row, params)?.is_truthy())),
        Expr::IsNull(inner) => Ok(Value::Boolean(eval(inner, schema, row, params)?.is_null())),
        Expr::IsNotNull(inner) => Ok(Value::Boolean(!eval(inner, schema, row, params)?.is_null())),
        Expr::JsonAccess { expr, key, as_text } => {
            let base = eval(expr, schema, row, params)?;
            Ok(if *as_text { base.json_get_text(key) } else { base.json_get(key) })
        }
        Expr::In { expr, values } => {
            let left = eval(expr, schema, row, params)?;
            for candidate in values {
                if left == eval(candidate, schema, row, params)? {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
        Expr::NotIn { expr, values } => {
            let left = eval(expr, schema, row, params)?;
            for candidate in values {
                if left == eval(candidate, schema, row, params)? {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }
        Expr::BinaryOp { left, op, right } => eval_binary(*op, left, right, schema, row, params),
        Expr::FunctionCall { name, args } => eval_scalar_function(name, args, schema, row, params),
    }
}

/// Evaluate an expression that cannot reference table columns (a `DEFAULT` clause).
/// `auto_increment_hint` feeds `LAST_INSERT_ID()`-style defaults; unused otherwise.
pub fn eval_const_expr(expr: &Expr, auto_increment_hint: u64) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::FunctionCall { name, args } if args.is_empty() => match name.to_uppercase().as_str() {
            "NOW" | "CURRENT_TIMESTAMP" => Ok(Value::Timestamp(Utc::now())),
            "LAST_INSERT_ID" => Ok(Value::Integer(auto_increment_hint as i64)),
            other => Err(TinySqlError::Type(format!("'{}' is not a valid constant expression", other))),
        },
        other => Err(TinySqlError::Type(format!("'{:?}' is not a valid constant expression", other))),
    }
}

fn eval_binary(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    schema: &Schema,
    row: &[Value],
    params: &[Value],
) -> Result<Value> {
    use BinaryOperator::*;

    if op == And {
        let l = eval(left, schema, row, params)?;
        if !l.is_truthy() {
            return Ok(Value::Boolean(false));
        }
        return Ok(Value::Boolean(eval(right, schema, row, params)?.is_truthy()));
    }
    if op == Or {
        let l = eval(left, schema, row, params)?;
        if l.is_truthy() {
            return Ok(Value::Boolean(true));
        }
        return Ok(Value::Boolean(eval(right, schema, row, params)?.is_truthy()));
    }

    let l = eval(left, schema, row, params)?;
    let r = eval(right, schema, row, params)?;

    match op {
        Equal => Ok(Value::Boolean(l == r)),
        NotEqual => Ok(Value::Boolean(l != r)),
        LessThan => Ok(Value::Boolean(l.partial_cmp(&r) == Some(std::cmp::Ordering::Less))),
        LessThanOrEqual => Ok(Value::Boolean(matches!(
            l.partial_cmp(&r),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ))),
        GreaterThan => Ok(Value::Boolean(l.partial_cmp(&r) == Some(std::cmp::Ordering::Greater))),
        GreaterThanOrEqual => Ok(Value::Boolean(matches!(
            l.partial_cmp(&r),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ))),
        Like => Ok(Value::Boolean(eval_like(&l, &r))),
        Plus | Minus | Multiply | Divide => eval_arithmetic(op, &l, &r),
        And | Or => unreachable!("handled above"),
    }
}

fn eval_arithmetic(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = match (numeric(l), numeric(r)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(Value::Null),
    };
    let result = match op {
        BinaryOperator::Plus => a + b,
        BinaryOperator::Minus => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => {
            if b == 0.0 {
                return Err(TinySqlError::Type("division by zero".into()));
            }
            a / b
        }
        _ => unreachable!(),
    };
    if matches!(l, Value::Float(_)) || matches!(r, Value::Float(_)) || result.fract() != 0.0 {
        Ok(Value::Float(result))
    } else {
        Ok(Value::Integer(result as i64))
    }
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Null => None,
        _ => None,
    }
}

fn eval_like(value: &Value, pattern: &Value) -> bool {
    let (Value::String(s), Value::String(p)) = (value, pattern) else { return false };
    like_match(s, p)
}

/// `%` matches any run of characters, `_` matches exactly one.
fn like_match(s: &str, pattern: &str) -> bool {
    let s: Vec<char> = s.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    like_match_rec(&s, &p)
}

fn like_match_rec(s: &[char], p: &[char]) -> bool {
    match p.first() {
        None => s.is_empty(),
        Some('%') => like_match_rec(s, &p[1..]) || (!s.is_empty() && like_match_rec(&s[1..], p)),
        Some('_') => !s.is_empty() && like_match_rec(&s[1..], &p[1..]),
        Some(c) => s.first() == Some(c) && like_match_rec(&s[1..], &p[1..]),
    }
}

pub const AGGREGATE_NAMES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

pub fn is_aggregate(name: &str) -> bool {
    AGGREGATE_NAMES.contains(&name.to_uppercase().as_str())
}

/// Non-aggregate scalar functions. Aggregate functions (`COUNT`, `SUM`, ...) are handled
/// separately by `query.rs` over the whole filtered row set, not per-row here.
fn eval_scalar_function(name: &str, args: &[Expr], schema: &Schema, row: &[Value], params: &[Value]) -> Result<Value> {
    if is_aggregate(name) {
        return Err(TinySqlError::Internal(format!(
            "aggregate function {} evaluated outside of aggregation context",
            name
        )));
    }
    let values: Vec<Value> = args
        .iter()
        .map(|a| eval(a, schema, row, params))
        .collect::<Result<_>>()?;

    match name.to_uppercase().as_str() {
        "UPPER" => Ok(Value::String(expect_string(&values, 0)?.to_uppercase())),
        "LOWER" => Ok(Value::String(expect_string(&values, 0)?.to_lowercase())),
        "LENGTH" => Ok(Value::Integer(expect_string(&values, 0)?.chars().count() as i64)),
        "ABS" => match values.first() {
            Some(Value::Integer(i)) => Ok(Value::Integer(i.abs())),
            Some(Value::Float(f)) => Ok(Value::Float(f.abs())),
            _ => Ok(Value::Null),
        },
        "COALESCE" => Ok(values.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "NOW" | "CURRENT_TIMESTAMP" => Ok(Value::Timestamp(Utc::now())),
        other => Err(TinySqlError::Type(format!("unknown function '{}'", other))),
    }
}

fn expect_string(values: &[Value], idx: usize) -> Result<String> {
    match values.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Ok(String::new()),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, DataType};

    fn schema() -> Schema {
        Schema {
            name: "t".into(),
            columns: vec![
                ColumnDef { name: "a".into(), data_type: DataType::Integer, nullable: true, default: None, primary_key: false, auto_increment: false, unique: false },
                ColumnDef { name: "b".into(), data_type: DataType::Text, nullable: true, default: None, primary_key: false, auto_increment: false, unique: false },
            ],
            auto_increment_counter: 1,
        }
    }

    #[test]
    fn evaluates_comparisons() {
        let s = schema();
        let row = vec![Value::Integer(5), Value::String("x".into())];
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Column { table: None, name: "a".into() }),
            op: BinaryOperator::GreaterThan,
            right: Box::new(Expr::Literal(Value::Integer(3))),
        };
        assert_eq!(eval(&expr, &s, &row, &[]).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn placeholder_resolves_from_params() {
        let s = schema();
        let row = vec![Value::Integer(5), Value::String("x".into())];
        let expr = Expr::Placeholder(0);
        assert_eq!(eval(&expr, &s, &row, &[Value::Integer(99)]).unwrap(), Value::Integer(99));
    }

    #[test]
    fn like_supports_percent_and_underscore() {
        assert!(like_match("hello", "h%o"));
        assert!(like_match("hello", "h_llo"));
        assert!(!like_match("hello", "h_lo"));
    }

    #[test]
    fn division_by_zero_is_a_type_error() {
        let s = schema();
        let row = vec![Value::Integer(5), Value::String("x".into())];
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(Value::Integer(1))),
            op: BinaryOperator::Divide,
            right: Box::new(Expr::Literal(Value::Integer(0))),
        };
        assert_eq!(eval(&expr, &s, &row, &[]).unwrap_err().kind_name(), "type-error");
    }
}
