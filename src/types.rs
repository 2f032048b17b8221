//! Core value and schema types shared by the table store, executor, and connection layer.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Declared column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Varchar(Option<u32>),
    Text,
    Boolean,
    Timestamp,
    Blob,
    Json,
    Decimal,
    Uuid,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Varchar(Some(n)) => write!(f, "VARCHAR({})", n),
            DataType::Varchar(None) => write!(f, "VARCHAR"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Json => write!(f, "JSON"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Uuid => write!(f, "UUID"),
        }
    }
}

/// A closed, exhaustive value type. Every column value and literal is one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
    Json(JsonValue),
    Decimal(Decimal),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness for WHERE-clause evaluation.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `obj->'key'` access.
    pub fn json_get(&self, key: &str) -> Value {
        match self {
            Value::Json(json) => {
                if let Some(val) = json.as_object().and_then(|o| o.get(key)) {
                    return Value::Json(val.clone());
                }
                if let Ok(idx) = key.parse::<usize>() {
                    if let Some(val) = json.as_array().and_then(|a| a.get(idx)) {
                        return Value::Json(val.clone());
                    }
                }
                Value::Null
            }
            _ => Value::Null,
        }
    }

    /// `obj->>'key'` access: unwraps the JSON scalar to a plain value.
    pub fn json_get_text(&self, key: &str) -> Value {
        match self.json_get(key) {
            Value::Json(JsonValue::String(s)) => Value::String(s),
            Value::Json(JsonValue::Null) => Value::Null,
            Value::Json(other) => Value::String(other.to_string()),
            other => other,
        }
    }

    fn numeric_affinity(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::Decimal(_) => 4,
            Value::String(_) => 5,
            Value::Timestamp(_) => 6,
            Value::Uuid(_) => 7,
            Value::Blob(_) => 8,
            Value::Json(_) => 9,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Value::String(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Blob(b) => write!(f, "0x{}", b.iter().map(|x| format!("{:02x}", x)).collect::<String>()),
            Value::Json(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Uuid(v) => write!(f, "{}", v),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::String(s) => s.hash(state),
            Value::Timestamp(t) => t.timestamp_nanos_opt().unwrap_or_default().hash(state),
            Value::Blob(b) => b.hash(state),
            Value::Json(j) => j.to_string().hash(state),
            Value::Decimal(d) => d.hash(state),
            Value::Uuid(u) => u.hash(state),
        }
    }
}

impl Eq for Value {}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::String(s), Value::Integer(i)) | (Value::Integer(i), Value::String(s)) => {
                s.parse::<i64>().map(|p| p == *i).unwrap_or(false)
            }
            _ => match (self.numeric_affinity(), other.numeric_affinity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.partial_cmp(b),
            _ => match (self.numeric_affinity(), other.numeric_affinity()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => {
                    if self.type_rank() == other.type_rank() {
                        None
                    } else {
                        self.type_rank().partial_cmp(&other.type_rank())
                    }
                }
            },
        }
    }
}

/// Column definition within a table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
}

/// A table's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default = "default_auto_increment")]
    pub auto_increment_counter: i64,
}

fn default_auto_increment() -> i64 {
    1
}

impl Schema {
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<usize> {
        self.columns.iter().enumerate().filter(|(_, c)| c.primary_key).map(|(i, _)| i).collect()
    }

    /// Columns declared `UNIQUE` (not counting PRIMARY KEY, which is checked separately).
    pub fn unique_columns(&self) -> Vec<usize> {
        self.columns.iter().enumerate().filter(|(_, c)| c.unique).map(|(i, _)| i).collect()
    }

    pub fn auto_increment_column(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.auto_increment)
    }
}

/// A single row. `id` is the table-local row identifier, stable across updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(id: u64, values: Vec<Value>) -> Self {
        Self { id, values }
    }
}

/// A table: its schema plus its current rows.
///
/// `version` increments on every successful structural or data mutation. It is a cheap
/// "did this table change" signal used by the WAL's change detector; it is not MVCC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub schema: Schema,
    pub rows: HashMap<u64, Row>,
    pub next_row_id: u64,
    #[serde(default)]
    pub version: u64,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Self { schema, rows: HashMap::new(), next_row_id: 1, version: 0 }
    }

    pub fn touch(&mut self) {
        self.version += 1;
    }
}

/// The result of a SELECT: column metadata plus the projected rows.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub column_types: Vec<DataType>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self { columns: vec![], column_types: vec![], rows: vec![] }
    }

    pub fn new(columns: Vec<String>, column_types: Vec<DataType>) -> Self {
        Self { columns, column_types, rows: vec![] }
    }

    pub fn add_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }
}

/// What executing a statement produced.
#[derive(Debug)]
pub enum QueryResult {
    Select(ResultSet),
    Modified { rows_affected: u64, last_insert_id: u64 },
    Ok,
    TransactionStarted,
    TransactionCommitted,
    TransactionRolledBack,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_string_affinity_is_strict() {
        assert_eq!(Value::String("1".into()), Value::Integer(1));
        assert_ne!(Value::String("1.5".into()), Value::Integer(1));
    }

    #[test]
    fn null_sorts_before_everything() {
        assert!(Value::Null < Value::Integer(1));
    }

    #[test]
    fn json_get_nested() {
        let v = Value::Json(json!({"a": 1, "b": {"c": 2}}));
        assert_eq!(v.json_get("b").json_get("c"), Value::Json(json!(2)));
        assert_eq!(v.json_get("missing"), Value::Null);
    }

    #[test]
    fn find_column_is_case_insensitive() {
        let schema = Schema {
            name: "t".into(),
            columns: vec![ColumnDef {
                name: "Id".into(),
                data_type: DataType::Integer,
                nullable: false,
                default: None,
                primary_key: true,
                auto_increment: true,
                unique: false,
            }],
            auto_increment_counter: 1,
        };
        assert_eq!(schema.find_column("id"), Some(0));
    }

    #[test]
    fn table_version_increments_on_touch() {
        let schema = Schema { name: "t".into(), columns: vec![], auto_increment_counter: 1 };
        let mut table = Table::new(schema);
        table.touch();
        assert_eq!(table.version, 1);
    }
}
