use crate::types::{DataType, Value};

/// Top-level SQL statement.
#[derive(Debug, Clone)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    DropTable { table_name: String, if_exists: bool },
    TruncateTable(String),
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Begin { read_only: bool },
    Commit,
    Rollback,
    ShowTables,
    Describe(String),
    Checkpoint,
}

/// CREATE TABLE statement.
#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table_name: String,
    pub columns: Vec<ColumnDefAst>,
    pub if_not_exists: bool,
}

/// Column definition in CREATE TABLE.
#[derive(Debug, Clone)]
pub struct ColumnDefAst {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<Expr>,
}

/// SELECT statement. Single-table only: no joins, no GROUP BY/aggregates.
#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub columns: Vec<SelectColumn>,
    pub from: Option<TableRef>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct OrderByClause {
    pub expr: Expr,
    pub direction: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A table reference with optional alias.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A column in the SELECT list.
#[derive(Debug, Clone)]
pub enum SelectColumn {
    Star,
    QualifiedStar { table: String },
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table_name: String,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table_name: String,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table_name: String,
    pub where_clause: Option<Expr>,
}

/// Expression (for WHERE clauses, values, etc.)
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Column { table: Option<String>, name: String },
    BinaryOp { left: Box<Expr>, op: BinaryOperator, right: Box<Expr> },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    /// JSON field access (column->'key'); `as_text` distinguishes `->>` from `->`.
    JsonAccess { expr: Box<Expr>, key: String, as_text: bool },
    FunctionCall { name: String, args: Vec<Expr> },
    In { expr: Box<Expr>, values: Vec<Expr> },
    NotIn { expr: Box<Expr>, values: Vec<Expr> },
    /// Placeholder for a prepared-statement parameter (`?`, `$N`, `:N` all normalize here).
    Placeholder(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Like,
}
