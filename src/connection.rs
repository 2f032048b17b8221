//! Connection & request pipeline (C8).
//!
//! Grounded on the teacher's `protocol/prepared.rs` placeholder-binding and value
//! rendering conventions (MySQL-style literal text, e.g. string doubling, boolean
//! rendering), adapted to the three placeholder styles this system recognizes (`?`,
//! `$N`, `:N`) and to `Value`'s tagged-union rendering rules (timestamps -> RFC3339,
//! blobs -> base64, JSON -> quoted text, decimal/uuid -> canonical text) in place of the
//! teacher's MySQL wire types. A connection holds a reference to the database, the
//! tenant it operates against, and an optional in-progress transaction.

use std::sync::Arc;

use base64::Engine as _;
use log::warn;

use crate::admission::Context;
use crate::error::{Result, TinySqlError};
use crate::executor::{self, is_write};
use crate::parser::ast::Statement;
use crate::parser::Parser;
use crate::types::{QueryResult, ResultSet, Table, Value};
use crate::txn::Transaction;
use crate::Database;

/// Outcome of `exec`: `rows_affected` is `None` for statements that do not modify rows
/// (DDL, transaction control).
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub rows_affected: Option<u64>,
    pub last_insert_id: u64,
}

/// A lazily-consumed row stream. Rows are already materialized by the executor, but the
/// iterator only exposes them one at a time, matching the "forward-only, closed by
/// caller" contract: the caller decides how much of the result to pull.
pub struct RowIter {
    pub columns: Vec<String>,
    pub column_types: Vec<crate::types::DataType>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl RowIter {
    fn from_result_set(rs: ResultSet) -> Self {
        Self { columns: rs.columns, column_types: rs.column_types, rows: rs.rows.into_iter() }
    }

    fn empty() -> Self {
        Self { columns: vec![], column_types: vec![], rows: Vec::new().into_iter() }
    }
}

impl Iterator for RowIter {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// A statement remembered by SQL text for repeated execution. Binding still happens
/// fresh on every call (argument values differ between calls); what is cached behind
/// the scenes is the parsed plan for the resulting rendered SQL, via the database's
/// query cache.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    sql: String,
}

/// One connection against a tenant's data. Not `Sync`: a connection is meant to be used
/// by a single in-flight request at a time, matching the "one thread per request" model.
pub struct Connection {
    db: Arc<Database>,
    tenant: String,
    txn: Option<Transaction>,
}

impl Connection {
    pub fn new(db: Arc<Database>, tenant: impl Into<String>) -> Self {
        Self { db, tenant: tenant.into(), txn: None }
    }

    /// Alias used by background callers (the job scheduler) that only have a tenant
    /// name and a shared `Database` handle, not an interactive session.
    pub fn for_tenant(db: Arc<Database>, tenant: String) -> Self {
        Self::new(db, tenant)
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// `exec(ctx, sql, args) -> {rowsAffected?}`. Does not return a row stream; SELECTs
    /// run through `exec` still execute but their rows are discarded.
    pub fn exec(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        match self.run(ctx, sql, args)? {
            QueryResult::Modified { rows_affected, last_insert_id } => {
                Ok(ExecResult { rows_affected: Some(rows_affected), last_insert_id })
            }
            QueryResult::Select(_) => Ok(ExecResult { rows_affected: None, last_insert_id: 0 }),
            QueryResult::Ok
            | QueryResult::TransactionStarted
            | QueryResult::TransactionCommitted
            | QueryResult::TransactionRolledBack => Ok(ExecResult { rows_affected: None, last_insert_id: 0 }),
        }
    }

    /// Shape expected by the job scheduler: `sql`/`args`/`ctx` in that order, since a
    /// scheduled job has no caller-supplied context until the scheduler builds one from
    /// `maxRuntimeMs`.
    pub fn exec_with_context(&mut self, sql: &str, args: &[Value], ctx: &Context) -> Result<ExecResult> {
        self.exec(ctx, sql, args)
    }

    /// `query(ctx, sql, args) -> rowsIter`. Non-SELECT statements still execute (so
    /// `query("DELETE ...")` has the documented side effect) but yield an empty iterator.
    pub fn query(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> Result<RowIter> {
        match self.run(ctx, sql, args)? {
            QueryResult::Select(rs) => Ok(RowIter::from_result_set(rs)),
            _ => Ok(RowIter::empty()),
        }
    }

    /// `prepare(sql) -> Stmt`. Remembers the placeholder-bearing SQL text for repeated
    /// calls with different arguments; the per-call plan is still cached by the database
    /// query cache, keyed on the fully-rendered SQL.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        Ok(PreparedStatement { sql: sql.to_string() })
    }

    pub fn exec_prepared(&mut self, ctx: &Context, stmt: &PreparedStatement, args: &[Value]) -> Result<ExecResult> {
        self.exec(ctx, &stmt.sql, args)
    }

    pub fn query_prepared(&mut self, ctx: &Context, stmt: &PreparedStatement, args: &[Value]) -> Result<RowIter> {
        self.query(ctx, &stmt.sql, args)
    }

    pub fn begin_tx(&mut self, read_only: bool, ctx: &Context) -> Result<()> {
        if self.txn.is_some() {
            return Err(TinySqlError::Internal("a transaction is already in progress on this connection".into()));
        }
        self.txn = Some(self.db.txn_manager.begin(read_only, ctx)?);
        Ok(())
    }

    pub fn commit(&mut self, ctx: &Context) -> Result<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| TinySqlError::Internal("no transaction is in progress on this connection".into()))?;
        self.db.txn_manager.commit(txn, ctx)
    }

    pub fn rollback(&mut self) -> Result<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| TinySqlError::Internal("no transaction is in progress on this connection".into()))?;
        self.db.txn_manager.rollback(txn);
        Ok(())
    }

    /// Acquires and releases a reader permit to confirm liveness without touching the DB.
    pub fn ping(&self, ctx: &Context) -> Result<()> {
        self.db.txn_manager.ping(ctx)
    }

    fn run(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> Result<QueryResult> {
        if ctx.is_cancelled() {
            return Err(TinySqlError::Cancelled("context cancelled before dispatch".into()));
        }

        let rendered = bind_placeholders(sql, args)?;
        let stmt = self.db.plan_cache.get_or_compile(&rendered, Parser::parse)?;

        match stmt.as_ref() {
            Statement::Begin { read_only } => {
                self.begin_tx(*read_only, ctx)?;
                return Ok(QueryResult::TransactionStarted);
            }
            Statement::Commit => {
                self.commit(ctx)?;
                return Ok(QueryResult::TransactionCommitted);
            }
            Statement::Rollback => {
                self.rollback()?;
                return Ok(QueryResult::TransactionRolledBack);
            }
            Statement::Checkpoint => {
                self.db.txn_manager.checkpoint(ctx)?;
                return Ok(QueryResult::Ok);
            }
            _ => {}
        }

        let stmt = stmt.as_ref();

        if is_write(stmt) {
            if let Some(txn) = &self.txn {
                txn.ensure_writable()?;
            }
        }

        if let Some(txn) = &mut self.txn {
            let mut catalog = crate::persistence::rebuild_catalog(&txn.snapshot);
            executor::execute(&mut txn.snapshot, &mut catalog, &self.tenant, stmt, &[], ctx)
        } else {
            run_autocommit(&self.db, &self.tenant, stmt, ctx)
        }
    }
}

/// Autocommit path: no explicit transaction is open. A write confined to one already-
/// existing table (INSERT/UPDATE/DELETE/TRUNCATE) goes through the shallow-clone
/// `TransactionManager::auto_commit`, which only clones the touched table rather than the
/// whole store. Everything else (DDL that restructures the tenant's table map, and reads)
/// runs against a private snapshot taken under a reader permit and, if it wrote anything,
/// committed back under a writer permit — mirroring `begin`/dispatch/`commit` without
/// exposing the intermediate transaction to the caller.
fn run_autocommit(db: &Arc<Database>, tenant: &str, stmt: &Statement, ctx: &Context) -> Result<QueryResult> {
    if let Some(table_name) = single_table_write_target(stmt) {
        return db.txn_manager.auto_commit(tenant, table_name, ctx, |table| apply_single_table_write(table, stmt, ctx));
    }

    let txn = db.txn_manager.begin(!is_write(stmt), ctx)?;
    let mut txn = txn;
    let mut catalog = crate::persistence::rebuild_catalog(&txn.snapshot);
    let result = executor::execute(&mut txn.snapshot, &mut catalog, tenant, stmt, &[], ctx);
    match result {
        Ok(value) => {
            if is_write(stmt) {
                db.txn_manager.commit(txn, ctx)?;
            } else {
                db.txn_manager.rollback(txn);
            }
            Ok(value)
        }
        Err(e) => {
            db.txn_manager.rollback(txn);
            Err(e)
        }
    }
}

/// The table a write statement touches, if it is confined to one already-existing table
/// and so can run through the shallow-clone autocommit path. CREATE/DROP TABLE change
/// which tables exist at all (the tenant's table map itself), so they still take the
/// full snapshot path above.
fn single_table_write_target(stmt: &Statement) -> Option<&str> {
    match stmt {
        Statement::Insert(s) => Some(s.table_name.as_str()),
        Statement::Update(s) => Some(s.table_name.as_str()),
        Statement::Delete(s) => Some(s.table_name.as_str()),
        Statement::TruncateTable(name) => Some(name.as_str()),
        _ => None,
    }
}

fn apply_single_table_write(table: &mut Table, stmt: &Statement, ctx: &Context) -> Result<QueryResult> {
    match stmt {
        Statement::Insert(insert) => {
            let (rows_affected, last_insert_id) = executor::dml::insert_into_table(table, insert, &[], ctx)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id })
        }
        Statement::Update(update) => {
            let rows_affected = executor::dml::update_table(table, update, &[], ctx)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id: 0 })
        }
        Statement::Delete(delete) => {
            let rows_affected = executor::dml::delete_table(table, delete, &[], ctx)?;
            Ok(QueryResult::Modified { rows_affected, last_insert_id: 0 })
        }
        Statement::TruncateTable(_) => {
            let rows_affected = executor::ddl::truncate_table_in_place(table);
            Ok(QueryResult::Modified { rows_affected, last_insert_id: 0 })
        }
        other => unreachable!("single_table_write_target only returns statements handled here, got {:?}", other),
    }
}

/// Render every placeholder in `sql` as a literal, scanning left to right. Single-quoted
/// string literals (including the `''` escape) are copied verbatim so that a `?` or
/// `$N` appearing inside a string is never mistaken for a placeholder. `?` consumes
/// positional arguments in order; `$N`/`:N` address argument N directly (1-based). Every
/// supplied argument must be referenced at least once.
fn bind_placeholders(sql: &str, args: &[Value]) -> Result<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    let mut next_positional = 0usize;
    let mut referenced = vec![false; args.len()];

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            out.push(c);
            i += 1;
            loop {
                if i >= chars.len() {
                    return Err(TinySqlError::Parse("unterminated string literal".into()));
                }
                let ch = chars[i];
                out.push(ch);
                i += 1;
                if ch == '\'' {
                    if i < chars.len() && chars[i] == '\'' {
                        out.push(chars[i]);
                        i += 1;
                        continue;
                    }
                    break;
                }
            }
            continue;
        }

        if c == '?' {
            if next_positional >= args.len() {
                return Err(TinySqlError::BindMismatch(format!(
                    "statement has more '?' placeholders than the {} argument(s) supplied",
                    args.len()
                )));
            }
            out.push_str(&render_literal(&args[next_positional])?);
            referenced[next_positional] = true;
            next_positional += 1;
            i += 1;
            continue;
        }

        if (c == '$' || c == ':') && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
            let mut j = i + 1;
            let mut digits = String::new();
            while j < chars.len() && chars[j].is_ascii_digit() {
                digits.push(chars[j]);
                j += 1;
            }
            let n: usize = digits.parse().unwrap_or(0);
            if n == 0 || n > args.len() {
                return Err(TinySqlError::BindMismatch(format!(
                    "placeholder '{}{}' references argument {} but only {} argument(s) were supplied",
                    c,
                    digits,
                    n,
                    args.len()
                )));
            }
            out.push_str(&render_literal(&args[n - 1])?);
            referenced[n - 1] = true;
            i = j;
            continue;
        }

        out.push(c);
        i += 1;
    }

    if let Some(idx) = referenced.iter().position(|used| !used) {
        return Err(TinySqlError::BindMismatch(format!(
            "argument {} was supplied but never referenced by a placeholder",
            idx + 1
        )));
    }

    Ok(out)
}

fn render_literal(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => render_float(*f),
        Value::String(s) => quote_string(s),
        Value::Decimal(d) => quote_string(&d.to_string()),
        Value::Uuid(u) => quote_string(&u.to_string()),
        Value::Timestamp(t) => quote_string(&t.to_rfc3339()),
        Value::Blob(bytes) => quote_string(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        Value::Json(json) => quote_string(&json.to_string()),
    })
}

fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Warn-and-continue logging for a peer skipped during federated fan-out. Exposed here
/// so `federation.rs` can report through the same "log it, don't fail the request"
/// convention connections use for autosave failures.
pub(crate) fn log_skip(reason: &str) {
    warn!("{}", reason);
}
