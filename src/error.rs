//! Unified error type for tinySQL.
//!
//! One enum covers every component; each variant is a stable "kind" a caller can match on
//! without parsing message text.

use std::fmt;
use std::io;

/// Stable error kinds, matched by callers instead of message text.
#[derive(Debug)]
pub enum TinySqlError {
    /// SQL failed to parse.
    Parse(String),
    /// A prepared statement was executed with the wrong number or shape of parameters.
    BindMismatch(String),
    /// A table, column, or other named object does not exist.
    NotFound(String),
    /// A write was attempted against a read-only connection or replica.
    ReadOnlyViolation(String),
    /// A reader or writer could not acquire admission within its timeout.
    BusyTimeout(String),
    /// A pending operation was cancelled by its caller.
    Cancelled(String),
    /// The WAL could not be written, flushed, or read.
    WalIo(String),
    /// The snapshot file could not be written or read.
    PersistenceIo(String),
    /// Recovery found a malformed or truncated WAL record.
    RecoveryCorrupt(String),
    /// A value did not match the column's declared type and could not be coerced.
    Type(String),
    /// A constraint (NOT NULL, PRIMARY KEY, UNIQUE) was violated.
    Constraint(String),
    /// Anything else: a bug, an invariant violation, a state that should be unreachable.
    Internal(String),
}

impl TinySqlError {
    pub fn not_found_table(name: &str) -> Self {
        TinySqlError::NotFound(format!("table '{}' does not exist", name))
    }

    pub fn already_exists_table(name: &str) -> Self {
        TinySqlError::Constraint(format!("table '{}' already exists", name))
    }

    pub fn unknown_column(name: &str) -> Self {
        TinySqlError::NotFound(format!("unknown column '{}'", name))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TinySqlError::Parse(_) => "parse-error",
            TinySqlError::BindMismatch(_) => "bind-mismatch",
            TinySqlError::NotFound(_) => "not-found",
            TinySqlError::ReadOnlyViolation(_) => "read-only-violation",
            TinySqlError::BusyTimeout(_) => "busy-timeout",
            TinySqlError::Cancelled(_) => "cancelled",
            TinySqlError::WalIo(_) => "wal-io",
            TinySqlError::PersistenceIo(_) => "persistence-io",
            TinySqlError::RecoveryCorrupt(_) => "recovery-corrupt",
            TinySqlError::Type(_) => "type-error",
            TinySqlError::Constraint(_) => "constraint-violation",
            TinySqlError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for TinySqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TinySqlError::Parse(m)
            | TinySqlError::BindMismatch(m)
            | TinySqlError::NotFound(m)
            | TinySqlError::ReadOnlyViolation(m)
            | TinySqlError::BusyTimeout(m)
            | TinySqlError::Cancelled(m)
            | TinySqlError::WalIo(m)
            | TinySqlError::PersistenceIo(m)
            | TinySqlError::RecoveryCorrupt(m)
            | TinySqlError::Type(m)
            | TinySqlError::Constraint(m)
            | TinySqlError::Internal(m) => m,
        };
        write!(f, "{}: {}", self.kind_name(), msg)
    }
}

impl std::error::Error for TinySqlError {}

impl From<io::Error> for TinySqlError {
    fn from(e: io::Error) -> Self {
        TinySqlError::PersistenceIo(e.to_string())
    }
}

impl From<serde_json::Error> for TinySqlError {
    fn from(e: serde_json::Error) -> Self {
        TinySqlError::Type(e.to_string())
    }
}

impl From<bincode::Error> for TinySqlError {
    fn from(e: bincode::Error) -> Self {
        TinySqlError::PersistenceIo(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TinySqlError>;
