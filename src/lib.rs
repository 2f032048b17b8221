//! tinySQL: an embeddable, multi-tenant SQL database with snapshot-isolated
//! transactions, a write-ahead log, pluggable persistence, and a SQL front end.
//!
//! `Database` is the top-level handle: it owns the transaction manager (which in turn
//! owns the live table store, the WAL, and snapshot persistence), the catalog (views,
//! functions, and scheduled jobs), and the prepared-plan cache. Callers obtain a
//! `Connection` per request via `Database::connect`.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use log::info;

pub mod admission;
pub mod cache;
pub mod catalog;
pub mod connection;
pub mod dsn;
pub mod error;
pub mod executor;
pub mod federation;
pub mod lexer;
pub mod parser;
pub mod persistence;
pub mod scheduler;
pub mod store;
pub mod txn;
pub mod types;
pub mod wal;

use crate::cache::QueryCache;
use crate::catalog::Catalog;
use crate::connection::Connection;
use crate::dsn::{Backend, DbConfig};
use crate::error::Result;
use crate::parser::ast::Statement;
use crate::persistence::SnapshotStore;
use crate::store::Store;
use crate::txn::{TransactionManager, TransactionManagerConfig};
use crate::wal::{apply_changes, Wal, WalConfig};

/// Number of compiled plans the prepared-statement cache keeps per database. Chosen to
/// comfortably hold a typical application's distinct query shapes without unbounded
/// growth; eviction (see `cache.rs`) keeps it from growing past this regardless.
const PLAN_CACHE_CAPACITY: usize = 512;

/// The top-level handle for one tinySQL database. Cheap to clone (it is always held
/// behind an `Arc`); every connection and the job scheduler share the same instance.
pub struct Database {
    pub catalog: RwLock<Catalog>,
    pub txn_manager: TransactionManager,
    pub plan_cache: QueryCache<Statement>,
    pub default_tenant: String,
}

impl Database {
    /// Open a database from a `mem://` or `file:` DSN (see `dsn.rs`).
    pub fn open(dsn: &str) -> Result<Arc<Database>> {
        Self::open_with_config(dsn::parse_dsn(dsn)?)
    }

    /// Convenience for tests and quick embedding: an in-memory database with default
    /// pool settings.
    pub fn in_memory() -> Arc<Database> {
        Self::open_with_config(DbConfig::default()).expect("in-memory database cannot fail to open")
    }

    pub fn open_with_config(config: DbConfig) -> Result<Arc<Database>> {
        let (store, wal, snapshot_store) = match &config.backend {
            Backend::Memory => (Store::new(), None, None),
            Backend::File(path) => open_file_backend(path)?,
        };

        let catalog = RwLock::new(persistence::rebuild_catalog(&store));

        let txn_config = TransactionManagerConfig {
            reader_capacity: config.pool_readers,
            writer_capacity: config.pool_writers,
            busy_timeout: config.busy_timeout,
            autosave: config.autosave,
            ..TransactionManagerConfig::default()
        };
        let txn_manager = TransactionManager::new(store, wal, snapshot_store, txn_config);

        Ok(Arc::new(Database {
            catalog,
            txn_manager,
            plan_cache: QueryCache::new(PLAN_CACHE_CAPACITY),
            default_tenant: config.tenant,
        }))
    }

    /// Open a connection against `tenant`.
    pub fn connect(self: &Arc<Self>, tenant: &str) -> Connection {
        Connection::new(Arc::clone(self), tenant)
    }

    /// Open a connection against this database's configured default tenant.
    pub fn connect_default(self: &Arc<Self>) -> Connection {
        self.connect(&self.default_tenant.clone())
    }
}

/// Load the last snapshot (if any) and replay every WAL record committed since, in
/// order: `recovery-corrupt` from a damaged non-trailing record is fatal to opening the
/// instance, per the propagation policy in the error design.
fn open_file_backend(path: &PathBuf) -> Result<(Store, Option<Wal>, Option<SnapshotStore>)> {
    let snapshot_store = SnapshotStore::new(path.clone());
    let mut store = snapshot_store.load()?;

    let wal_path = PathBuf::from(format!("{}.wal", path.display()));
    let wal = Wal::open(wal_path, WalConfig::default())?;

    let records = wal.read_all()?;
    if !records.is_empty() {
        info!("replaying {} wal record(s) since last checkpoint", records.len());
    }
    for record in &records {
        apply_changes(&mut store, &record.changes);
    }

    Ok((store, Some(wal), Some(snapshot_store)))
}
