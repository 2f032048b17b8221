//! Federated fan-out (C10): optional multi-instance read fan-out.
//!
//! `federated_query` runs a query locally, then the same query against every peer
//! concurrently, skips peers whose declared column set differs from the local one, and
//! concatenates rows. Grounded on the teacher's WAL worker thread (`wal/worker.rs`) for
//! the "spawn one thread per unit of concurrent work, join them all" shape, since this
//! system carries no async runtime; a peer error is logged via `connection::log_skip`
//! and does not fail the request as long as the local query succeeded. There is no
//! consistency guarantee across peers: this is query fan-out, not a distributed
//! transaction.

use std::sync::Arc;

use crate::admission::Context;
use crate::connection::log_skip;
use crate::error::Result;
use crate::types::ResultSet;
use crate::Database;

/// A federation peer: anything that can answer a `query(tenant, sql)` the way a local
/// connection does. The wire-level RPC adapter described in the external interfaces
/// (JSON `query{tenant,sql} -> {columns[],rows[],count,error?,duration}`) implements this
/// over a network transport; `LocalPeer` below implements it directly for in-process
/// fan-out across multiple `Database` instances.
pub trait Peer: Send + Sync {
    fn query(&self, tenant: &str, sql: &str) -> Result<ResultSet>;

    /// A label used only in skip/warning log lines.
    fn label(&self) -> String {
        "peer".to_string()
    }
}

/// Fan-out peer backed by another in-process `Database`. The common case for tests and
/// for embedding multiple tenants' databases in one process.
pub struct LocalPeer {
    pub name: String,
    pub db: Arc<Database>,
}

impl Peer for LocalPeer {
    fn query(&self, tenant: &str, sql: &str) -> Result<ResultSet> {
        let ctx = Context::background();
        let mut conn = self.db.connect(tenant);
        let rows = conn.query(&ctx, sql, &[])?;
        let mut result = ResultSet::new(rows.columns.clone(), rows.column_types.clone());
        for row in rows {
            result.add_row(row);
        }
        Ok(result)
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/// Execute `sql` locally and against every peer concurrently. Peers whose declared
/// column set (names, in order — see the order-sensitive resolution in the design notes)
/// differs from the local result are skipped with a logged warning, as are peers that
/// return an error; only the local failure is propagated to the caller.
pub fn federated_query(db: &Arc<Database>, tenant: &str, sql: &str, peers: &[Arc<dyn Peer>]) -> Result<ResultSet> {
    let ctx = Context::background();
    let mut conn = db.connect(tenant);
    let rows = conn.query(&ctx, sql, &[])?;
    let mut merged = ResultSet::new(rows.columns.clone(), rows.column_types.clone());
    for row in rows {
        merged.add_row(row);
    }

    let handles: Vec<_> = peers
        .iter()
        .map(|peer| {
            let peer = Arc::clone(peer);
            let tenant = tenant.to_string();
            let sql = sql.to_string();
            std::thread::spawn(move || (peer.label(), peer.query(&tenant, &sql)))
        })
        .collect();

    for handle in handles {
        let (label, outcome) = match handle.join() {
            Ok(v) => v,
            Err(_) => {
                log_skip("federation: peer thread panicked, skipping");
                continue;
            }
        };
        match outcome {
            Ok(peer_result) => {
                if peer_result.columns != merged.columns {
                    log_skip(&format!(
                        "federation: skipping peer '{}', column set {:?} does not match local {:?}",
                        label, peer_result.columns, merged.columns
                    ));
                    continue;
                }
                merged.rows.extend(peer_result.rows);
            }
            Err(e) => {
                log_skip(&format!("federation: skipping peer '{}' after error: {}", label, e));
            }
        }
    }

    Ok(merged)
}
