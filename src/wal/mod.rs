//! Write-ahead log (C3): durability for committed transactions between snapshot
//! checkpoints. See `record.rs` for the change-set format and `worker.rs` for the
//! group-commit writer thread and on-disk framing.

mod record;
mod worker;

pub use record::{apply_changes, collect_changes, Change, WalRecord};
pub use worker::{read_records, FsyncState, Lsn, WalConfig};

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use worker::WalHandle;

/// Owns the WAL file for one database: appends committed transactions durably and replays
/// them during recovery.
pub struct Wal {
    path: PathBuf,
    handle: WalHandle,
}

impl Wal {
    pub fn open(path: PathBuf, config: WalConfig) -> Result<Self> {
        let handle = WalHandle::open(path.clone(), config)?;
        Ok(Self { path, handle })
    }

    /// Append a committed transaction's change-set and block until it is durable.
    pub fn append(&self, txn_id: u64, timestamp: u64, changes: Vec<Change>) -> Result<Lsn> {
        self.handle.append(WalRecord { txn_id, timestamp, changes })
    }

    pub fn force_sync(&self) -> Result<()> {
        self.handle.force_sync()
    }

    pub fn wait_for_durable(&self, lsn: Lsn, timeout: Duration) -> Result<()> {
        self.handle.fsync_state.wait_for_durable(lsn, timeout)
    }

    /// Read every durable record currently on disk, in commit order. Used at startup to
    /// replay transactions committed since the last snapshot checkpoint.
    pub fn read_all(&self) -> Result<Vec<WalRecord>> {
        read_records(&self.path)
    }

    /// Drop the WAL file after a snapshot checkpoint has captured everything in it.
    /// Must not be called while the writer thread is still appending; callers quiesce
    /// writers first (see `txn.rs`'s checkpoint path).
    pub fn truncate_after_checkpoint(&mut self, config: WalConfig) -> Result<()> {
        std::fs::remove_file(&self.path).or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Ok(())
            } else {
                Err(e)
            }
        })?;
        self.handle = WalHandle::open(self.path.clone(), config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn truncate_after_checkpoint_clears_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut wal = Wal::open(path, WalConfig::synchronous()).unwrap();
        wal.append(1, 1, vec![]).unwrap();
        assert_eq!(wal.read_all().unwrap().len(), 1);

        wal.truncate_after_checkpoint(WalConfig::synchronous()).unwrap();
        assert_eq!(wal.read_all().unwrap().len(), 0);
    }
}
