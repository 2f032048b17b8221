//! Group-commit WAL writer thread.
//!
//! Grounded on the teacher's Granite `wal.rs`: a dedicated writer thread drains a channel
//! of pending writes, batches them, and fsyncs on a timer/size/force-sync trigger while
//! callers block on an `FsyncState` condvar for "my LSN is durable". The record format and
//! framing differ (see `record.rs` and `append_record` below), but the concurrency shape is
//! copied as-is: it is the part of the teacher's engineering that has nothing to do with
//! per-row undo logging.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crc32fast::Hasher as Crc32;

use crate::error::{Result, TinySqlError};
use crate::wal::record::WalRecord;

pub type Lsn = u64;

#[derive(Debug, Clone)]
pub struct WalConfig {
    pub batch_timeout: Duration,
    pub max_batch_size: usize,
    pub fsync_interval: Duration,
}

impl WalConfig {
    /// fsync after every batch: the safest, slowest preset.
    pub fn synchronous() -> Self {
        Self { batch_timeout: Duration::from_millis(1), max_batch_size: 1, fsync_interval: Duration::from_millis(0) }
    }

    /// Group-commit with a short fsync interval: the default.
    pub fn default_preset() -> Self {
        Self { batch_timeout: Duration::from_millis(5), max_batch_size: 256, fsync_interval: Duration::from_millis(10) }
    }

    /// Favor throughput over durability window: wider batches, longer fsync interval.
    pub fn high_throughput() -> Self {
        Self { batch_timeout: Duration::from_millis(20), max_batch_size: 2048, fsync_interval: Duration::from_millis(100) }
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        Self::default_preset()
    }
}

/// Durability handshake between callers appending records and the writer thread fsyncing
/// them. Mirrors the teacher's `FsyncState`: a fast-path atomic check before falling back
/// to a condvar wait, so the common case (already durable) never blocks.
pub struct FsyncState {
    durable_lsn: AtomicU64,
    written_lsn: AtomicU64,
    mutex: Mutex<()>,
    condvar: Condvar,
    shutdown: AtomicU64,
}

impl FsyncState {
    fn new() -> Self {
        Self {
            durable_lsn: AtomicU64::new(0),
            written_lsn: AtomicU64::new(0),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            shutdown: AtomicU64::new(0),
        }
    }

    pub fn durable_lsn(&self) -> Lsn {
        self.durable_lsn.load(Ordering::Acquire)
    }

    fn update_written(&self, lsn: Lsn) {
        self.written_lsn.fetch_max(lsn, Ordering::AcqRel);
    }

    fn signal_durable(&self, lsn: Lsn) {
        self.durable_lsn.fetch_max(lsn, Ordering::AcqRel);
        let _guard = self.mutex.lock().unwrap();
        self.condvar.notify_all();
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(1, Ordering::Release);
        let _guard = self.mutex.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Block until `target_lsn` is fsynced, or until `timeout` elapses / the writer
    /// shuts down. Returns `Ok(())` once durable.
    pub fn wait_for_durable(&self, target_lsn: Lsn, timeout: Duration) -> Result<()> {
        if self.durable_lsn() >= target_lsn {
            return Ok(());
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.mutex.lock().unwrap();
        loop {
            if self.durable_lsn() >= target_lsn {
                return Ok(());
            }
            if self.shutdown.load(Ordering::Acquire) != 0 {
                return Err(TinySqlError::WalIo("wal writer shut down before fsync".into()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TinySqlError::BusyTimeout("timed out waiting for wal fsync".into()));
            }
            let (g, result) = self.condvar.wait_timeout(guard, deadline - now).unwrap();
            guard = g;
            if result.timed_out() && self.durable_lsn() < target_lsn {
                return Err(TinySqlError::BusyTimeout("timed out waiting for wal fsync".into()));
            }
        }
    }
}

struct PendingWrite {
    record: WalRecord,
    responder: mpsc::Sender<Result<Lsn>>,
}

enum WalMessage {
    Write(PendingWrite),
    ForceSync,
    Shutdown,
}

pub struct WalHandle {
    sender: mpsc::Sender<WalMessage>,
    pub fsync_state: Arc<FsyncState>,
    join: Option<thread::JoinHandle<()>>,
}

impl WalHandle {
    pub fn open(path: PathBuf, config: WalConfig) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let fsync_state = Arc::new(FsyncState::new());
        let (sender, receiver) = mpsc::channel();
        let worker_state = fsync_state.clone();
        let join = thread::spawn(move || wal_worker_thread(file, receiver, worker_state, config));
        Ok(Self { sender, fsync_state, join: Some(join) })
    }

    /// Append a record and block until it is fsynced to disk.
    pub fn append(&self, record: WalRecord) -> Result<Lsn> {
        let (responder, ack) = mpsc::channel();
        self.sender
            .send(WalMessage::Write(PendingWrite { record, responder }))
            .map_err(|_| TinySqlError::WalIo("wal writer thread is gone".into()))?;
        ack.recv().map_err(|_| TinySqlError::WalIo("wal writer thread dropped the response channel".into()))?
    }

    pub fn force_sync(&self) -> Result<()> {
        self.sender
            .send(WalMessage::ForceSync)
            .map_err(|_| TinySqlError::WalIo("wal writer thread is gone".into()))
    }
}

impl Drop for WalHandle {
    fn drop(&mut self) {
        let _ = self.sender.send(WalMessage::Shutdown);
        self.fsync_state.signal_shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Frame one record as `[4-byte LE length][bincode payload][4-byte LE crc32]`.
fn frame_record(record: &WalRecord) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)?;
    let mut crc = Crc32::new();
    crc.update(&payload);
    let checksum = crc.finalize();

    let mut framed = Vec::with_capacity(4 + payload.len() + 4);
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(&payload);
    framed.extend_from_slice(&checksum.to_le_bytes());
    Ok(framed)
}

fn wal_worker_thread(
    file: File,
    receiver: mpsc::Receiver<WalMessage>,
    state: Arc<FsyncState>,
    config: WalConfig,
) {
    let mut writer = BufWriter::new(file);
    let mut lsn: Lsn = state.durable_lsn();
    let mut last_fsync = Instant::now();

    'outer: loop {
        let mut batch: Vec<PendingWrite> = Vec::new();
        match receiver.recv_timeout(config.batch_timeout) {
            Ok(WalMessage::Write(w)) => batch.push(w),
            Ok(WalMessage::ForceSync) => {
                let _ = sync_writer(&mut writer);
                state.signal_durable(lsn);
                continue;
            }
            Ok(WalMessage::Shutdown) => break 'outer,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if last_fsync.elapsed() >= config.fsync_interval && state.written_lsn.load(Ordering::Acquire) > state.durable_lsn() {
                    let _ = sync_writer(&mut writer);
                    state.signal_durable(lsn);
                    last_fsync = Instant::now();
                }
                continue;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break 'outer,
        }

        while batch.len() < config.max_batch_size {
            match receiver.try_recv() {
                Ok(WalMessage::Write(w)) => batch.push(w),
                Ok(WalMessage::ForceSync) | Err(mpsc::TryRecvError::Empty) => break,
                Ok(WalMessage::Shutdown) | Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }

        let mut write_err: Option<TinySqlError> = None;
        for pending in &batch {
            lsn += 1;
            match frame_record(&pending.record) {
                Ok(framed) => {
                    if let Err(e) = writer.write_all(&framed) {
                        write_err = Some(TinySqlError::WalIo(e.to_string()));
                        break;
                    }
                }
                Err(e) => {
                    write_err = Some(e);
                    break;
                }
            }
        }
        state.update_written(lsn);

        let sync_result = if write_err.is_none() {
            sync_writer(&mut writer).map_err(|e| TinySqlError::WalIo(e.to_string()))
        } else {
            Ok(())
        };

        if sync_result.is_ok() && write_err.is_none() {
            state.signal_durable(lsn);
            last_fsync = Instant::now();
        }

        for pending in batch {
            let result = match (&write_err, &sync_result) {
                (Some(e), _) => Err(TinySqlError::WalIo(e.to_string())),
                (None, Err(e)) => Err(TinySqlError::WalIo(e.to_string())),
                (None, Ok(())) => Ok(lsn),
            };
            let _ = pending.responder.send(result);
        }
    }
}

fn sync_writer(writer: &mut BufWriter<File>) -> io::Result<()> {
    writer.flush()?;
    writer.get_ref().sync_data()
}

/// Read every complete, checksum-valid record from a WAL file in order. Stops at the first
/// malformed or truncated record instead of skipping past it: a partially-written tail is
/// expected after a crash mid-append, but a corrupt record anywhere else means the rest of
/// the file cannot be trusted either.
pub fn read_records(path: &PathBuf) -> Result<Vec<WalRecord>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        if offset + 4 > buf.len() {
            break; // trailing partial length prefix: normal after a crash mid-write
        }
        let len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if offset + len + 4 > buf.len() {
            break; // trailing partial record: normal after a crash mid-write
        }
        let payload = &buf[offset..offset + len];
        let stored_crc = u32::from_le_bytes(buf[offset + len..offset + len + 4].try_into().unwrap());
        let mut crc = Crc32::new();
        crc.update(payload);
        if crc.finalize() != stored_crc {
            return Err(TinySqlError::RecoveryCorrupt(format!(
                "checksum mismatch at wal offset {}",
                offset
            )));
        }
        let record: WalRecord = bincode::deserialize(payload)
            .map_err(|e| TinySqlError::RecoveryCorrupt(format!("malformed wal record at offset {}: {}", offset, e)))?;
        records.push(record);
        offset += len + 4;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::record::Change;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let handle = WalHandle::open(path.clone(), WalConfig::synchronous()).unwrap();

        let record = WalRecord { txn_id: 1, timestamp: 42, changes: vec![Change::TableDropped { tenant: "acme".into(), table: "t".into() }] };
        let lsn = handle.append(record).unwrap();
        assert_eq!(lsn, 1);
        drop(handle);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].txn_id, 1);
    }

    #[test]
    fn truncated_tail_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let handle = WalHandle::open(path.clone(), WalConfig::synchronous()).unwrap();
            handle.append(WalRecord { txn_id: 1, timestamp: 1, changes: vec![] }).unwrap();
        }
        // Append a partial record length prefix with no payload.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        }
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn corrupted_middle_record_stops_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let handle = WalHandle::open(path.clone(), WalConfig::synchronous()).unwrap();
            handle.append(WalRecord { txn_id: 1, timestamp: 1, changes: vec![] }).unwrap();
            handle.append(WalRecord { txn_id: 2, timestamp: 2, changes: vec![] }).unwrap();
        }
        // Flip a byte inside the first record's payload to break its checksum.
        {
            let mut bytes = std::fs::read(&path).unwrap();
            bytes[5] ^= 0xFF;
            std::fs::write(&path, bytes).unwrap();
        }
        let err = read_records(&path).unwrap_err();
        assert_eq!(err.kind_name(), "recovery-corrupt");
    }
}
