//! Reader/writer admission control (C5).
//!
//! Grounded on the teacher's `FsyncState` in `engines/granite/wal.rs`: the same
//! fast-path-atomic-check-then-condvar-wait-with-deadline shape, generalized from "wait
//! for a durable LSN" to "wait for a free permit". Capacity zero means unbounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Result, TinySqlError};

/// Per-call cancellation and deadline, threaded through every blocking operation.
#[derive(Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn background() -> Self {
        Self { deadline: None, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self { deadline: Some(Instant::now() + timeout), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether this context's deadline (if any) has passed.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Checked at a safe point during execution (row batch boundary for scans, per-row
    /// for joins): fails fast once the caller cancelled or the context's deadline (e.g. a
    /// scheduled job's `maxRuntimeMs`) has passed, so a long-running statement is actually
    /// interrupted rather than just having its admission wait bounded.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(TinySqlError::Cancelled("context cancelled".into()));
        }
        if self.deadline_exceeded() {
            return Err(TinySqlError::Cancelled("context deadline exceeded".into()));
        }
        Ok(())
    }

    /// Clip a busy-timeout to whatever is left on this context's deadline, if sooner.
    fn clip(&self, busy_timeout: Duration) -> Duration {
        match self.deadline {
            Some(d) => {
                let remaining = d.saturating_duration_since(Instant::now());
                remaining.min(busy_timeout)
            }
            None => busy_timeout,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitKind {
    Reader,
    Writer,
}

/// A bounded counting semaphore with busy-timeout and cancellation. Capacity 0 means
/// unbounded: `acquire` always succeeds immediately.
pub struct Semaphore {
    capacity: usize,
    available: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, available: Mutex::new(capacity), condvar: Condvar::new() }
    }

    pub fn is_unbounded(&self) -> bool {
        self.capacity == 0
    }

    fn try_acquire(&self) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let mut available = self.available.lock().unwrap();
        if *available > 0 {
            *available -= 1;
            true
        } else {
            false
        }
    }

    /// Acquire a permit, honoring cancellation and a busy-timeout clipped to `ctx`'s
    /// remaining deadline.
    pub fn acquire(&self, ctx: &Context, busy_timeout: Duration) -> Result<Permit<'_>> {
        if ctx.is_cancelled() {
            return Err(TinySqlError::Cancelled("context cancelled before admission".into()));
        }
        if self.try_acquire() {
            return Ok(Permit::new(self));
        }

        let timeout = ctx.clip(busy_timeout);
        let deadline = Instant::now() + timeout;
        let mut available = self.available.lock().unwrap();
        loop {
            if *available > 0 {
                *available -= 1;
                return Ok(Permit::new(self));
            }
            if ctx.is_cancelled() {
                return Err(TinySqlError::Cancelled("context cancelled while waiting for admission".into()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TinySqlError::BusyTimeout("timed out waiting for an admission permit".into()));
            }
            let (guard, result) = self.condvar.wait_timeout(available, deadline - now).unwrap();
            available = guard;
            if result.timed_out() && *available == 0 {
                if ctx.is_cancelled() {
                    return Err(TinySqlError::Cancelled("context cancelled while waiting for admission".into()));
                }
                return Err(TinySqlError::BusyTimeout("timed out waiting for an admission permit".into()));
            }
        }
    }

    /// Release never blocks and is idempotent against an empty (unbounded) semaphore;
    /// `Permit::drop` is the only caller.
    fn release(&self) {
        if self.is_unbounded() {
            return;
        }
        let mut available = self.available.lock().unwrap();
        if *available < self.capacity {
            *available += 1;
        }
        self.condvar.notify_one();
    }
}

/// RAII guard for an acquired permit. Releasing twice is a no-op.
pub struct Permit<'a> {
    sem: &'a Semaphore,
    released: AtomicBool,
}

impl<'a> Permit<'a> {
    fn new(sem: &'a Semaphore) -> Self {
        Self { sem, released: AtomicBool::new(false) }
    }

    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.sem.release();
        }
    }
}

impl<'a> Drop for Permit<'a> {
    fn drop(&mut self) {
        self.release();
    }
}

/// The pair of semaphores (readers, writers) shared by the connection pipeline and the
/// transaction manager.
pub struct Admission {
    pub readers: Semaphore,
    pub writers: Semaphore,
    pub busy_timeout: Duration,
}

impl Admission {
    pub fn new(reader_capacity: usize, writer_capacity: usize, busy_timeout: Duration) -> Self {
        Self { readers: Semaphore::new(reader_capacity), writers: Semaphore::new(writer_capacity), busy_timeout }
    }

    pub fn acquire(&self, kind: PermitKind, ctx: &Context) -> Result<Permit<'_>> {
        match kind {
            PermitKind::Reader => self.readers.acquire(ctx, self.busy_timeout),
            PermitKind::Writer => self.writers.acquire(ctx, self.busy_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_semaphore_never_blocks() {
        let sem = Semaphore::new(0);
        let ctx = Context::background();
        let _a = sem.acquire(&ctx, Duration::from_millis(10)).unwrap();
        let _b = sem.acquire(&ctx, Duration::from_millis(10)).unwrap();
    }

    #[test]
    fn bounded_semaphore_times_out_when_exhausted() {
        let sem = Semaphore::new(1);
        let ctx = Context::background();
        let _permit = sem.acquire(&ctx, Duration::from_millis(10)).unwrap();
        let err = sem.acquire(&ctx, Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.kind_name(), "busy-timeout");
    }

    #[test]
    fn releasing_a_permit_frees_capacity_for_the_next_waiter() {
        let sem = Semaphore::new(1);
        let ctx = Context::background();
        let permit = sem.acquire(&ctx, Duration::from_millis(10)).unwrap();
        drop(permit);
        assert!(sem.acquire(&ctx, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn cancelled_context_fails_fast() {
        let sem = Semaphore::new(1);
        let ctx = Context::background();
        let _held = sem.acquire(&ctx, Duration::from_millis(100)).unwrap();
        let waiter_ctx = Context::background();
        waiter_ctx.cancel();
        let err = sem.acquire(&waiter_ctx, Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.kind_name(), "cancelled");
    }
}
