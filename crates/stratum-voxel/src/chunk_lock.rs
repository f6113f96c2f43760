//! Spin-based reader/writer lock with independent writer slots.
//!
//! One `AtomicI32` word encodes the whole lock state: `0` is free, a positive
//! value is the reader count, and a negative value is the sign bit plus a
//! bitmask of up to 31 held writer slots. Writers using *disjoint* slot bits
//! interleave freely on the same lock — the invariant that their slots guard
//! disjoint data is the caller's responsibility. Writers using the *same* bit
//! exclude each other, and readers exclude all writers.
//!
//! Critical sections here are a handful of bit-word operations, so waiting is
//! a busy spin rather than a kernel block. Every spin iteration observes the
//! shared [`ShutdownFlag`] and aborts instead of deadlocking a terminating
//! process.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use thiserror::Error;

use crate::shutdown::ShutdownFlag;

/// Sign bit: set while any writer slot is held.
const WRITER_SIGN: i32 = i32::MIN;

/// An exclusive writer slot: exactly one of bits 0..=30.
///
/// Callers that use distinct slots on one lock must never touch the same
/// underlying data — the lock cannot check that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterBit(i32);

impl WriterBit {
    /// Slot `n` of 31 (0..=30).
    ///
    /// # Panics
    ///
    /// Panics if `n >= 31`.
    pub const fn new(n: u32) -> Self {
        assert!(n < 31, "writer slots are bits 0..=30");
        Self(1 << n)
    }
}

/// Failure modes of a lock acquisition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    /// The wait was abandoned because the process is shutting down.
    #[error("lock wait abandoned: shutting down")]
    ShuttingDown,
}

/// The reader/writer lock guarding one chunk data layer.
///
/// Purely a synchronization primitive — it owns no data and keeps no
/// ownership metadata beyond the counter word.
#[derive(Debug, Default)]
pub struct ChunkLock {
    state: AtomicI32,
    /// Set while a reader is waiting to get in; writers yield to it before
    /// acquiring so a stream of writers cannot starve readers.
    read_pending: AtomicBool,
}

impl ChunkLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a shared read lock. Reads never block other reads.
    pub fn acquire_read(&self, shutdown: &ShutdownFlag) -> Result<(), LockError> {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state >= 0 {
                if self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.read_pending.store(false, Ordering::Release);
                    return Ok(());
                }
            } else {
                // A writer holds the lock; announce intent so writers yield.
                self.read_pending.store(true, Ordering::Release);
                if shutdown.is_shutting_down() {
                    self.read_pending.store(false, Ordering::Release);
                    return Err(LockError::ShuttingDown);
                }
                std::hint::spin_loop();
            }
        }
    }

    /// Releases a read lock acquired with [`acquire_read`](Self::acquire_read).
    pub fn release_read(&self) {
        let prev = self.state.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "release_read without a matching acquire");
    }

    /// Acquires the writer slot `bit`.
    ///
    /// Succeeds immediately when no reader holds the lock and `bit` is free —
    /// even while *other* writer slots are held. Spins while readers are in
    /// or the same slot is taken.
    pub fn acquire_write(&self, bit: WriterBit, shutdown: &ShutdownFlag) -> Result<(), LockError> {
        // Cooperative yield: let a waiting reader through first.
        while self.read_pending.load(Ordering::Acquire) {
            if shutdown.is_shutting_down() {
                return Err(LockError::ShuttingDown);
            }
            std::thread::yield_now();
        }
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state > 0 || (state < 0 && state & bit.0 != 0) {
                // Readers hold the lock, or this slot is already taken.
                if shutdown.is_shutting_down() {
                    return Err(LockError::ShuttingDown);
                }
                std::hint::spin_loop();
                continue;
            }
            let next = state | bit.0 | WRITER_SIGN;
            if self
                .state
                .compare_exchange_weak(state, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
            std::hint::spin_loop();
        }
    }

    /// Releases the writer slot `bit`. Dropping the last held slot returns
    /// the lock to the free state.
    pub fn release_write(&self, bit: WriterBit) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                debug_assert!(state < 0 && state & bit.0 != 0, "release of an unheld writer slot");
                let cleared = state & !bit.0;
                Some(if cleared == WRITER_SIGN { 0 } else { cleared })
            });
    }

    /// RAII read lock.
    pub fn read_guard<'a>(&'a self, shutdown: &ShutdownFlag) -> Result<ReadGuard<'a>, LockError> {
        self.acquire_read(shutdown)?;
        Ok(ReadGuard { lock: self })
    }

    /// RAII write lock for slot `bit`.
    pub fn write_guard<'a>(
        &'a self,
        bit: WriterBit,
        shutdown: &ShutdownFlag,
    ) -> Result<WriteGuard<'a>, LockError> {
        self.acquire_write(bit, shutdown)?;
        Ok(WriteGuard { lock: self, bit })
    }
}

/// Releases the read lock on drop.
pub struct ReadGuard<'a> {
    lock: &'a ChunkLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Releases the writer slot on drop.
pub struct WriteGuard<'a> {
    lock: &'a ChunkLock,
    bit: WriterBit,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write(self.bit);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
