//! Bounded, lock-minimal FIFO with O(1) lookup and removal by key, used to
//! pipeline per-chunk work units across worker threads.

pub mod indexed_queue;

pub use indexed_queue::{IndexedQueue, MAX_CAPACITY, QueueElement};
