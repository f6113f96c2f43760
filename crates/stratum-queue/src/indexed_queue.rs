//! A bounded multi-producer multi-consumer FIFO with an O(1) key index.
//!
//! The ring uses two cursor pairs per end: a *reserved* cursor that producers
//! (or consumers) race to advance with compare-and-swap, and a *published*
//! cursor that trails it. A thread that wins a reservation owns that slot
//! exclusively; the publish step makes the slot visible to the other side in
//! reservation order. Cursors only move forward, so size queries are
//! approximate under concurrent mutation but never observe torn state.
//!
//! Elements removed by key are tombstoned in place and reclaimed as the FIFO
//! cursor passes over them.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;

/// Hard upper bound on queue capacity.
pub const MAX_CAPACITY: usize = 65_536;

/// A work unit with a stable 64-bit key used for both FIFO bookkeeping and
/// direct lookup/removal.
pub trait QueueElement {
    /// The element's stable key. Must not change while the element is queued.
    fn queue_index(&self) -> u64;
}

struct Entry<T> {
    key: u64,
    item: Mutex<Option<T>>,
    disposed: AtomicBool,
}

struct Slot<T> {
    cell: Mutex<Option<Arc<Entry<T>>>>,
}

/// Bounded concurrent FIFO with O(1) index lookup and removal-by-key.
///
/// Capacity is rounded up to a power of two (at most [`MAX_CAPACITY`]).
/// All coordination is internal; callers never need their own locking.
pub struct IndexedQueue<T: QueueElement> {
    slots: Box<[Slot<T>]>,
    mask: u64,
    tail_reserved: AtomicU64,
    tail_published: AtomicU64,
    head_reserved: AtomicU64,
    head_published: AtomicU64,
    index: DashMap<u64, Arc<Entry<T>>>,
}

impl<T: QueueElement> IndexedQueue<T> {
    /// Creates a queue holding at least `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds [`MAX_CAPACITY`] — the
    /// capacity is a deployment constant, so a bad value is a configuration
    /// error, not a runtime condition.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "indexed queue capacity must be non-zero");
        assert!(
            capacity <= MAX_CAPACITY,
            "indexed queue capacity {capacity} exceeds the maximum of {MAX_CAPACITY}"
        );
        let capacity = capacity.next_power_of_two();
        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|_| Slot {
                cell: Mutex::new(None),
            })
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity as u64 - 1,
            tail_reserved: AtomicU64::new(0),
            tail_published: AtomicU64::new(0),
            head_reserved: AtomicU64::new(0),
            head_published: AtomicU64::new(0),
            index: DashMap::new(),
        }
    }

    /// The rounded-up slot count.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of queued slots (including tombstoned entries not
    /// yet passed over).
    pub fn len(&self) -> usize {
        let tail = self.tail_published.load(Ordering::Acquire);
        let head = self.head_published.load(Ordering::Acquire);
        tail.saturating_sub(head) as usize
    }

    /// Approximate emptiness.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate fullness.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Enqueues an element, transferring ownership into the queue.
    ///
    /// The element is inserted into the key index first, then published into
    /// the ring, so a concurrent [`lookup`](Self::lookup) can observe it as
    /// soon as it is queued.
    ///
    /// # Panics
    ///
    /// Panics when more in-flight reservations exist than slots — that is a
    /// fatal configuration error (the capacity constant is undersized for
    /// the workload), not a transient condition.
    pub fn enqueue(&self, elem: T) {
        let key = elem.queue_index();
        let entry = Arc::new(Entry {
            key,
            item: Mutex::new(Some(elem)),
            disposed: AtomicBool::new(false),
        });
        self.index.insert(key, Arc::clone(&entry));
        let pos = self.reserve_tail(false);
        self.publish_tail(pos, entry);
    }

    /// Dequeues the oldest element and removes it from the key index.
    pub fn dequeue(&self) -> Option<T> {
        self.dequeue_inner(true)
    }

    /// Dequeues the oldest element but leaves it in the key index, so it
    /// stays addressable (for [`contains`](Self::contains) checks and
    /// [`remove`](Self::remove)) while in flight. The caller is responsible
    /// for releasing the key with [`remove`](Self::remove) once done.
    pub fn dequeue_keep_index(&self) -> Option<T> {
        self.dequeue_inner(false)
    }

    /// Returns `true` if an element with this key is queued or in flight.
    pub fn contains(&self, key: u64) -> bool {
        self.index.contains_key(&key)
    }

    /// Applies `f` to the element with this key, if it is still resident in
    /// the queue. Returns `None` for unknown keys and for elements whose
    /// payload has already been handed to a consumer.
    pub fn lookup<R>(&self, key: u64, f: impl FnOnce(&T) -> R) -> Option<R> {
        let entry = self.index.get(&key)?;
        let guard = entry.item.lock().expect("queue entry poisoned");
        guard.as_ref().map(f)
    }

    /// Removes the element with this key from the index and tombstones it in
    /// place; the physical slot is reclaimed as the FIFO passes over it.
    ///
    /// Returns `true` if the key was present. Unknown keys are a local
    /// no-op, never an error.
    pub fn remove(&self, key: u64) -> bool {
        match self.index.remove(&key) {
            Some((_, entry)) => {
                entry.disposed.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Rotates the oldest element to the newest position, deferring it
    /// without losing its place relative to later arrivals.
    ///
    /// On a momentarily full ring the freed head slot is the same physical
    /// slot the tail reservation lands on, so the rotation degenerates to
    /// advancing all four cursors in lockstep.
    pub fn requeue(&self) {
        let Some((_, entry)) = self.pop_entry() else {
            return;
        };
        // Cannot overflow in steady state (the pop just freed a slot); if a
        // racing producer snatches it, wait for space instead of failing.
        let pos = self.reserve_tail(true);
        self.publish_tail(pos, entry);
    }

    fn dequeue_inner(&self, remove_index: bool) -> Option<T> {
        loop {
            let (_, entry) = self.pop_entry()?;
            if entry.disposed.load(Ordering::Acquire) {
                // Removed by key while queued; skip and reclaim the slot.
                continue;
            }
            if remove_index {
                self.index.remove(&entry.key);
            }
            let item = entry.item.lock().expect("queue entry poisoned").take();
            match item {
                Some(item) => return Some(item),
                None => continue,
            }
        }
    }

    /// Claims a tail slot via the reserved cursor. `wait_for_space` selects
    /// between spinning (requeue) and the fatal overflow path (enqueue).
    fn reserve_tail(&self, wait_for_space: bool) -> u64 {
        loop {
            let tail = self.tail_reserved.load(Ordering::Acquire);
            let head = self.head_published.load(Ordering::Acquire);
            if tail.wrapping_sub(head) >= self.capacity() as u64 {
                if wait_for_space {
                    std::hint::spin_loop();
                    continue;
                }
                panic!(
                    "indexed queue overflow: capacity {} exceeded — the capacity constant is undersized for this workload",
                    self.capacity()
                );
            }
            if self
                .tail_reserved
                .compare_exchange_weak(tail, tail + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return tail;
            }
            std::hint::spin_loop();
        }
    }

    fn publish_tail(&self, pos: u64, entry: Arc<Entry<T>>) {
        {
            let mut cell = self.slots[(pos & self.mask) as usize]
                .cell
                .lock()
                .expect("queue slot poisoned");
            *cell = Some(entry);
        }
        // Publish in reservation order: earlier producers publish first.
        while self
            .tail_published
            .compare_exchange_weak(pos, pos + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    /// Claims and drains the head slot. Returns the reservation position and
    /// the slot's entry.
    fn pop_entry(&self) -> Option<(u64, Arc<Entry<T>>)> {
        let pos = loop {
            let head = self.head_reserved.load(Ordering::Acquire);
            if head >= self.tail_published.load(Ordering::Acquire) {
                return None;
            }
            if self
                .head_reserved
                .compare_exchange_weak(head, head + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break head;
            }
            std::hint::spin_loop();
        };
        let entry = {
            let mut cell = self.slots[(pos & self.mask) as usize]
                .cell
                .lock()
                .expect("queue slot poisoned");
            cell.take()
        };
        while self
            .head_published
            .compare_exchange_weak(pos, pos + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            std::hint::spin_loop();
        }
        // By protocol a reserved head slot always holds a published entry.
        entry.map(|e| (pos, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Job(u64);

    impl QueueElement for Job {
        fn queue_index(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = IndexedQueue::new(16);
        for i in 0..10 {
            queue.enqueue(Job(i));
        }
        for i in 0..10 {
            assert_eq!(queue.dequeue(), Some(Job(i)));
        }
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_capacity_rounds_up_to_power_of_two() {
        let queue: IndexedQueue<Job> = IndexedQueue::new(100);
        assert_eq!(queue.capacity(), 128);
    }

    #[test]
    #[should_panic(expected = "capacity 200000 exceeds")]
    fn test_capacity_above_maximum_panics() {
        let _: IndexedQueue<Job> = IndexedQueue::new(200_000);
    }

    #[test]
    #[should_panic(expected = "indexed queue overflow")]
    fn test_overflow_is_fatal() {
        let queue = IndexedQueue::new(4);
        for i in 0..5 {
            queue.enqueue(Job(i));
        }
    }

    #[test]
    fn test_contains_and_lookup() {
        let queue = IndexedQueue::new(8);
        queue.enqueue(Job(42));
        assert!(queue.contains(42));
        assert_eq!(queue.lookup(42, |j| j.0 * 2), Some(84));
        assert!(!queue.contains(7));
        assert_eq!(queue.lookup(7, |j| j.0), None);
    }

    #[test]
    fn test_dequeue_removes_from_index() {
        let queue = IndexedQueue::new(8);
        queue.enqueue(Job(1));
        assert_eq!(queue.dequeue(), Some(Job(1)));
        assert!(!queue.contains(1));
    }

    #[test]
    fn test_dequeue_keep_index_leaves_key_addressable() {
        let queue = IndexedQueue::new(8);
        queue.enqueue(Job(5));
        assert_eq!(queue.dequeue_keep_index(), Some(Job(5)));
        assert!(queue.contains(5), "in-flight element stays addressable");
        // Payload is gone, but the key remains until released.
        assert_eq!(queue.lookup(5, |j| j.0), None);
        assert!(queue.remove(5));
        assert!(!queue.contains(5));
    }

    #[test]
    fn test_remove_by_key_skips_element() {
        let queue = IndexedQueue::new(8);
        queue.enqueue(Job(1));
        queue.enqueue(Job(2));
        queue.enqueue(Job(3));

        assert!(queue.remove(2));
        assert!(!queue.contains(2));

        assert_eq!(queue.dequeue(), Some(Job(1)));
        assert_eq!(queue.dequeue(), Some(Job(3)), "removed element is skipped");
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_remove_unknown_key_is_noop() {
        let queue: IndexedQueue<Job> = IndexedQueue::new(8);
        assert!(!queue.remove(99));
    }

    #[test]
    fn test_requeue_rotates_oldest_to_newest() {
        let queue = IndexedQueue::new(8);
        queue.enqueue(Job(1));
        queue.enqueue(Job(2));
        queue.enqueue(Job(3));

        queue.requeue();

        assert_eq!(queue.dequeue(), Some(Job(2)));
        assert_eq!(queue.dequeue(), Some(Job(3)));
        assert_eq!(queue.dequeue(), Some(Job(1)));
    }

    #[test]
    fn test_requeue_on_full_ring() {
        let queue = IndexedQueue::new(4);
        for i in 0..4 {
            queue.enqueue(Job(i));
        }
        assert!(queue.is_full());

        queue.requeue();

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.dequeue(), Some(Job(1)));
        assert_eq!(queue.dequeue(), Some(Job(2)));
        assert_eq!(queue.dequeue(), Some(Job(3)));
        assert_eq!(queue.dequeue(), Some(Job(0)));
    }

    #[test]
    fn test_requeue_empty_is_noop() {
        let queue: IndexedQueue<Job> = IndexedQueue::new(4);
        queue.requeue();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_len_tracks_enqueue_dequeue() {
        let queue = IndexedQueue::new(16);
        assert!(queue.is_empty());
        for i in 0..6 {
            queue.enqueue(Job(i));
        }
        assert_eq!(queue.len(), 6);
        queue.dequeue();
        queue.dequeue();
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_concurrent_enqueue_dequeue_accounting() {
        use std::sync::atomic::AtomicUsize;

        let queue = Arc::new(IndexedQueue::new(MAX_CAPACITY));
        let produced_per_thread = 2_000u64;
        let producers = 4u64;
        let dequeued = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for p in 0..producers {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                for i in 0..produced_per_thread {
                    queue.enqueue(Job(p * produced_per_thread + i));
                }
            }));
        }
        for _ in 0..2 {
            let queue = Arc::clone(&queue);
            let dequeued = Arc::clone(&dequeued);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    if queue.dequeue().is_some() {
                        dequeued.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        let total = (producers * produced_per_thread) as usize;
        let taken = dequeued.load(Ordering::Relaxed);
        assert_eq!(queue.len(), total - taken);

        // Drain and confirm every remaining element is distinct and indexed.
        let mut remaining = 0;
        while queue.dequeue().is_some() {
            remaining += 1;
        }
        assert_eq!(remaining, total - taken);
    }

    #[test]
    fn test_concurrent_producers_preserve_per_producer_order() {
        let queue = Arc::new(IndexedQueue::new(1024));
        let mut handles = Vec::new();
        for p in 0..4u64 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    queue.enqueue(Job(p * 1_000 + i));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("producer panicked");
        }

        // Single consumer: each producer's elements must come out in its own
        // submission order.
        let mut last_seen = [None::<u64>; 4];
        while let Some(Job(id)) = queue.dequeue() {
            let producer = (id / 1_000) as usize;
            let seq = id % 1_000;
            if let Some(prev) = last_seen[producer] {
                assert!(seq > prev, "producer {producer} order violated: {seq} after {prev}");
            }
            last_seen[producer] = Some(seq);
        }
    }
}
