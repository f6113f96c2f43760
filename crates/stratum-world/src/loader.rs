//! Background chunk loading: worker threads pull decode jobs from the
//! indexed queue, rebuild palette layers from their compressed form, and
//! deliver finished chunks for release into the world map.
//!
//! Jobs stay addressable by chunk coordinate while queued *and* while being
//! decoded (the workers dequeue without releasing the key), so duplicate
//! submissions and cancellations stay O(1) against in-flight work.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

use stratum_codec::active_codec;
use stratum_config::EngineConfig;
use stratum_queue::{IndexedQueue, QueueElement};
use stratum_voxel::{Chunk, ChunkSerError, ShutdownFlag, layer_from_bytes};

use crate::coords::ChunkCoord;
use crate::world_map::GridWorld;

/// A unit of chunk-load work: the coordinate plus the compressed layer blobs
/// read from persistence or received from the network.
#[derive(Clone, Debug)]
pub struct ChunkLoadJob {
    /// Destination chunk coordinate.
    pub coord: ChunkCoord,
    /// Compressed solid layer (combined encoding).
    pub solid: Vec<u8>,
    /// Compressed fluid layer, if the chunk has one.
    pub fluid: Option<Vec<u8>>,
}

impl QueueElement for ChunkLoadJob {
    fn queue_index(&self) -> u64 {
        self.coord.packed()
    }
}

/// A decoded chunk ready for insertion into the world map.
#[derive(Debug)]
pub struct LoadedChunk {
    /// The coordinate from the originating job.
    pub coord: ChunkCoord,
    /// The decoded chunk.
    pub chunk: Chunk,
}

/// Worker pool that decodes [`ChunkLoadJob`]s off the indexed queue.
pub struct ChunkLoadPool {
    queue: Arc<IndexedQueue<ChunkLoadJob>>,
    results: Receiver<LoadedChunk>,
    shutdown: Arc<ShutdownFlag>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl ChunkLoadPool {
    /// Spawns `threads` named workers over a queue of `queue_capacity` and a
    /// bounded result channel of `result_capacity`.
    pub fn new(threads: usize, queue_capacity: usize, result_capacity: usize) -> Self {
        let queue = Arc::new(IndexedQueue::new(queue_capacity));
        let (sender, results) = bounded(result_capacity);
        let shutdown = Arc::new(ShutdownFlag::new());

        let workers = (0..threads.max(1))
            .map(|_| {
                let queue = Arc::clone(&queue);
                let sender: Sender<LoadedChunk> = sender.clone();
                let shutdown = Arc::clone(&shutdown);
                std::thread::Builder::new()
                    .name("chunk-load-worker".into())
                    .spawn(move || worker_loop(&queue, &sender, &shutdown))
                    .expect("failed to spawn chunk load worker")
            })
            .collect();

        Self {
            queue,
            results,
            shutdown,
            workers,
        }
    }

    /// Builds a pool from configuration. A worker count of 0 derives one
    /// from the CPU count, leaving headroom for the simulation thread.
    pub fn from_config(config: &EngineConfig) -> Self {
        let threads = if config.load.worker_threads == 0 {
            (num_cpus::get().saturating_sub(2)).max(1)
        } else {
            config.load.worker_threads
        };
        Self::new(
            threads,
            config.queue.load_capacity,
            config.load.result_capacity,
        )
    }

    /// Submits a load job. Returns `false` if a job for the same chunk is
    /// already queued or in flight.
    ///
    /// # Panics
    ///
    /// Panics on queue overflow — the configured capacity is undersized.
    pub fn submit(&self, job: ChunkLoadJob) -> bool {
        if self.queue.contains(job.queue_index()) {
            tracing::debug!(coord = ?job.coord, "duplicate load submission ignored");
            return false;
        }
        self.queue.enqueue(job);
        true
    }

    /// `true` while a job for `coord` is queued or decoding.
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.queue.contains(coord.packed())
    }

    /// Cancels a queued job. Jobs already decoding still complete.
    pub fn cancel(&self, coord: ChunkCoord) -> bool {
        self.queue.remove(coord.packed())
    }

    /// Approximate number of queued (not yet decoding) jobs.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Drains finished chunks into the world map. Call from the thread that
    /// owns the map; returns the number of chunks released.
    pub fn drain_into(&self, world: &mut GridWorld) -> usize {
        let mut released = 0;
        while let Ok(loaded) = self.results.try_recv() {
            world.insert_chunk(loaded.coord, loaded.chunk);
            released += 1;
        }
        released
    }

    /// Drains finished chunks without a world map (tests, custom stores).
    pub fn drain_results(&self) -> Vec<LoadedChunk> {
        let mut out = Vec::new();
        while let Ok(loaded) = self.results.try_recv() {
            out.push(loaded);
        }
        out
    }

    /// Signals shutdown and joins the workers.
    pub fn shutdown(&mut self) {
        self.shutdown.trigger();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ChunkLoadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    queue: &IndexedQueue<ChunkLoadJob>,
    sender: &Sender<LoadedChunk>,
    shutdown: &ShutdownFlag,
) {
    while !shutdown.is_shutting_down() {
        let Some(job) = queue.dequeue_keep_index() else {
            std::thread::sleep(Duration::from_micros(200));
            continue;
        };
        let key = job.queue_index();
        match decode_job(job) {
            Ok(loaded) => {
                // Releasing the key doubles as the cancellation check: a
                // `cancel` that won the race already removed it, and the
                // decoded chunk is discarded.
                if queue.remove(key) && sender.send(loaded).is_err() {
                    // Receiver dropped; the pool is going away.
                    return;
                }
            }
            Err(e) => {
                queue.remove(key);
                tracing::warn!("chunk load job failed to decode: {e}");
            }
        }
    }
}

fn decode_job(job: ChunkLoadJob) -> Result<LoadedChunk, ChunkSerError> {
    let codec = active_codec();
    let solid = layer_from_bytes(&job.solid, &*codec)?;
    let fluid = match &job.fluid {
        Some(bytes) => Some(layer_from_bytes(bytes, &*codec)?),
        None => None,
    };
    Ok(LoadedChunk {
        coord: job.coord,
        chunk: Chunk::from_layers(solid, fluid),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use stratum_voxel::{BlockId, BlockTypeRegistry, PaletteLayer, cell_index, layer_to_bytes};

    fn job_for(coord: ChunkCoord, id: BlockId) -> ChunkLoadJob {
        let codec = active_codec();
        let mut solid = PaletteLayer::new();
        solid.set(cell_index(1, 2, 3), id);
        ChunkLoadJob {
            coord,
            solid: layer_to_bytes(&solid, &*codec),
            fluid: None,
        }
    }

    fn drain_all(pool: &ChunkLoadPool, expected: usize) -> Vec<LoadedChunk> {
        let mut out = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while out.len() < expected && Instant::now() < deadline {
            out.extend(pool.drain_results());
            std::thread::sleep(Duration::from_millis(2));
        }
        out
    }

    #[test]
    fn test_all_submitted_jobs_are_delivered() {
        let pool = ChunkLoadPool::new(3, 64, 64);
        let mut submitted = 0;
        for x in 0..4 {
            for z in 0..4 {
                if pool.submit(job_for(ChunkCoord::new(x, 0, z), BlockId(5))) {
                    submitted += 1;
                }
            }
        }
        let results = drain_all(&pool, submitted);
        assert_eq!(results.len(), submitted);
        for loaded in &results {
            assert_eq!(loaded.chunk.solid_block(1, 2, 3), BlockId(5));
        }
    }

    #[test]
    fn test_duplicate_submission_is_ignored() {
        let pool = ChunkLoadPool::new(0, 32, 32); // 0 clamps to 1 worker
        let coord = ChunkCoord::new(7, 7, 7);
        // Saturate with unrelated work so the duplicate usually stays queued.
        for i in 0..8 {
            pool.submit(job_for(ChunkCoord::new(i, 1, 0), BlockId(1)));
        }
        let first = pool.submit(job_for(coord, BlockId(1)));
        let second = pool.submit(job_for(coord, BlockId(2)));
        assert!(first);

        // If the duplicate was rejected, the chunk is delivered exactly once.
        let expected = 9 + usize::from(second);
        let results = drain_all(&pool, expected);
        let deliveries = results.iter().filter(|l| l.coord == coord).count();
        assert_eq!(deliveries, expected - 8);
    }

    #[test]
    fn test_drain_into_world_releases_chunks() {
        let pool = ChunkLoadPool::new(2, 16, 16);
        let mut world = GridWorld::new(BlockTypeRegistry::new());
        let coord = ChunkCoord::new(2, 3, 4);
        pool.submit(job_for(coord, BlockId(9)));

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut released = 0;
        while released == 0 && Instant::now() < deadline {
            released = pool.drain_into(&mut world);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(released, 1);
        assert_eq!(world.chunk(coord).unwrap().solid_block(1, 2, 3), BlockId(9));
        assert!(!pool.is_pending(coord));
    }

    #[test]
    fn test_corrupt_job_is_dropped_not_fatal() {
        let pool = ChunkLoadPool::new(1, 16, 16);
        let coord = ChunkCoord::new(1, 1, 1);
        pool.submit(ChunkLoadJob {
            coord,
            solid: vec![0xDE, 0xAD],
            fluid: None,
        });
        // A good job after the bad one still comes through.
        let good = ChunkCoord::new(2, 2, 2);
        pool.submit(job_for(good, BlockId(3)));

        let results = drain_all(&pool, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].coord, good);
    }

    #[test]
    fn test_cancel_before_decode() {
        let pool = ChunkLoadPool::new(0, 64, 64);
        // Pile up work so the target sits in the queue.
        for i in 0..16 {
            pool.submit(job_for(ChunkCoord::new(i, 2, 0), BlockId(1)));
        }
        let target = ChunkCoord::new(99, 2, 0);
        pool.submit(job_for(target, BlockId(1)));

        // Cancellation is best-effort: it wins unless a worker got there first.
        let cancelled = pool.cancel(target);
        let results = drain_all(&pool, if cancelled { 16 } else { 17 });
        let delivered = results.iter().any(|l| l.coord == target);
        assert_eq!(delivered, !cancelled);
    }

    #[test]
    fn test_shutdown_joins_workers() {
        let mut pool = ChunkLoadPool::new(4, 16, 16);
        pool.submit(job_for(ChunkCoord::new(0, 0, 0), BlockId(1)));
        pool.shutdown();
        assert!(pool.workers.is_empty());
    }
}
