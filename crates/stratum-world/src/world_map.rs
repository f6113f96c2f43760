//! The world map collaborator interface and an in-memory implementation.
//!
//! The pipeline does not own chunk storage topology; it talks to a
//! [`WorldMap`]. [`GridWorld`] is the concrete in-memory map used by the
//! loader and by tests: a hash grid of chunks with a drainable
//! dirty-notification log, per-column height maps, and a block behavior
//! table.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use stratum_voxel::heightmap::NO_BLOCKER;
use stratum_voxel::{
    BlockId, BlockTypeRegistry, Chunk, ColumnHeightMap, ShutdownFlag,
};

use crate::behavior::BlockBehavior;
use crate::coords::{BlockPos, CHUNK_MASK, CHUNK_SHIFT, ChunkCoord};

/// How a dirty chunk should be reprocessed downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyParams {
    /// Process ahead of normal-priority work.
    pub high_priority: bool,
    /// Recompute sunlight for the chunk.
    pub relight_sun: bool,
    /// Only the chunk edge changed relative to a neighbor's edit: remesh
    /// without a full relight. Purely a hint — consumers may ignore it.
    pub edge_only: bool,
}

impl DirtyParams {
    /// Parameters for a chunk whose content changed.
    pub fn edited() -> Self {
        Self {
            high_priority: false,
            relight_sun: true,
            edge_only: false,
        }
    }

    /// Parameters for a neighbor whose data did not change but whose
    /// rendered geometry depends on the edited boundary cells.
    pub fn edge_hint() -> Self {
        Self {
            high_priority: false,
            relight_sun: false,
            edge_only: true,
        }
    }
}

/// One recorded dirty-mark call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyNotification {
    /// The chunk that was marked.
    pub coord: ChunkCoord,
    /// The parameters it was marked with.
    pub params: DirtyParams,
}

/// Chunk storage and auxiliary state as seen by the mutation pipeline.
pub trait WorldMap {
    /// The chunk at `coord`, if loaded.
    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk>;

    /// Mutable access to the chunk at `coord`, if loaded.
    fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk>;

    /// Signals that a chunk needs downstream reprocessing.
    fn mark_chunk_dirty(&mut self, coord: ChunkCoord, params: DirtyParams);

    /// The session's block type table.
    fn registry(&self) -> &BlockTypeRegistry;

    /// The behavior hooks registered for a block id, if any.
    fn behavior(&self, id: BlockId) -> Option<Arc<dyn BlockBehavior>>;

    /// Notifies the block entity at `pos` that its block identity was
    /// exchanged in place.
    fn notify_block_entity_exchange(&mut self, pos: BlockPos, new_id: BlockId);

    /// Recomputes the rain/sunlight height entry for the column of `pos`
    /// after `old` was replaced by `new`.
    fn update_column_height(&mut self, pos: BlockPos, old: BlockId, new: BlockId);

    /// The shared shutdown flag observed by lock waits.
    fn shutdown(&self) -> Arc<ShutdownFlag>;
}

/// In-memory chunk grid with recording collaborator endpoints.
pub struct GridWorld {
    chunks: FxHashMap<ChunkCoord, Chunk>,
    registry: BlockTypeRegistry,
    behaviors: FxHashMap<BlockId, Arc<dyn BlockBehavior>>,
    /// Rain/sun height maps keyed by chunk column `(x, z)`.
    heights: FxHashMap<(i32, i32), ColumnHeightMap>,
    dirty_log: Vec<DirtyNotification>,
    entity_log: Vec<(BlockPos, BlockId)>,
    shutdown: Arc<ShutdownFlag>,
}

impl GridWorld {
    /// Creates an empty world around the given registry.
    pub fn new(registry: BlockTypeRegistry) -> Self {
        Self {
            chunks: FxHashMap::default(),
            registry,
            behaviors: FxHashMap::default(),
            heights: FxHashMap::default(),
            dirty_log: Vec::new(),
            entity_log: Vec::new(),
            shutdown: Arc::new(ShutdownFlag::new()),
        }
    }

    /// Inserts (or replaces) a chunk at `coord`.
    pub fn insert_chunk(&mut self, coord: ChunkCoord, chunk: Chunk) {
        self.chunks.insert(coord, chunk);
    }

    /// Removes and returns the chunk at `coord`.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.remove(&coord)
    }

    /// Number of loaded chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Registers behavior hooks for a block id.
    pub fn set_behavior(&mut self, id: BlockId, behavior: Arc<dyn BlockBehavior>) {
        self.behaviors.insert(id, behavior);
    }

    /// Drains the recorded dirty-mark calls.
    pub fn drain_dirty(&mut self) -> Vec<DirtyNotification> {
        std::mem::take(&mut self.dirty_log)
    }

    /// Drains the recorded block-entity exchange notifications.
    pub fn drain_entity_notifications(&mut self) -> Vec<(BlockPos, BlockId)> {
        std::mem::take(&mut self.entity_log)
    }

    /// The stored rain/sun height for the column containing world `(x, z)`,
    /// or [`NO_BLOCKER`] if nothing in the column stops rain.
    pub fn column_height(&self, x: i32, z: i32) -> i32 {
        let key = (x >> CHUNK_SHIFT, z >> CHUNK_SHIFT);
        let (lx, lz) = ((x & CHUNK_MASK) as usize, (z & CHUNK_MASK) as usize);
        self.heights.get(&key).map_or(NO_BLOCKER, |m| m.get(lx, lz))
    }

    /// Scans downward from below `pos` for the next rain blocker. Stops at
    /// the first unloaded chunk (the column is only known while loaded).
    fn scan_down_for_blocker(&self, pos: BlockPos) -> i32 {
        let (lx, _, lz) = pos.local();
        let mut y = pos.y - 1;
        loop {
            let coord = ChunkCoord::new(pos.x >> CHUNK_SHIFT, y >> CHUNK_SHIFT, pos.z >> CHUNK_SHIFT);
            let Some(chunk) = self.chunks.get(&coord) else {
                return NO_BLOCKER;
            };
            let ly = (y & CHUNK_MASK) as usize;
            if self.registry.blocks_rain(chunk.solid_block(lx, ly, lz)) {
                return y;
            }
            y -= 1;
        }
    }
}

impl WorldMap for GridWorld {
    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    fn mark_chunk_dirty(&mut self, coord: ChunkCoord, params: DirtyParams) {
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.mark_dirty(stratum_voxel::MESH_DIRTY | stratum_voxel::SAVE_DIRTY);
        }
        self.dirty_log.push(DirtyNotification { coord, params });
    }

    fn registry(&self) -> &BlockTypeRegistry {
        &self.registry
    }

    fn behavior(&self, id: BlockId) -> Option<Arc<dyn BlockBehavior>> {
        self.behaviors.get(&id).map(Arc::clone)
    }

    fn notify_block_entity_exchange(&mut self, pos: BlockPos, new_id: BlockId) {
        self.entity_log.push((pos, new_id));
    }

    fn update_column_height(&mut self, pos: BlockPos, old: BlockId, new: BlockId) {
        let key = (pos.x >> CHUNK_SHIFT, pos.z >> CHUNK_SHIFT);
        let (lx, _, lz) = pos.local();
        let top = self.heights.get(&key).map_or(NO_BLOCKER, |m| m.get(lx, lz));

        if self.registry.blocks_rain(new) {
            if pos.y > top {
                self.heights.entry(key).or_default().set(lx, lz, pos.y);
            }
        } else if self.registry.blocks_rain(old) && pos.y == top {
            // The top blocker was removed; rescan downward.
            let next = self.scan_down_for_blocker(pos);
            self.heights.entry(key).or_default().set(lx, lz, next);
        }
    }

    fn shutdown(&self) -> Arc<ShutdownFlag> {
        Arc::clone(&self.shutdown)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
