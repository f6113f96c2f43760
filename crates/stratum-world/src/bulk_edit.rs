//! The general staged bulk-edit accumulator.
//!
//! Edits accumulate in an insertion-ordered position map (duplicates
//! overwrite), then [`BulkEditor::commit`] applies them in one pass: edits
//! are grouped by containing chunk as they appear in staging order, and each
//! contiguous same-chunk run costs exactly one lock/unpack/pack cycle —
//! the whole point of batching versus a naive per-edit apply. A staged
//! position whose chunk is not loaded is silently skipped; callers validate
//! positions.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use thiserror::Error;

use stratum_voxel::{BULK_EDIT_BIT, BlockId, LockError, ShutdownFlag};

use crate::coords::{BlockPos, ChunkCoord};
use crate::net_sync::{BulkBlockUpdate, SyncSink};
use crate::update::BlockUpdate;
use crate::world_map::{DirtyParams, WorldMap};

/// Local coordinates this close to a chunk face affect the neighbor's
/// rendered geometry and lighting.
const FACE_MARGIN: usize = 2;

/// Counters reported by a commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Edits applied to a loaded chunk.
    pub applied: usize,
    /// Edits dropped because their chunk was not loaded.
    pub skipped: usize,
    /// Chunk groups opened (lock/unpack/pack cycles).
    pub chunks_touched: usize,
}

/// Failure modes of a commit.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A lock wait observed process shutdown.
    #[error("commit interrupted: {0}")]
    ShuttingDown(#[from] LockError),
}

/// Side effects collected while a chunk's lock is held and dispatched after
/// it is released, so behaviors can freely touch the world.
pub(crate) enum HookEvent {
    Removed { pos: BlockPos, id: BlockId },
    Placed { pos: BlockPos, id: BlockId },
    Exchanged { pos: BlockPos, id: BlockId },
    Height { pos: BlockPos, old: BlockId, new: BlockId },
}

/// Staged multi-chunk bulk editor.
///
/// Lifecycle per batch: idle → staging → committing → idle.
pub struct BulkEditor {
    staged: IndexMap<BlockPos, BlockUpdate>,
    synchronize: bool,
    dirty: FxHashSet<ChunkCoord>,
    edge_dirty: FxHashSet<ChunkCoord>,
}

impl BulkEditor {
    /// Creates an editor. `synchronize` controls whether commits hand a
    /// minimal bulk update to the sync sink.
    pub fn new(synchronize: bool) -> Self {
        Self {
            staged: IndexMap::new(),
            synchronize,
            dirty: FxHashSet::default(),
            edge_dirty: FxHashSet::default(),
        }
    }

    /// Stages an edit. A second stage at the same position overwrites the
    /// first; no chunk is touched until commit.
    pub fn stage(&mut self, pos: BlockPos, new_solid: Option<BlockId>, new_fluid: Option<BlockId>) {
        self.staged.insert(pos, BlockUpdate::new(pos, new_solid, new_fluid));
    }

    /// Stages an in-place identity exchange (no placement/removal hooks).
    pub fn stage_exchange(
        &mut self,
        pos: BlockPos,
        new_solid: Option<BlockId>,
        new_fluid: Option<BlockId>,
    ) {
        self.staged
            .insert(pos, BlockUpdate::exchange(pos, new_solid, new_fluid));
    }

    /// Number of pending edits.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Applies every staged edit, signals dirty chunks and edge neighbors,
    /// optionally synchronizes, and returns to idle.
    ///
    /// # Errors
    ///
    /// Aborts with [`CommitError::ShuttingDown`] if a lock wait observes
    /// process shutdown. Once running, a commit is never cancelled by
    /// anything else.
    pub fn commit(
        &mut self,
        world: &mut dyn WorldMap,
        mut sink: Option<&mut dyn SyncSink>,
    ) -> Result<CommitStats, CommitError> {
        let shutdown = world.shutdown();
        let mut stats = CommitStats::default();
        let mut current: Option<ChunkCoord> = None;
        let mut current_loaded = false;
        let mut events: Vec<HookEvent> = Vec::new();

        for (&pos, update) in self.staged.iter_mut() {
            let coord = pos.chunk_coord();
            if current != Some(coord) {
                if let Some(prev) = current
                    && current_loaded
                {
                    close_chunk(world, prev, &mut events);
                }
                current = Some(coord);
                current_loaded = open_chunk(world, coord, &shutdown, &mut self.dirty)?;
                stats.chunks_touched += usize::from(current_loaded);
            }
            if !current_loaded {
                stats.skipped += 1;
                continue;
            }

            apply_update(world, pos, update, &mut events);

            // Content near the lower face changes the neighbor's sunlight.
            let (_, ly, _) = pos.local();
            if ly < FACE_MARGIN {
                self.dirty.insert(coord.below());
            }
            collect_edge_neighbors(pos, coord, &mut self.edge_dirty);

            stats.applied += 1;
        }
        if let Some(prev) = current
            && current_loaded
        {
            close_chunk(world, prev, &mut events);
        }

        for &coord in &self.dirty {
            world.mark_chunk_dirty(coord, DirtyParams::edited());
        }
        for &coord in self.edge_dirty.difference(&self.dirty) {
            world.mark_chunk_dirty(coord, DirtyParams::edge_hint());
        }

        if self.synchronize
            && !self.staged.is_empty()
            && let Some(sink) = sink.as_deref_mut()
        {
            sink.send_bulk_update(&BulkBlockUpdate::from_staged(&self.staged));
        }

        self.staged.clear();
        self.dirty.clear();
        self.edge_dirty.clear();
        Ok(stats)
    }
}

/// Fetches and prepares a chunk for a group of edits: write lock under the
/// bulk-edit slot, unpack, dirty. Returns `false` (and logs) for unloaded
/// chunks — the group is skipped, never an error.
pub(crate) fn open_chunk(
    world: &mut dyn WorldMap,
    coord: ChunkCoord,
    shutdown: &ShutdownFlag,
    dirty: &mut FxHashSet<ChunkCoord>,
) -> Result<bool, CommitError> {
    let Some(chunk) = world.chunk_mut(coord) else {
        tracing::debug!(?coord, "staged edit targets an unloaded chunk, skipping");
        return Ok(false);
    };
    chunk.lock().acquire_write(BULK_EDIT_BIT, shutdown)?;
    chunk.unpack();
    dirty.insert(coord);
    Ok(true)
}

/// Re-packs and unlocks a finished chunk group, then dispatches the side
/// effects collected while its lock was held.
pub(crate) fn close_chunk(world: &mut dyn WorldMap, coord: ChunkCoord, events: &mut Vec<HookEvent>) {
    if let Some(chunk) = world.chunk_mut(coord) {
        chunk.pack();
        chunk.lock().release_write(BULK_EDIT_BIT);
    }
    dispatch_events(world, events);
}

/// Applies one staged edit to its (already opened) chunk, recording the
/// replaced id and queueing behavior/height side effects.
pub(crate) fn apply_update(
    world: &mut dyn WorldMap,
    pos: BlockPos,
    update: &mut BlockUpdate,
    events: &mut Vec<HookEvent>,
) {
    let coord = pos.chunk_coord();
    let (lx, ly, lz) = pos.local();
    let mut previous: Option<BlockId> = None;

    if let Some(new_solid) = update.new_solid {
        let chunk = world.chunk_mut(coord).expect("chunk group is open");
        let old = chunk.solid_block(lx, ly, lz);
        chunk.set_solid_block(lx, ly, lz, new_solid);
        previous = Some(old);
        if !update.exchange_only {
            events.push(HookEvent::Removed { pos, id: old });
            events.push(HookEvent::Placed { pos, id: new_solid });
        }
        events.push(HookEvent::Height {
            pos,
            old,
            new: new_solid,
        });
    }

    if let Some(new_fluid) = update.new_fluid {
        let chunk = world.chunk_mut(coord).expect("chunk group is open");
        let old = chunk.fluid_block(lx, ly, lz);
        chunk.set_fluid_block(lx, ly, lz, new_fluid);
        // The solid channel's old id wins when both channels are edited.
        if previous.is_none() {
            previous = Some(old);
        }
        if !update.exchange_only {
            events.push(HookEvent::Removed { pos, id: old });
            events.push(HookEvent::Placed { pos, id: new_fluid });
        }
    }

    update.previous_id = previous.unwrap_or(BlockId::AIR);

    if update.exchange_only
        && let Some(id) = update.new_solid.or(update.new_fluid)
        && world
            .registry()
            .get(id)
            .is_some_and(|def| def.block_entity_class.is_some())
    {
        events.push(HookEvent::Exchanged { pos, id });
    }
}

/// Drains queued side effects through the world's collaborator endpoints.
pub(crate) fn dispatch_events(world: &mut dyn WorldMap, events: &mut Vec<HookEvent>) {
    for event in events.drain(..) {
        match event {
            HookEvent::Removed { pos, id } => {
                if let Some(behavior) = world.behavior(id) {
                    behavior.on_removed(world, pos, id);
                }
            }
            HookEvent::Placed { pos, id } => {
                if let Some(behavior) = world.behavior(id) {
                    behavior.on_placed(world, pos, id);
                }
            }
            HookEvent::Exchanged { pos, id } => world.notify_block_entity_exchange(pos, id),
            HookEvent::Height { pos, old, new } => world.update_column_height(pos, old, new),
        }
    }
}

/// Collects the chunk coordinates of every neighbor (face, edge, or corner)
/// adjacent to `pos` when it lies within one cell of a chunk face.
fn collect_edge_neighbors(pos: BlockPos, coord: ChunkCoord, edge: &mut FxHashSet<ChunkCoord>) {
    let (lx, ly, lz) = pos.local();
    for &dx in axis_deltas(lx) {
        for &dy in axis_deltas(ly) {
            for &dz in axis_deltas(lz) {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                edge.insert(coord.offset(dx, dy, dz));
            }
        }
    }
}

fn axis_deltas(local: usize) -> &'static [i32] {
    if local < FACE_MARGIN {
        &[0, -1]
    } else if local >= 32 - FACE_MARGIN {
        &[0, 1]
    } else {
        &[0]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
