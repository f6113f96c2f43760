//! The single-column-optimized staged editor.
//!
//! Worldgen-style population touches one vertical chunk column at a time;
//! this variant pins the `(x, z)` chunk column at construction, rejects
//! positions outside it at staging time, and skips lateral neighbor
//! computation entirely — edits are grouped by chunk Y only, with vertical
//! dirty marking as the single boundary concern.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use stratum_voxel::BlockId;

use crate::bulk_edit::{
    CommitError, CommitStats, HookEvent, apply_update, close_chunk, open_chunk,
};
use crate::coords::{BlockPos, ChunkCoord};
use crate::net_sync::{BulkBlockUpdate, SyncSink};
use crate::update::BlockUpdate;
use crate::world_map::{DirtyParams, WorldMap};

/// Staged editor restricted to one vertical chunk column.
pub struct ColumnEditor {
    /// Chunk-grid `(x, z)` of the pinned column.
    column: (i32, i32),
    staged: IndexMap<BlockPos, BlockUpdate>,
    synchronize: bool,
    dirty: FxHashSet<ChunkCoord>,
}

impl ColumnEditor {
    /// Creates an editor pinned to the chunk column at chunk-grid
    /// `(column_x, column_z)`.
    pub fn new(column_x: i32, column_z: i32, synchronize: bool) -> Self {
        Self {
            column: (column_x, column_z),
            staged: IndexMap::new(),
            synchronize,
            dirty: FxHashSet::default(),
        }
    }

    /// Stages an edit. Returns `false` (with a warning) for positions
    /// outside the pinned column.
    pub fn stage(
        &mut self,
        pos: BlockPos,
        new_solid: Option<BlockId>,
        new_fluid: Option<BlockId>,
    ) -> bool {
        let coord = pos.chunk_coord();
        if (coord.x, coord.z) != self.column {
            tracing::warn!(
                ?pos,
                column = ?self.column,
                "position outside the pinned column, not staged"
            );
            return false;
        }
        self.staged.insert(pos, BlockUpdate::new(pos, new_solid, new_fluid));
        true
    }

    /// Number of pending edits.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Applies every staged edit. Same contract as
    /// [`BulkEditor::commit`](crate::bulk_edit::BulkEditor::commit), minus
    /// lateral edge marking.
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

            let (_, ly, _) = pos.local();
            if ly < 2 {
                self.dirty.insert(coord.below());
            }

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

        if self.synchronize
            && !self.staged.is_empty()
            && let Some(sink) = sink.as_deref_mut()
        {
            sink.send_bulk_update(&BulkBlockUpdate::from_staged(&self.staged));
        }

        self.staged.clear();
        self.dirty.clear();
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_voxel::{BlockTypeDef, BlockTypeRegistry, Chunk, Transparency};

    use crate::world_map::GridWorld;

    fn stone_world(coords: &[ChunkCoord]) -> (GridWorld, BlockId) {
        let mut registry = BlockTypeRegistry::new();
        let stone = registry
            .register(BlockTypeDef {
                name: "stone".to_string(),
                solid: true,
                fluid: false,
                transparency: Transparency::Opaque,
                block_entity_class: None,
            })
            .unwrap();
        let mut world = GridWorld::new(registry);
        for &coord in coords {
            world.insert_chunk(coord, Chunk::new());
        }
        (world, stone)
    }

    #[test]
    fn test_out_of_column_positions_are_rejected() {
        let mut editor = ColumnEditor::new(0, 0, false);
        assert!(editor.stage(BlockPos::new(5, 100, 5), Some(BlockId(1)), None));
        assert!(!editor.stage(BlockPos::new(40, 100, 5), Some(BlockId(1)), None));
        assert!(!editor.stage(BlockPos::new(5, 100, -1), Some(BlockId(1)), None));
        assert_eq!(editor.pending(), 1);
    }

    #[test]
    fn test_column_commit_spans_vertical_chunks() {
        let lower = ChunkCoord::new(0, 0, 0);
        let upper = ChunkCoord::new(0, 1, 0);
        let (mut world, stone) = stone_world(&[lower, upper]);

        let mut editor = ColumnEditor::new(0, 0, false);
        editor.stage(BlockPos::new(5, 10, 5), Some(stone), None);
        editor.stage(BlockPos::new(5, 11, 5), Some(stone), None);
        editor.stage(BlockPos::new(5, 40, 5), Some(stone), None);

        let stats = editor.commit(&mut world, None).unwrap();
        assert_eq!(stats.applied, 3);
        assert_eq!(stats.chunks_touched, 2);

        assert_eq!(world.chunk(lower).unwrap().solid_block(5, 10, 5), stone);
        assert_eq!(world.chunk(upper).unwrap().solid_block(5, 8, 5), stone);

        let log = world.drain_dirty();
        assert!(log.iter().any(|n| n.coord == lower));
        assert!(log.iter().any(|n| n.coord == upper));
        // No lateral neighbors are ever marked by the column variant.
        assert!(log.iter().all(|n| (n.coord.x, n.coord.z) == (0, 0)));
    }

    #[test]
    fn test_lower_boundary_marks_chunk_below_only() {
        let chunk = ChunkCoord::new(0, 2, 0);
        let (mut world, stone) = stone_world(&[chunk]);

        let mut editor = ColumnEditor::new(0, 0, false);
        // y = 64 is the bottom cell layer of chunk y=2; x/z on lateral faces.
        editor.stage(BlockPos::new(0, 64, 31), Some(stone), None);
        editor.commit(&mut world, None).unwrap();

        let log = world.drain_dirty();
        assert!(log.iter().any(|n| n.coord == ChunkCoord::new(0, 1, 0)));
        assert!(
            log.iter().all(|n| !n.params.edge_only),
            "column editor never emits edge-only hints"
        );
    }

    #[test]
    fn test_unloaded_column_chunk_is_skipped() {
        let (mut world, stone) = stone_world(&[ChunkCoord::new(0, 0, 0)]);

        let mut editor = ColumnEditor::new(0, 0, false);
        editor.stage(BlockPos::new(1, 1, 1), Some(stone), None);
        editor.stage(BlockPos::new(1, 100, 1), Some(stone), None);

        let stats = editor.commit(&mut world, None).unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.skipped, 1);
    }
}
