//! Block behavior hooks, dispatched by the bulk mutation pipeline.
//!
//! Behaviors are looked up by numeric block id through the world's behavior
//! table. Hooks fire after a chunk's edits have been applied and its lock
//! released, so a behavior may freely inspect and edit the world.

use stratum_voxel::BlockId;

use crate::coords::BlockPos;
use crate::world_map::WorldMap;

/// Per-block-type gameplay callbacks (external collaborator).
pub trait BlockBehavior: Send + Sync {
    /// Called after a block of this type was removed from `pos`.
    fn on_removed(&self, world: &mut dyn WorldMap, pos: BlockPos, removed: BlockId);

    /// Called after a block of this type was placed at `pos`.
    fn on_placed(&self, world: &mut dyn WorldMap, pos: BlockPos, placed: BlockId);
}
