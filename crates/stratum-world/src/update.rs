//! The staged positional edit applied by the bulk mutation pipeline.

use stratum_voxel::BlockId;

use crate::coords::BlockPos;

/// One pending block edit, keyed by absolute position in the staging map.
///
/// `None` in a channel means "no change to this channel". `previous_id` is
/// filled in during commit for undo and event dispatch; when both channels
/// are edited in one step, the solid channel's old id wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockUpdate {
    /// Absolute position of the edit.
    pub pos: BlockPos,
    /// New solid-channel id, if the solid channel changes.
    pub new_solid: Option<BlockId>,
    /// New fluid-channel id, if the fluid channel changes.
    pub new_fluid: Option<BlockId>,
    /// The id replaced by this edit; written during commit.
    pub previous_id: BlockId,
    /// Swap the block identity in place without firing placement/removal
    /// side effects (block entities are notified of the exchange instead).
    pub exchange_only: bool,
}

impl BlockUpdate {
    /// A normal edit with full placement/removal side effects.
    pub fn new(pos: BlockPos, new_solid: Option<BlockId>, new_fluid: Option<BlockId>) -> Self {
        Self {
            pos,
            new_solid,
            new_fluid,
            previous_id: BlockId::AIR,
            exchange_only: false,
        }
    }

    /// An in-place identity swap that suppresses placement/removal hooks.
    pub fn exchange(pos: BlockPos, new_solid: Option<BlockId>, new_fluid: Option<BlockId>) -> Self {
        Self {
            exchange_only: true,
            ..Self::new(pos, new_solid, new_fluid)
        }
    }
}
