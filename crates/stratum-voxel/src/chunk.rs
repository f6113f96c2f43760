//! A 32×32×32 chunk: solid and fluid palette layers behind one chunk lock.
//!
//! The packed (palette + bit-plane) representation is the resting and
//! serialized state. During heavy mutation a chunk is temporarily *unpacked*
//! into plain cell-indexed id arrays and re-packed before it is persisted or
//! handed to another thread.

use static_assertions::const_assert_eq;

use crate::bit_plane::PLANE_WORDS;
use crate::chunk_lock::{ChunkLock, LockError, WriterBit};
use crate::palette_layer::PaletteLayer;
use crate::registry::BlockId;
use crate::shutdown::ShutdownFlag;

/// Side length of a chunk in cells.
pub const CHUNK_SIZE: usize = 32;

/// Cells in one horizontal slice (32²).
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;

/// Total cells in a chunk (32³).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

const_assert_eq!(CHUNK_VOLUME, CHUNK_AREA * CHUNK_SIZE);
const_assert_eq!(PLANE_WORDS * 32, CHUNK_VOLUME);

/// Dirty-flag bit: chunk mesh needs rebuilding.
pub const MESH_DIRTY: u8 = 0b0000_0001;
/// Dirty-flag bit: chunk needs saving to disk.
pub const SAVE_DIRTY: u8 = 0b0000_0010;
/// Dirty-flag bit: chunk needs network sync.
pub const NETWORK_DIRTY: u8 = 0b0000_0100;

const ALL_DIRTY: u8 = MESH_DIRTY | SAVE_DIRTY | NETWORK_DIRTY;

/// Writer slot used by the bulk mutation pipeline.
pub const BULK_EDIT_BIT: WriterBit = WriterBit::new(0);
/// Writer slot used by solid→fluid reclassification.
pub const RECLASSIFY_BIT: WriterBit = WriterBit::new(1);

/// Converts local `(x, y, z)` (each in `0..32`) to a cell index (x fastest).
#[inline]
pub fn cell_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE);
    (y * CHUNK_SIZE + z) * CHUNK_SIZE + x
}

/// Temporary expanded cell arrays used while a chunk is unpacked.
#[derive(Debug)]
struct UnpackedChannels {
    solid: Vec<BlockId>,
    fluid: Vec<BlockId>,
}

/// One chunk of world data: a solid layer, a lazily created fluid layer, the
/// layer lock, dirty flags, and a mutation version counter.
///
/// Out-of-bounds reads return air and out-of-bounds writes are ignored with
/// a warning — no panics on the hot path.
#[derive(Debug)]
pub struct Chunk {
    solid: PaletteLayer,
    /// Created on the first non-empty fluid write; `None` means "all empty".
    fluid: Option<PaletteLayer>,
    lock: ChunkLock,
    dirty: u8,
    version: u64,
    unpacked: Option<UnpackedChannels>,
}

impl Chunk {
    /// Creates an empty chunk.
    pub fn new() -> Self {
        Self {
            solid: PaletteLayer::new(),
            fluid: None,
            lock: ChunkLock::new(),
            dirty: 0,
            version: 0,
            unpacked: None,
        }
    }

    /// Builds a chunk from deserialized layers (the loader path).
    pub fn from_layers(solid: PaletteLayer, fluid: Option<PaletteLayer>) -> Self {
        let fluid = fluid.filter(|layer| !layer.is_uniform_empty());
        Self {
            solid,
            fluid,
            lock: ChunkLock::new(),
            dirty: 0,
            version: 0,
            unpacked: None,
        }
    }

    /// The layer lock guarding this chunk's data.
    pub fn lock(&self) -> &ChunkLock {
        &self.lock
    }

    /// The solid layer.
    pub fn solid_layer(&self) -> &PaletteLayer {
        &self.solid
    }

    /// The fluid layer, if any fluid cell has ever been written.
    pub fn fluid_layer(&self) -> Option<&PaletteLayer> {
        self.fluid.as_ref()
    }

    /// `true` while the chunk holds unpacked scratch arrays.
    pub fn is_unpacked(&self) -> bool {
        self.unpacked.is_some()
    }

    /// The solid block at local `(x, y, z)`; air when out of bounds.
    pub fn solid_block(&self, x: usize, y: usize, z: usize) -> BlockId {
        if !in_bounds(x, y, z) {
            tracing::warn!("solid_block out of bounds: ({x}, {y}, {z})");
            return BlockId::AIR;
        }
        let cell = cell_index(x, y, z);
        match &self.unpacked {
            Some(scratch) => scratch.solid[cell],
            None => self.solid.get(cell),
        }
    }

    /// The fluid block at local `(x, y, z)`; air when out of bounds or no
    /// fluid layer exists.
    pub fn fluid_block(&self, x: usize, y: usize, z: usize) -> BlockId {
        if !in_bounds(x, y, z) {
            tracing::warn!("fluid_block out of bounds: ({x}, {y}, {z})");
            return BlockId::AIR;
        }
        let cell = cell_index(x, y, z);
        match &self.unpacked {
            Some(scratch) => scratch.fluid[cell],
            None => self.fluid.as_ref().map_or(BlockId::AIR, |f| f.get(cell)),
        }
    }

    /// Sets the solid block at local `(x, y, z)`. Ignored when out of bounds.
    pub fn set_solid_block(&mut self, x: usize, y: usize, z: usize, id: BlockId) {
        if !in_bounds(x, y, z) {
            tracing::warn!("set_solid_block out of bounds: ({x}, {y}, {z})");
            return;
        }
        let cell = cell_index(x, y, z);
        match &mut self.unpacked {
            Some(scratch) => scratch.solid[cell] = id,
            None => self.solid.set(cell, id),
        }
        self.touch();
    }

    /// Sets the fluid block at local `(x, y, z)`, creating the fluid layer on
    /// the first non-empty write. Ignored when out of bounds.
    pub fn set_fluid_block(&mut self, x: usize, y: usize, z: usize, id: BlockId) {
        if !in_bounds(x, y, z) {
            tracing::warn!("set_fluid_block out of bounds: ({x}, {y}, {z})");
            return;
        }
        let cell = cell_index(x, y, z);
        match &mut self.unpacked {
            Some(scratch) => scratch.fluid[cell] = id,
            None => {
                if id.is_air() && self.fluid.is_none() {
                    // Clearing fluid in a chunk that never had any.
                    return;
                }
                self.fluid.get_or_insert_with(PaletteLayer::new).set(cell, id);
            }
        }
        self.touch();
    }

    /// Expands both channels into cell arrays for heavy mutation. No-op if
    /// already unpacked.
    pub fn unpack(&mut self) {
        if self.unpacked.is_some() {
            return;
        }
        self.unpacked = Some(UnpackedChannels {
            solid: self.solid.unpack(),
            fluid: match &self.fluid {
                Some(layer) => layer.unpack(),
                None => vec![BlockId::AIR; CHUNK_VOLUME],
            },
        });
    }

    /// Re-encodes the packed layers from the scratch arrays and drops the
    /// scratch. A fluid channel that packed down to all-empty is released
    /// entirely. No-op if not unpacked.
    pub fn pack(&mut self) {
        let Some(scratch) = self.unpacked.take() else {
            return;
        };
        self.solid.pack(&scratch.solid);
        if scratch.fluid.iter().any(|id| !id.is_air()) {
            self.fluid
                .get_or_insert_with(PaletteLayer::new)
                .pack(&scratch.fluid);
        } else {
            self.fluid = None;
        }
    }

    /// Moves every solid cell holding `search_id` into the fluid layer as
    /// `fluid_id`, across the whole chunk in one bit-parallel pass — the
    /// repair path for fluids that were stored in the solid layer.
    ///
    /// Takes the chunk's write lock under [`RECLASSIFY_BIT`]. Returns `true`
    /// if the id was present in the solid palette.
    pub fn reclassify_fluid(
        &mut self,
        search_id: BlockId,
        fluid_id: BlockId,
        shutdown: &ShutdownFlag,
    ) -> Result<bool, LockError> {
        debug_assert!(!self.is_unpacked(), "reclassify operates on packed layers");
        let Some(search_index) = self
            .solid
            .palette()
            .iter()
            .position(|&p| p == search_id)
        else {
            return Ok(false);
        };
        if search_index == 0 {
            return Ok(false);
        }

        self.lock.acquire_write(RECLASSIFY_BIT, shutdown)?;
        let fluid = self.fluid.get_or_insert_with(PaletteLayer::new);
        self.solid.move_entries(search_index, fluid_id, fluid);
        self.lock.release_write(RECLASSIFY_BIT);

        self.touch();
        Ok(true)
    }

    /// Copies every solid cell holding `search_id` into `dest` as `dest_id`,
    /// leaving this chunk untouched. The non-destructive scan runs under the
    /// read lock, so concurrent readers are not blocked.
    pub fn copy_solid_matching(
        &self,
        search_id: BlockId,
        dest_id: BlockId,
        dest: &mut PaletteLayer,
        shutdown: &ShutdownFlag,
    ) -> Result<bool, LockError> {
        let Some(search_index) = self
            .solid
            .palette()
            .iter()
            .position(|&p| p == search_id)
        else {
            return Ok(false);
        };
        if search_index == 0 {
            return Ok(false);
        }

        let _guard = self.lock.read_guard(shutdown)?;
        self.solid.copy_entries(search_index, dest_id, dest);
        Ok(true)
    }

    /// Current dirty flags.
    pub fn dirty_flags(&self) -> u8 {
        self.dirty
    }

    /// `true` if the given flag (or combination) is set.
    pub fn is_dirty(&self, flag: u8) -> bool {
        self.dirty & flag == flag
    }

    /// Sets specific dirty flags.
    pub fn mark_dirty(&mut self, flags: u8) {
        self.dirty |= flags;
    }

    /// Clears specific dirty flags.
    pub fn clear_dirty(&mut self, flags: u8) {
        self.dirty &= !flags;
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.dirty |= ALL_DIRTY;
        self.version += 1;
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

fn in_bounds(x: usize, y: usize, z: usize) -> bool {
    x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
