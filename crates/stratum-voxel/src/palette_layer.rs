//! Palette-compressed bit-plane storage for one chunk channel.
//!
//! A layer stores each cell's value as an index into a small palette of
//! distinct block ids. The index is spread across `bits` bit-planes — plane
//! `i` holds binary digit `i` of every cell's index — so a cell's value is
//! `palette[Σ bit_i(cell) · 2^i]`. Palette slot 0 is reserved for empty/air
//! and needs no stored 1-bits: a fully empty layer has zero planes allocated.
//!
//! The palette stores raw ids, not registry references, so a layer is
//! directly serializable; ids are resolved through the session's
//! [`BlockTypeRegistry`](crate::registry::BlockTypeRegistry) by callers.

use crate::bit_plane::{BitPlane, PLANE_WORDS};
use crate::chunk::CHUNK_VOLUME;
use crate::registry::BlockId;

/// Minimum bit width for a palette of `count` entries.
#[inline]
pub(crate) fn min_bits_for(count: usize) -> usize {
    if count <= 1 {
        0
    } else {
        (usize::BITS - (count - 1).leading_zeros()) as usize
    }
}

/// Bit-plane encoded storage of one semantic channel (solid blocks or
/// fluids) for one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteLayer {
    /// Distinct ids present in the chunk; slot 0 is always empty/air.
    palette: Vec<BlockId>,
    /// One plane per bit of the palette index. `planes.len() == bits`.
    planes: Vec<BitPlane>,
    /// Current index width. Always the minimum with `palette.len() <= 2^bits`.
    bits: u8,
}

impl PaletteLayer {
    /// Creates a fully empty layer: one palette slot (air), zero planes.
    pub fn new() -> Self {
        Self {
            palette: vec![BlockId::AIR],
            planes: Vec::new(),
            bits: 0,
        }
    }

    /// Rebuilds a layer from a palette and plane set (deserialization).
    ///
    /// Returns `None` unless slot 0 is air and the plane count matches the
    /// minimum width for the palette size.
    pub fn try_from_parts(palette: Vec<BlockId>, planes: Vec<BitPlane>) -> Option<Self> {
        if palette.first() != Some(&BlockId::AIR) {
            return None;
        }
        let bits = min_bits_for(palette.len());
        if planes.len() != bits {
            return None;
        }
        Some(Self {
            palette,
            planes,
            bits: bits as u8,
        })
    }

    /// The palette.
    pub fn palette(&self) -> &[BlockId] {
        &self.palette
    }

    /// The bit planes, least significant first.
    pub fn planes(&self) -> &[BitPlane] {
        &self.planes
    }

    /// Current index width.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Palette slots available at the current width.
    pub fn capacity(&self) -> usize {
        1usize << self.bits
    }

    /// `true` while the layer is uniformly empty (no planes allocated).
    pub fn is_uniform_empty(&self) -> bool {
        self.bits == 0
    }

    /// Decodes the palette index at `cell`.
    ///
    /// Widths 1..=5 take unrolled fast paths — most chunks contain only a
    /// handful of distinct block types, so the common case never loops.
    #[inline]
    pub fn palette_index(&self, cell: usize) -> usize {
        debug_assert!(cell < CHUNK_VOLUME);
        let w = cell >> 5;
        let b = (cell & 31) as u32;
        match self.bits {
            0 => 0,
            1 => self.extract1(w, b),
            2 => self.extract2(w, b),
            3 => self.extract3(w, b),
            4 => self.extract4(w, b),
            5 => self.extract5(w, b),
            _ => self.extract_wide(w, b),
        }
    }

    /// The block id at `cell`.
    #[inline]
    pub fn get(&self, cell: usize) -> BlockId {
        self.palette[self.palette_index(cell)]
    }

    /// Stores `id` at `cell`, growing the palette as needed.
    pub fn set(&mut self, cell: usize, id: BlockId) {
        let index = self.get_or_add_palette_index(id);
        self.write_cell(cell, index);
    }

    /// Returns the palette slot for `id`, adding it on a miss.
    ///
    /// The palette is scanned linearly — it holds tens of entries at most,
    /// which beats hashing. When full, a dead slot is recycled before the
    /// width grows; growth past a power-of-two boundary allocates exactly
    /// one new plane and preserves every encoded cell.
    pub fn get_or_add_palette_index(&mut self, id: BlockId) -> usize {
        if let Some(index) = self.palette.iter().position(|&p| p == id) {
            return index;
        }
        if self.palette.len() == self.capacity() {
            if let Some(slot) = self.make_space_in_palette() {
                self.palette[slot] = id;
                return slot;
            }
            self.planes.push(BitPlane::new());
            self.bits += 1;
        }
        self.palette.push(id);
        self.palette.len() - 1
    }

    /// ORs `mask` into every plane word carrying a 1-bit of `palette_index`
    /// and clears it from the rest, encoding the index for all masked cells
    /// at once. Slot 0 therefore never needs an explicit write — clearing is
    /// the encoding.
    pub fn write(&mut self, palette_index: usize, word_index: usize, mask: u32) {
        debug_assert!(palette_index < self.capacity());
        for (i, plane) in self.planes.iter_mut().enumerate() {
            if palette_index >> i & 1 == 1 {
                plane.set_word_bits(word_index, mask);
            } else {
                plane.clear_word_bits(word_index, mask);
            }
        }
    }

    /// Moves every cell currently equal to `search_index` into `dest`,
    /// stored there as `dest_id`, and clears them from this layer.
    ///
    /// Operates word-wise: a boolean match mask per 32-cell word, one
    /// bit-parallel pass over the whole chunk. Used to reclassify entries
    /// between the solid and fluid layers.
    pub fn move_entries(&mut self, search_index: usize, dest_id: BlockId, dest: &mut PaletteLayer) {
        if search_index == 0 || self.bits == 0 {
            // Slot 0 is the empty encoding; there is nothing to move.
            return;
        }
        debug_assert!(search_index < self.capacity());
        let dest_index = dest.get_or_add_palette_index(dest_id);
        for w in 0..PLANE_WORDS {
            let mask = self.match_mask(search_index, w);
            if mask == 0 {
                continue;
            }
            dest.write(dest_index, w, mask);
            for plane in self.planes.iter_mut() {
                plane.clear_word_bits(w, mask);
            }
        }
    }

    /// Same detection as [`move_entries`](Self::move_entries) but the source
    /// is left untouched (copy, not move).
    pub fn copy_entries(&self, search_index: usize, dest_id: BlockId, dest: &mut PaletteLayer) {
        if search_index == 0 || self.bits == 0 {
            return;
        }
        debug_assert!(search_index < self.capacity());
        let dest_index = dest.get_or_add_palette_index(dest_id);
        for w in 0..PLANE_WORDS {
            let mask = self.match_mask(search_index, w);
            if mask != 0 {
                dest.write(dest_index, w, mask);
            }
        }
    }

    /// Expands the layer into a temporary cell-indexed id array for heavy
    /// mutation. Convert back with [`pack`](Self::pack) before the layer is
    /// persisted or handed to another thread.
    pub fn unpack(&self) -> Vec<BlockId> {
        let mut cells = vec![self.palette[0]; CHUNK_VOLUME];
        if self.bits == 0 {
            return cells;
        }
        for (cell, slot) in cells.iter_mut().enumerate() {
            *slot = self.palette[self.palette_index(cell)];
        }
        cells
    }

    /// Re-encodes the layer from a cell-indexed id array, rebuilding a
    /// minimal palette at minimal width.
    pub fn pack(&mut self, cells: &[BlockId]) {
        debug_assert_eq!(cells.len(), CHUNK_VOLUME);
        let mut palette = vec![BlockId::AIR];
        let mut indices = vec![0u16; CHUNK_VOLUME];
        for (cell, &id) in cells.iter().enumerate() {
            if id.is_air() {
                continue;
            }
            let index = match palette.iter().position(|&p| p == id) {
                Some(i) => i,
                None => {
                    palette.push(id);
                    palette.len() - 1
                }
            };
            indices[cell] = index as u16;
        }

        let bits = min_bits_for(palette.len());
        let mut planes: Vec<BitPlane> = (0..bits).map(|_| BitPlane::new()).collect();
        for (cell, &index) in indices.iter().enumerate() {
            if index == 0 {
                continue;
            }
            for (i, plane) in planes.iter_mut().enumerate() {
                if index >> i & 1 == 1 {
                    plane.set(cell);
                }
            }
        }

        self.palette = palette;
        self.planes = planes;
        self.bits = bits as u8;
    }

    /// Scans cell usage and returns a recyclable dead palette slot (never
    /// slot 0), or `None` if every slot is live.
    fn make_space_in_palette(&mut self) -> Option<usize> {
        let mut used = vec![false; self.palette.len()];
        for cell in 0..CHUNK_VOLUME {
            used[self.palette_index(cell)] = true;
        }
        (1..self.palette.len()).find(|&i| !used[i])
    }

    fn write_cell(&mut self, cell: usize, index: usize) {
        for (i, plane) in self.planes.iter_mut().enumerate() {
            if index >> i & 1 == 1 {
                plane.set(cell);
            } else {
                plane.clear(cell);
            }
        }
    }

    /// Match mask for one word: a 1-bit per cell whose index equals
    /// `search_index`.
    #[inline]
    fn match_mask(&self, search_index: usize, word_index: usize) -> u32 {
        let mut mask = u32::MAX;
        for (i, plane) in self.planes.iter().enumerate() {
            let word = plane.word(word_index);
            mask &= if search_index >> i & 1 == 1 { word } else { !word };
        }
        mask
    }

    #[inline]
    fn extract1(&self, w: usize, b: u32) -> usize {
        ((self.planes[0].word(w) >> b) & 1) as usize
    }

    #[inline]
    fn extract2(&self, w: usize, b: u32) -> usize {
        (((self.planes[0].word(w) >> b) & 1) | ((self.planes[1].word(w) >> b) & 1) << 1) as usize
    }

    #[inline]
    fn extract3(&self, w: usize, b: u32) -> usize {
        (((self.planes[0].word(w) >> b) & 1)
            | ((self.planes[1].word(w) >> b) & 1) << 1
            | ((self.planes[2].word(w) >> b) & 1) << 2) as usize
    }

    #[inline]
    fn extract4(&self, w: usize, b: u32) -> usize {
        (((self.planes[0].word(w) >> b) & 1)
            | ((self.planes[1].word(w) >> b) & 1) << 1
            | ((self.planes[2].word(w) >> b) & 1) << 2
            | ((self.planes[3].word(w) >> b) & 1) << 3) as usize
    }

    #[inline]
    fn extract5(&self, w: usize, b: u32) -> usize {
        (((self.planes[0].word(w) >> b) & 1)
            | ((self.planes[1].word(w) >> b) & 1) << 1
            | ((self.planes[2].word(w) >> b) & 1) << 2
            | ((self.planes[3].word(w) >> b) & 1) << 3
            | ((self.planes[4].word(w) >> b) & 1) << 4) as usize
    }

    /// Generic extraction for widths above 5 (rare: 33+ distinct ids).
    fn extract_wide(&self, w: usize, b: u32) -> usize {
        let mut index = 0usize;
        for (i, plane) in self.planes.iter().enumerate() {
            index |= (((plane.word(w) >> b) & 1) as usize) << i;
        }
        index
    }
}

impl Default for PaletteLayer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
