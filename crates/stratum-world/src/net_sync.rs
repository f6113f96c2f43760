//! Minimal bulk block update: the network payload produced by a commit.
//!
//! Wire layout (before compression through the active codec's container):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Edit count (`u32`, little-endian) |
//! | 4 + n×20 | 4×3 | Position x, y, z (`i32`, little-endian) |
//! | … | 4 | New solid id, or −1 for "no change" |
//! | … | 4 | New fluid id, or −1 for "no change" |

use indexmap::IndexMap;
use stratum_codec::{Codec, CodecError};
use thiserror::Error;

use crate::coords::BlockPos;
use crate::update::BlockUpdate;

/// Sentinel id meaning "this channel is unchanged".
pub const NO_CHANGE: i32 = -1;

/// Bytes per wire edit.
const EDIT_BYTES: usize = 20;

/// Consumes encoded bulk updates for transmission (external collaborator —
/// the transport itself is out of scope).
pub trait SyncSink {
    /// Hands a finished update to the transport.
    fn send_bulk_update(&mut self, update: &BulkBlockUpdate);
}

/// One edited cell on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireEdit {
    /// Absolute position of the edit.
    pub pos: BlockPos,
    /// New solid id or [`NO_CHANGE`].
    pub solid: i32,
    /// New fluid id or [`NO_CHANGE`].
    pub fluid: i32,
}

/// The minimal bulk block update message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkBlockUpdate {
    /// Edited cells, in staging order.
    pub edits: Vec<WireEdit>,
}

/// Errors that can occur while decoding a bulk update.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The compressed container was rejected.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The decompressed payload does not match its declared edit count.
    #[error("bulk update truncated: {count} edits need {expected} bytes, got {actual}")]
    Truncated {
        /// Declared edit count.
        count: usize,
        /// Required byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },
}

impl BulkBlockUpdate {
    /// Builds the message from a staged edit map, preserving staging order.
    pub fn from_staged(staged: &IndexMap<BlockPos, BlockUpdate>) -> Self {
        let edits = staged
            .values()
            .map(|update| WireEdit {
                pos: update.pos,
                solid: update.new_solid.map_or(NO_CHANGE, |id| id.0 as i32),
                fluid: update.new_fluid.map_or(NO_CHANGE, |id| id.0 as i32),
            })
            .collect();
        Self { edits }
    }

    /// Encodes and compresses the message through `codec`.
    pub fn encode(&self, codec: &dyn Codec) -> Vec<u8> {
        let mut raw = Vec::with_capacity(4 + self.edits.len() * EDIT_BYTES);
        raw.extend_from_slice(&(self.edits.len() as u32).to_le_bytes());
        for edit in &self.edits {
            raw.extend_from_slice(&edit.pos.x.to_le_bytes());
            raw.extend_from_slice(&edit.pos.y.to_le_bytes());
            raw.extend_from_slice(&edit.pos.z.to_le_bytes());
            raw.extend_from_slice(&edit.solid.to_le_bytes());
            raw.extend_from_slice(&edit.fluid.to_le_bytes());
        }
        codec.compress(&raw)
    }

    /// Decompresses and decodes a message produced by [`encode`](Self::encode).
    pub fn decode(data: &[u8], codec: &dyn Codec) -> Result<Self, SyncError> {
        let raw = codec.decompress(data)?;
        if raw.len() < 4 {
            return Err(SyncError::Truncated {
                count: 0,
                expected: 4,
                actual: raw.len(),
            });
        }
        let count = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        let expected = 4 + count * EDIT_BYTES;
        if raw.len() < expected {
            return Err(SyncError::Truncated {
                count,
                expected,
                actual: raw.len(),
            });
        }

        let mut edits = Vec::with_capacity(count);
        for i in 0..count {
            let base = 4 + i * EDIT_BYTES;
            let read = |offset: usize| {
                i32::from_le_bytes([
                    raw[base + offset],
                    raw[base + offset + 1],
                    raw[base + offset + 2],
                    raw[base + offset + 3],
                ])
            };
            edits.push(WireEdit {
                pos: BlockPos::new(read(0), read(4), read(8)),
                solid: read(12),
                fluid: read(16),
            });
        }
        Ok(Self { edits })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_codec::Lz4Codec;
    use stratum_voxel::BlockId;

    #[test]
    fn test_from_staged_preserves_order_and_sentinels() {
        let mut staged = IndexMap::new();
        let a = BlockPos::new(1, 2, 3);
        let b = BlockPos::new(-4, 5, -6);
        staged.insert(a, BlockUpdate::new(a, Some(BlockId(9)), None));
        staged.insert(b, BlockUpdate::new(b, None, Some(BlockId(5))));

        let update = BulkBlockUpdate::from_staged(&staged);
        assert_eq!(update.edits.len(), 2);
        assert_eq!(update.edits[0].pos, a);
        assert_eq!(update.edits[0].solid, 9);
        assert_eq!(update.edits[0].fluid, NO_CHANGE);
        assert_eq!(update.edits[1].solid, NO_CHANGE);
        assert_eq!(update.edits[1].fluid, 5);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = Lz4Codec::new();
        let update = BulkBlockUpdate {
            edits: vec![
                WireEdit {
                    pos: BlockPos::new(100, -200, 300),
                    solid: 7,
                    fluid: NO_CHANGE,
                },
                WireEdit {
                    pos: BlockPos::new(0, 0, 0),
                    solid: NO_CHANGE,
                    fluid: 12,
                },
            ],
        };

        let bytes = update.encode(&codec);
        let decoded = BulkBlockUpdate::decode(&bytes, &codec).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_empty_update_roundtrips() {
        let codec = Lz4Codec::new();
        let update = BulkBlockUpdate::default();
        let decoded = BulkBlockUpdate::decode(&update.encode(&codec), &codec).unwrap();
        assert!(decoded.edits.is_empty());
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let codec = Lz4Codec::new();
        // Declares 5 edits but carries none.
        let raw = 5u32.to_le_bytes().to_vec();
        let compressed = codec.compress(&raw);
        let result = BulkBlockUpdate::decode(&compressed, &codec);
        assert!(matches!(result, Err(SyncError::Truncated { count: 5, .. })));
    }
}
