//! Packed layer ⇄ byte stream, through the codec facade's combined encoding.
//!
//! The primary payload is the concatenated bit-plane words (each plane is
//! exactly one 1024-word bucket); the secondary payload is the palette. Both
//! ride in one combined buffer, so a whole layer is a single compressed blob
//! for disk persistence and network transport.

use stratum_codec::{Codec, CodecError, compress_combined, decompress_combined};
use thiserror::Error;

use crate::bit_plane::{BitPlane, PLANE_WORDS};
use crate::palette_layer::PaletteLayer;
use crate::registry::BlockId;

/// Errors that can occur while decoding a packed layer.
#[derive(Debug, Error)]
pub enum ChunkSerError {
    /// The compressed container was rejected by the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Palette and plane counts do not describe a valid layer.
    #[error("inconsistent layer: {planes} planes for a palette of {palette} entries")]
    Inconsistent {
        /// Decoded plane count.
        planes: usize,
        /// Decoded palette entry count.
        palette: usize,
    },
}

/// Serializes a packed layer into one compressed combined buffer.
pub fn layer_to_bytes(layer: &PaletteLayer, codec: &dyn Codec) -> Vec<u8> {
    let mut primary = Vec::with_capacity(layer.planes().len() * PLANE_WORDS);
    for plane in layer.planes() {
        primary.extend_from_slice(plane.words());
    }
    let secondary: Vec<u32> = layer.palette().iter().map(|id| id.0).collect();
    compress_combined(codec, &primary, &secondary)
}

/// Deserializes a packed layer from a combined buffer.
///
/// # Errors
///
/// Propagates codec failures and rejects palette/plane combinations that
/// violate the layer's width invariant.
pub fn layer_from_bytes(data: &[u8], codec: &dyn Codec) -> Result<PaletteLayer, ChunkSerError> {
    let payload = decompress_combined(codec, data)?;
    let palette: Vec<BlockId> = payload.secondary.into_iter().map(BlockId).collect();
    let plane_count = payload.buckets.len();
    let planes: Vec<BitPlane> = payload
        .buckets
        .into_iter()
        .map(|words| BitPlane::from_words(words).expect("combined buckets are plane-sized"))
        .collect();

    let palette_len = palette.len();
    PaletteLayer::try_from_parts(palette, planes).ok_or(ChunkSerError::Inconsistent {
        planes: plane_count,
        palette: palette_len,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CHUNK_VOLUME;
    use stratum_codec::{DeflateCodec, Lz4Codec};

    fn backends() -> Vec<Box<dyn Codec>> {
        vec![Box::new(Lz4Codec::new()), Box::new(DeflateCodec::new())]
    }

    #[test]
    fn test_roundtrip_both_backends() {
        for codec in backends() {
            let mut layer = PaletteLayer::new();
            for i in 0..800usize {
                layer.set(i * 37 % CHUNK_VOLUME, BlockId((i % 20 + 1) as u32));
            }

            let bytes = layer_to_bytes(&layer, &*codec);
            let restored = layer_from_bytes(&bytes, &*codec)
                .unwrap_or_else(|e| panic!("decode failed via {}: {e}", codec.name()));

            for cell in 0..CHUNK_VOLUME {
                assert_eq!(layer.get(cell), restored.get(cell), "cell {cell}");
            }
        }
    }

    #[test]
    fn test_empty_layer_roundtrip_is_tiny() {
        let codec = Lz4Codec::new();
        let layer = PaletteLayer::new();
        let bytes = layer_to_bytes(&layer, &codec);
        assert!(
            bytes.len() < 32,
            "empty layer serialized to {} bytes",
            bytes.len()
        );
        let restored = layer_from_bytes(&bytes, &codec).unwrap();
        assert!(restored.is_uniform_empty());
    }

    #[test]
    fn test_inconsistent_shape_is_rejected() {
        let codec = Lz4Codec::new();
        // One plane but a single-entry palette (needs zero planes).
        let primary = vec![0u32; PLANE_WORDS];
        let buf = stratum_codec::compress_combined(&codec, &primary, &[0]);
        let result = layer_from_bytes(&buf, &codec);
        assert!(matches!(result, Err(ChunkSerError::Inconsistent { .. })));
    }

    #[test]
    fn test_corrupt_container_is_rejected() {
        let codec = Lz4Codec::new();
        assert!(layer_from_bytes(&[1, 2, 3], &codec).is_err());
    }
}
