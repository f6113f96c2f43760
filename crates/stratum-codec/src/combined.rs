//! Combined encoding: one byte stream carrying a large primary int array and
//! a much smaller secondary int array.
//!
//! Layout:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Secondary header `N` (`i32`, little-endian) |
//! | 4 | — | Secondary payload |
//! | — | rest | Codec-compressed primary payload |
//!
//! `N >= 0`: the secondary payload is `N` bytes of codec-compressed data.
//! `N < 0`: the secondary payload is stored raw (small arrays are not worth a
//! compression header), and `|N| = 4 × element count`.
//!
//! The primary decompresses into fixed 1024-word buckets — the natural shape
//! of a chunk's bit-plane dump, where each plane is exactly 1024 words.

use crate::arrays::{u32s_from_le_bytes, u32s_to_le_bytes};
use crate::codec::{Codec, CodecError};

/// Secondary arrays at or below this element count are stored raw-inline.
pub const INLINE_SECONDARY_MAX: usize = 16;

/// Words per primary bucket.
pub const BUCKET_WORDS: usize = 1024;

/// Bytes per primary bucket.
const BUCKET_BYTES: usize = BUCKET_WORDS * 4;

/// The two arrays recovered from a combined buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedPayload {
    /// The primary array split into [`BUCKET_WORDS`]-word buckets.
    pub buckets: Vec<Vec<u32>>,
    /// The secondary array.
    pub secondary: Vec<u32>,
}

/// Encodes a primary and a secondary int array into one combined buffer.
///
/// The primary length must be a multiple of [`BUCKET_WORDS`] (it is rebuilt
/// as buckets on decode).
pub fn compress_combined(codec: &dyn Codec, primary: &[u32], secondary: &[u32]) -> Vec<u8> {
    debug_assert_eq!(
        primary.len() % BUCKET_WORDS,
        0,
        "primary length must be a multiple of {BUCKET_WORDS}"
    );

    let mut out = Vec::new();
    if secondary.len() <= INLINE_SECONDARY_MAX {
        let raw = u32s_to_le_bytes(secondary);
        out.extend_from_slice(&(-(raw.len() as i32)).to_le_bytes());
        out.extend_from_slice(&raw);
    } else {
        let compressed = codec.compress(&u32s_to_le_bytes(secondary));
        out.extend_from_slice(&(compressed.len() as i32).to_le_bytes());
        out.extend_from_slice(&compressed);
    }

    out.extend_from_slice(&codec.compress(&u32s_to_le_bytes(primary)));
    out
}

/// Decodes a combined buffer back into its primary buckets and secondary
/// array.
///
/// # Errors
///
/// - [`CodecError::Truncated`] if the buffer ends inside a section.
/// - [`CodecError::UnevenSize`] if the decompressed primary is not a clean
///   multiple of the bucket size, or the secondary is not whole ints — both
///   are data-integrity failures, raised immediately and never retried.
pub fn decompress_combined(codec: &dyn Codec, data: &[u8]) -> Result<CombinedPayload, CodecError> {
    if data.len() < 4 {
        return Err(CodecError::Truncated {
            expected: 4,
            actual: data.len(),
        });
    }
    let header = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let secondary_len = header.unsigned_abs() as usize;
    let secondary_end = 4 + secondary_len;
    if data.len() < secondary_end {
        return Err(CodecError::Truncated {
            expected: secondary_end,
            actual: data.len(),
        });
    }

    let secondary_bytes = &data[4..secondary_end];
    let secondary = if header < 0 {
        u32s_from_le_bytes(secondary_bytes)?
    } else {
        u32s_from_le_bytes(&codec.decompress(secondary_bytes)?)?
    };

    let primary_bytes = codec.decompress(&data[secondary_end..])?;
    if primary_bytes.len() % BUCKET_BYTES != 0 {
        return Err(CodecError::UnevenSize {
            actual: primary_bytes.len(),
            unit: BUCKET_BYTES,
        });
    }

    let buckets = primary_bytes
        .chunks_exact(BUCKET_BYTES)
        .map(|bucket| {
            u32s_from_le_bytes(bucket).expect("bucket size is a multiple of the int size")
        })
        .collect();

    Ok(CombinedPayload { buckets, secondary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::DeflateCodec;
    use crate::lz4::Lz4Codec;

    fn backends() -> Vec<Box<dyn Codec>> {
        vec![Box::new(Lz4Codec::new()), Box::new(DeflateCodec::new())]
    }

    fn primary(buckets: usize) -> Vec<u32> {
        (0..buckets * BUCKET_WORDS).map(|i| (i as u32) * 3).collect()
    }

    #[test]
    fn test_roundtrip_inline_secondary() {
        for codec in backends() {
            let secondary: Vec<u32> = (0..INLINE_SECONDARY_MAX as u32).collect();
            let buf = compress_combined(&*codec, &primary(3), &secondary);
            // Inline header is negative.
            let header = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            assert!(header < 0, "small secondary should be raw-inlined");

            let payload = decompress_combined(&*codec, &buf).unwrap();
            assert_eq!(payload.secondary, secondary);
            assert_eq!(payload.buckets.len(), 3);
            let flat: Vec<u32> = payload.buckets.into_iter().flatten().collect();
            assert_eq!(flat, primary(3));
        }
    }

    #[test]
    fn test_roundtrip_compressed_secondary() {
        for codec in backends() {
            let secondary: Vec<u32> = (0..200u32).map(|i| i * 7).collect();
            let buf = compress_combined(&*codec, &primary(2), &secondary);
            let header = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            assert!(header > 0, "large secondary should be compressed");

            let payload = decompress_combined(&*codec, &buf).unwrap();
            assert_eq!(payload.secondary, secondary);
            assert_eq!(payload.buckets.len(), 2);
        }
    }

    #[test]
    fn test_empty_primary_yields_zero_buckets() {
        let codec = Lz4Codec::new();
        let buf = compress_combined(&codec, &[], &[1, 2, 3]);
        let payload = decompress_combined(&codec, &buf).unwrap();
        assert!(payload.buckets.is_empty());
        assert_eq!(payload.secondary, vec![1, 2, 3]);
    }

    #[test]
    fn test_uneven_primary_is_rejected() {
        let codec = Lz4Codec::new();
        // Hand-build a buffer whose primary is NOT a bucket multiple.
        let mut buf = Vec::new();
        buf.extend_from_slice(&(-4i32).to_le_bytes());
        buf.extend_from_slice(&42u32.to_le_bytes());
        buf.extend_from_slice(&codec.compress(&u32s_to_le_bytes(&[1, 2, 3])));

        let result = decompress_combined(&codec, &buf);
        assert!(
            matches!(result, Err(CodecError::UnevenSize { unit, .. }) if unit == BUCKET_BYTES),
            "expected UnevenSize, got {result:?}"
        );
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let codec = Lz4Codec::new();
        assert!(matches!(
            decompress_combined(&codec, &[1, 2]),
            Err(CodecError::Truncated { .. })
        ));

        // Header promises more secondary bytes than exist.
        let mut buf = Vec::new();
        buf.extend_from_slice(&100i32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            decompress_combined(&codec, &buf),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_threshold_boundary() {
        let codec = Lz4Codec::new();
        let at_limit: Vec<u32> = (0..INLINE_SECONDARY_MAX as u32).collect();
        let over_limit: Vec<u32> = (0..INLINE_SECONDARY_MAX as u32 + 1).collect();

        let buf_at = compress_combined(&codec, &primary(1), &at_limit);
        let buf_over = compress_combined(&codec, &primary(1), &over_limit);

        assert!(i32::from_le_bytes([buf_at[0], buf_at[1], buf_at[2], buf_at[3]]) < 0);
        assert!(i32::from_le_bytes([buf_over[0], buf_over[1], buf_over[2], buf_over[3]]) > 0);

        assert_eq!(
            decompress_combined(&codec, &buf_over).unwrap().secondary,
            over_limit
        );
    }
}
