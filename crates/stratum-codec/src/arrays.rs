//! Typed-array compression: byte, 16-bit, and 32-bit element arrays.
//!
//! Multi-byte elements are laid out little-endian before compression so the
//! byte stream is identical across host endianness.

use crate::codec::{Codec, CodecError};

/// Converts a `u16` slice to little-endian bytes.
pub fn u16s_to_le_bytes(values: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Converts a `u32` slice to little-endian bytes.
pub fn u32s_to_le_bytes(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parses little-endian bytes into `u16` values.
///
/// # Errors
///
/// [`CodecError::UnevenSize`] if the byte count is not a multiple of 2.
pub fn u16s_from_le_bytes(bytes: &[u8]) -> Result<Vec<u16>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::UnevenSize {
            actual: bytes.len(),
            unit: 2,
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Parses little-endian bytes into `u32` values.
///
/// # Errors
///
/// [`CodecError::UnevenSize`] if the byte count is not a multiple of 4.
pub fn u32s_from_le_bytes(bytes: &[u8]) -> Result<Vec<u32>, CodecError> {
    if bytes.len() % 4 != 0 {
        return Err(CodecError::UnevenSize {
            actual: bytes.len(),
            unit: 4,
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Compresses a byte array.
pub fn compress_bytes(codec: &dyn Codec, data: &[u8]) -> Vec<u8> {
    codec.compress(data)
}

/// Decompresses a byte array.
pub fn decompress_bytes(codec: &dyn Codec, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    codec.decompress(data)
}

/// Compresses a 16-bit element array.
pub fn compress_u16s(codec: &dyn Codec, values: &[u16]) -> Vec<u8> {
    codec.compress(&u16s_to_le_bytes(values))
}

/// Decompresses a 16-bit element array.
pub fn decompress_u16s(codec: &dyn Codec, data: &[u8]) -> Result<Vec<u16>, CodecError> {
    u16s_from_le_bytes(&codec.decompress(data)?)
}

/// Compresses a 32-bit element array.
pub fn compress_u32s(codec: &dyn Codec, values: &[u32]) -> Vec<u8> {
    codec.compress(&u32s_to_le_bytes(values))
}

/// Decompresses a 32-bit element array.
pub fn decompress_u32s(codec: &dyn Codec, data: &[u8]) -> Result<Vec<u32>, CodecError> {
    u32s_from_le_bytes(&codec.decompress(data)?)
}
