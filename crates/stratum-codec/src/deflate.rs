//! Deflate backend: general-purpose streaming codec, better ratio than LZ4.
//!
//! Holds native zlib compression/decompression contexts that are reused
//! across calls and can be recreated on demand (e.g. after a protocol
//! renegotiation drops the codec back to a pristine state).

use std::sync::Mutex;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::codec::{Codec, CodecError};

/// Raw-deflate compression with reusable native contexts.
///
/// The container prepends the uncompressed size as a `u32` little-endian so
/// decompression can allocate exactly once.
pub struct DeflateCodec {
    compress: Mutex<Compress>,
    decompress: Mutex<Decompress>,
}

impl DeflateCodec {
    /// Creates the codec with fresh contexts at the default compression level.
    pub fn new() -> Self {
        Self {
            compress: Mutex::new(Compress::new(Compression::default(), false)),
            decompress: Mutex::new(Decompress::new(false)),
        }
    }

    /// Drops and rebuilds both native contexts.
    pub fn recreate(&self) {
        *self
            .compress
            .lock()
            .expect("deflate compress context poisoned") = Compress::new(Compression::default(), false);
        *self
            .decompress
            .lock()
            .expect("deflate decompress context poisoned") = Decompress::new(false);
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for DeflateCodec {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + data.len() / 2);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());

        let mut ctx = self
            .compress
            .lock()
            .expect("deflate compress context poisoned");
        ctx.reset();

        loop {
            let consumed = ctx.total_in() as usize;
            if out.capacity() == out.len() {
                out.reserve(1024.max(out.len() / 2));
            }
            let status = ctx
                .compress_vec(&data[consumed..], &mut out, FlushCompress::Finish)
                .expect("deflate compression failed on in-memory buffer");
            if matches!(status, Status::StreamEnd) {
                break;
            }
        }
        out
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.len() < 4 {
            return Err(CodecError::Truncated {
                expected: 4,
                actual: data.len(),
            });
        }
        let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let body = &data[4..];

        let mut out = Vec::with_capacity(size);
        let mut ctx = self
            .decompress
            .lock()
            .expect("deflate decompress context poisoned");
        ctx.reset(false);

        loop {
            let before_in = ctx.total_in() as usize;
            let before_out = out.len();
            if out.capacity() == out.len() {
                out.reserve(1024.max(size.saturating_sub(out.len()) + 16));
            }
            let status = ctx
                .decompress_vec(&body[before_in..], &mut out, FlushDecompress::Finish)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            if matches!(status, Status::StreamEnd) {
                break;
            }
            if ctx.total_in() as usize == before_in && out.len() == before_out {
                return Err(CodecError::Decompress(
                    "deflate stream ended prematurely".to_string(),
                ));
            }
        }

        if out.len() != size {
            return Err(CodecError::Decompress(format!(
                "size header said {size} bytes, stream produced {}",
                out.len()
            )));
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "deflate"
    }
}
