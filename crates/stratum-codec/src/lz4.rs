//! LZ4 backend: high throughput, moderate ratio. The process default.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::codec::{Codec, CodecError};

/// LZ4 block compression with a size-prepended container.
///
/// Stateless — every call is independent, so one instance can serve any
/// number of threads without contention.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Codec;

impl Lz4Codec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }
}

impl Codec for Lz4Codec {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        compress_prepend_size(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        decompress_size_prepended(data).map_err(|e| CodecError::Decompress(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "lz4"
    }
}
