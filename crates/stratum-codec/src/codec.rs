//! The [`Codec`] trait and the shared compression error type.

use thiserror::Error;

/// A compression backend.
///
/// Implementations must be safe to share across threads; internal context
/// state (if any) is synchronized by the implementation. The compressed byte
/// stream is a codec-specific container — only the codec that produced a
/// buffer can decompress it.
pub trait Codec: Send + Sync {
    /// Compresses `data` into a self-contained byte stream.
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// Decompresses a byte stream produced by [`Codec::compress`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decompress`] if the stream is malformed or was
    /// produced by a different backend.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Short stable name, used for logging and codec negotiation.
    fn name(&self) -> &'static str;
}

/// Errors raised while decompressing or decoding compressed payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The backend rejected the compressed stream.
    #[error("decompression failed: {0}")]
    Decompress(String),
    /// The buffer ended before a complete section could be read.
    #[error("payload truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum byte count the section required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },
    /// A decompressed section is not a clean multiple of its element size.
    ///
    /// This indicates corrupt data or a misconfigured bucket size — fatal,
    /// never retried.
    #[error("decompressed size {actual} is not a multiple of {unit}")]
    UnevenSize {
        /// The offending byte count.
        actual: usize,
        /// The required divisor in bytes.
        unit: usize,
    },
}
