//! Codec-agnostic compression for chunk payloads and network transport.
//!
//! All persistence and wire code compresses through the [`Codec`] trait so the
//! concrete backend can be swapped at runtime (e.g. during protocol version
//! negotiation) without touching call sites. Two backends ship: LZ4 for
//! throughput (the process default) and Deflate for ratio.

pub mod active;
pub mod arrays;
pub mod codec;
pub mod combined;
pub mod deflate;
pub mod lz4;

pub use active::{active_codec, set_active_codec};
pub use codec::{Codec, CodecError};
pub use combined::{
    BUCKET_WORDS, CombinedPayload, INLINE_SECONDARY_MAX, compress_combined, decompress_combined,
};
pub use deflate::DeflateCodec;
pub use lz4::Lz4Codec;
