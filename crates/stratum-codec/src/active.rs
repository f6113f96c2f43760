//! Process-wide active codec selection.
//!
//! A single swappable pointer decides which backend every call site uses, so
//! protocol version negotiation can change the codec at runtime without
//! threading a codec handle through the whole engine.

use std::sync::{Arc, OnceLock, RwLock};

use crate::codec::Codec;
use crate::lz4::Lz4Codec;

static ACTIVE: OnceLock<RwLock<Arc<dyn Codec>>> = OnceLock::new();

fn slot() -> &'static RwLock<Arc<dyn Codec>> {
    ACTIVE.get_or_init(|| RwLock::new(Arc::new(Lz4Codec::new())))
}

/// Returns the currently active codec. Defaults to LZ4.
pub fn active_codec() -> Arc<dyn Codec> {
    Arc::clone(&slot().read().expect("active codec lock poisoned"))
}

/// Replaces the process-wide active codec.
pub fn set_active_codec(codec: Arc<dyn Codec>) {
    tracing::debug!(codec = codec.name(), "switching active codec");
    *slot().write().expect("active codec lock poisoned") = codec;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::DeflateCodec;

    #[test]
    fn test_default_codec_roundtrips() {
        let codec = active_codec();
        let data = vec![3u8; 2048];
        let restored = codec.decompress(&codec.compress(&data)).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_swap_changes_backend() {
        set_active_codec(Arc::new(DeflateCodec::new()));
        assert_eq!(active_codec().name(), "deflate");
        // Restore the default so other tests in this process are unaffected.
        set_active_codec(Arc::new(Lz4Codec::new()));
        assert_eq!(active_codec().name(), "lz4");
    }
}
