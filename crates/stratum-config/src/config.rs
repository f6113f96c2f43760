//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stratum_codec::{DeflateCodec, Lz4Codec, set_active_codec};

use crate::error::ConfigError;

/// Top-level configuration for the storage core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Work queue settings.
    pub queue: QueueConfig,
    /// Chunk loader settings.
    pub load: LoadConfig,
    /// Compression settings.
    pub compression: CompressionConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Work queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Chunk-load queue capacity. Rounded up to a power of two at
    /// construction; hard maximum 65536. Sized for the deployment — the
    /// queue treats overflow as a fatal configuration error.
    pub load_capacity: usize,
}

/// Chunk loader settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    /// Worker thread count. 0 = derive from the CPU count.
    pub worker_threads: usize,
    /// Bounded capacity of the loaded-chunk result channel.
    pub result_capacity: usize,
}

/// Compression backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodecChoice {
    /// LZ4: high throughput, the default.
    Lz4,
    /// Deflate: better ratio, reusable native contexts.
    Deflate,
}

/// Compression settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    /// Active codec for chunk payloads and network sync.
    pub codec: CodecChoice,
}

/// Debug/development settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g. "debug", "info,stratum_world=trace").
    pub log_level: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            load_capacity: 4096,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            result_capacity: 256,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CodecChoice::Lz4,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a RON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&content).map_err(ConfigError::ParseError)
    }

    /// Saves configuration to a RON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default();
        let content =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::WriteError)
    }

    /// Installs the configured compression backend as the process-wide
    /// active codec.
    pub fn apply_compression(&self) {
        match self.compression.codec {
            CodecChoice::Lz4 => set_active_codec(Arc::new(Lz4Codec::new())),
            CodecChoice::Deflate => set_active_codec(Arc::new(DeflateCodec::new())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = EngineConfig::default();
        assert!(config.queue.load_capacity > 0);
        assert!(config.queue.load_capacity <= 65_536);
        assert_eq!(config.load.worker_threads, 0, "auto thread count by default");
        assert_eq!(config.compression.codec, CodecChoice::Lz4);
    }

    #[test]
    fn test_ron_roundtrip() {
        let mut config = EngineConfig::default();
        config.queue.load_capacity = 1024;
        config.compression.codec = CodecChoice::Deflate;
        config.debug.log_level = "debug".to_string();

        let pretty = ron::ser::PrettyConfig::default();
        let text = ron::ser::to_string_pretty(&config, pretty).unwrap();
        let restored: EngineConfig = ron::from_str(&text).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratum.ron");

        let mut config = EngineConfig::default();
        config.load.worker_threads = 3;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EngineConfig = ron::from_str("(queue: (load_capacity: 8))").unwrap();
        assert_eq!(config.queue.load_capacity, 8);
        assert_eq!(config.load.result_capacity, LoadConfig::default().result_capacity);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = EngineConfig::load(Path::new("/nonexistent/stratum.ron"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_apply_compression_installs_codec() {
        let mut config = EngineConfig::default();
        config.compression.codec = CodecChoice::Deflate;
        config.apply_compression();
        assert_eq!(stratum_codec::active_codec().name(), "deflate");

        config.compression.codec = CodecChoice::Lz4;
        config.apply_compression();
        assert_eq!(stratum_codec::active_codec().name(), "lz4");
    }
}
