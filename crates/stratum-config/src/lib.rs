//! Runtime configuration for the storage core.
//!
//! Settings persist to disk as RON files and deserialize with
//! `#[serde(default)]` so old files keep working as fields are added.

mod config;
mod error;

pub use config::{CodecChoice, CompressionConfig, DebugConfig, EngineConfig, LoadConfig, QueueConfig};
pub use error::ConfigError;
