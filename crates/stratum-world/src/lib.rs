//! World map collaborators and the staged bulk-mutation pipeline.
//!
//! Gameplay code stages positional edits into a [`BulkEditor`] (or the
//! column-optimized [`ColumnEditor`]), which applies them chunk by chunk in
//! one locked pass, drives dirty marking, neighbor invalidation, and height
//! map updates, and optionally serializes a minimal network update.
//! Background workers in the [`ChunkLoadPool`] decode persisted chunks and
//! release them into the world map.

pub mod behavior;
pub mod bulk_edit;
pub mod column_edit;
pub mod coords;
pub mod loader;
pub mod net_sync;
pub mod update;
pub mod world_map;

pub use behavior::BlockBehavior;
pub use bulk_edit::{BulkEditor, CommitError, CommitStats};
pub use column_edit::ColumnEditor;
pub use coords::{BlockPos, ChunkCoord};
pub use loader::{ChunkLoadJob, ChunkLoadPool, LoadedChunk};
pub use net_sync::{BulkBlockUpdate, NO_CHANGE, SyncError, SyncSink, WireEdit};
pub use update::BlockUpdate;
pub use world_map::{DirtyNotification, DirtyParams, GridWorld, WorldMap};
