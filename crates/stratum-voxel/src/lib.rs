//! Palette-compressed voxel chunk storage, the fine-grained chunk lock, and
//! the block type registry.

pub mod bit_plane;
pub mod chunk;
pub mod chunk_lock;
pub mod heightmap;
pub mod palette_layer;
pub mod registry;
pub mod serial;
pub mod shutdown;

pub use bit_plane::{BitPlane, PLANE_WORDS};
pub use chunk::{
    BULK_EDIT_BIT, CHUNK_AREA, CHUNK_SIZE, CHUNK_VOLUME, Chunk, MESH_DIRTY, NETWORK_DIRTY,
    RECLASSIFY_BIT, SAVE_DIRTY, cell_index,
};
pub use chunk_lock::{ChunkLock, LockError, WriterBit};
pub use heightmap::ColumnHeightMap;
pub use palette_layer::PaletteLayer;
pub use registry::{BlockId, BlockTypeDef, BlockTypeRegistry, RegistryError, Transparency};
pub use serial::{ChunkSerError, layer_from_bytes, layer_to_bytes};
pub use shutdown::ShutdownFlag;
