//! Block type registry: maps compact [`BlockId`] values to [`BlockTypeDef`]
//! metadata.
//!
//! The registry is built once during session startup and owned by the world;
//! read paths receive it by reference — it is never a process-wide static.
//! Air is always id 0 so that zero-initialized chunk memory represents empty
//! space.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on registered block types. Ids are `u32` but wire formats
/// reserve negative values as sentinels, so the table stays well below
/// `i32::MAX`.
const MAX_BLOCK_TYPES: usize = 1 << 24;

/// Compact identifier stored inside every voxel cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Air / empty space.
    pub const AIR: Self = Self(0);

    /// Returns `true` for air (id 0).
    pub fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Transparency mode for a block type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transparency {
    /// Fully blocks light, rain, and visibility.
    Opaque,
    /// Partially transparent (e.g. water, stained glass).
    SemiTransparent,
    /// Completely transparent (e.g. air).
    FullyTransparent,
}

/// Full descriptor for a block type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockTypeDef {
    /// Human-readable name (e.g. "stone", "water").
    pub name: String,
    /// Whether entities collide with this block.
    pub solid: bool,
    /// Whether this block belongs in the fluid layer.
    pub fluid: bool,
    /// Transparency mode; drives the rain/sunlight height map.
    pub transparency: Transparency,
    /// Class name of the block entity attached to placed instances, if any.
    pub block_entity_class: Option<String>,
}

impl BlockTypeDef {
    /// `true` if this block stops rain and sunlight.
    pub fn blocks_rain(&self) -> bool {
        self.transparency == Transparency::Opaque
    }
}

/// Errors that can occur during block type registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with the same name has already been registered.
    #[error("duplicate block type name: {0}")]
    DuplicateName(String),
    /// All id slots have been consumed.
    #[error("block type registry is full (max {MAX_BLOCK_TYPES} types)")]
    RegistryFull,
}

/// Maps [`BlockId`] → [`BlockTypeDef`] with O(1) lookup by id and O(1)
/// reverse lookup by name.
pub struct BlockTypeRegistry {
    /// Dense array where `index == BlockId.0`.
    types: Vec<BlockTypeDef>,
    /// Reverse lookup: name → id.
    name_to_id: HashMap<String, BlockId>,
}

impl BlockTypeRegistry {
    /// Creates a new registry with air pre-registered as id 0.
    pub fn new() -> Self {
        let air = BlockTypeDef {
            name: "air".to_string(),
            solid: false,
            fluid: false,
            transparency: Transparency::FullyTransparent,
            block_entity_class: None,
        };

        let mut name_to_id = HashMap::new();
        name_to_id.insert("air".to_string(), BlockId::AIR);

        Self {
            types: vec![air],
            name_to_id,
        }
    }

    /// Registers a new block type and returns its assigned id.
    ///
    /// Ids are assigned sequentially starting from 1 (0 is air).
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] if the name is taken,
    /// [`RegistryError::RegistryFull`] if all slots are consumed.
    pub fn register(&mut self, def: BlockTypeDef) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.types.len() >= MAX_BLOCK_TYPES {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockId(self.types.len() as u32);
        self.name_to_id.insert(def.name.clone(), id);
        self.types.push(def);
        Ok(id)
    }

    /// Returns the definition for a given id, or `None` for ids this table
    /// never produced.
    pub fn get(&self, id: BlockId) -> Option<&BlockTypeDef> {
        self.types.get(id.0 as usize)
    }

    /// Returns the id for a named block type, or `None` if not found.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Returns `true` if the id maps through this table.
    pub fn contains(&self, id: BlockId) -> bool {
        (id.0 as usize) < self.types.len()
    }

    /// Total number of registered types (including air).
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.types.len() <= 1
    }

    /// `true` if the block stops rain and sunlight. Unknown ids are treated
    /// like air (conservative fallback).
    pub fn blocks_rain(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(BlockTypeDef::blocks_rain)
    }
}

impl Default for BlockTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
