//! Collision layers and filtering

use serde::{Deserialize, Serialize};

/// A collision layer identifier (bit index, 0..32)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionLayer(pub u32);

impl CollisionLayer {
    /// Default layer
    pub const DEFAULT: Self = Self(0);
    /// Player layer
    pub const PLAYER: Self = Self(1);
    /// Enemy layer
    pub const ENEMIES: Self = Self(2);
    /// Projectile layer
    pub const PROJECTILES: Self = Self(3);
    /// Trigger/area layer
    pub const TRIGGERS: Self = Self(4);
    /// Static environment layer
    pub const ENVIRONMENT: Self = Self(5);

    /// Create a custom layer
    pub const fn custom(id: u32) -> Self {
        Self(id)
    }

    /// Get the layer as a bitmask; layers past 31 map to an empty mask
    pub fn as_mask(&self) -> u32 {
        1u32.checked_shl(self.0).unwrap_or(0)
    }
}

impl Default for CollisionLayer {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Layer ("what am I") and mask ("what do I test against") of a collision object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionGroups {
    /// Layers this object lives on
    pub layer: u32,
    /// Layers this object scans
    pub mask: u32,
}

impl CollisionGroups {
    /// On every layer, scanning every layer
    pub const ALL: Self = Self {
        layer: u32::MAX,
        mask: u32::MAX,
    };

    /// Invisible to everything
    pub const NONE: Self = Self { layer: 0, mask: 0 };

    /// Create new collision groups
    pub fn new(layer: u32, mask: u32) -> Self {
        Self { layer, mask }
    }

    /// Create from a single layer that scans specific layers
    pub fn from_layer(layer: CollisionLayer, scans: &[CollisionLayer]) -> Self {
        let mask = scans.iter().fold(0u32, |acc, l| acc | l.as_mask());
        Self {
            layer: layer.as_mask(),
            mask,
        }
    }

    /// Whether a query scanning `query_mask` can see this object
    pub fn visible_to(&self, query_mask: u32) -> bool {
        self.layer & query_mask != 0
    }

    /// Symmetric pair test used when a body moves: either side scanning the other is enough
    pub fn interacts_with(&self, other: &CollisionGroups) -> bool {
        (self.layer & other.mask) != 0 || (other.layer & self.mask) != 0
    }

    /// Add a layer to membership
    pub fn add_layer(mut self, layer: CollisionLayer) -> Self {
        self.layer |= layer.as_mask();
        self
    }

    /// Add a layer to the scan mask
    pub fn add_mask(mut self, layer: CollisionLayer) -> Self {
        self.mask |= layer.as_mask();
        self
    }

    /// Remove a layer from membership
    pub fn remove_layer(mut self, layer: CollisionLayer) -> Self {
        self.layer &= !layer.as_mask();
        self
    }

    /// Remove a layer from the scan mask
    pub fn remove_mask(mut self, layer: CollisionLayer) -> Self {
        self.mask &= !layer.as_mask();
        self
    }
}

impl Default for CollisionGroups {
    fn default() -> Self {
        Self::new(CollisionLayer::DEFAULT.as_mask(), CollisionLayer::DEFAULT.as_mask())
    }
}
