//! Error types for the space system

use crate::object::Rid;
use thiserror::Error;

/// Space errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpaceError {
    /// Collision object not registered in this space
    #[error("Collision object not found: {0:?}")]
    ObjectNotFound(Rid),

    /// Shape index past the end of an object's shape list
    #[error("Shape index {index} out of range for object {object:?}")]
    ShapeIndexOutOfRange {
        /// Owning object
        object: Rid,
        /// Requested index
        index: usize,
    },

    /// The object exists but is an area, not a body
    #[error("Collision object {0:?} is not a body")]
    NotABody(Rid),

    /// The space is mid-step and refuses structural access
    #[error("Space is locked")]
    SpaceLocked,

    /// Query shape must be convex
    #[error("Query shape is not convex")]
    NonConvexShape,

    /// Invalid configuration
    #[error("Invalid space configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("Failed to parse space configuration: {0}")]
    ConfigParse(String),

    /// Shape creation failed
    #[error("Failed to create collision shape: {0}")]
    ShapeCreationFailed(String),
}

/// Result type for space operations
pub type Result<T> = std::result::Result<T, SpaceError>;
