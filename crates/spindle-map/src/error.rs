use spindle_store::StoreError;
use spindle_types::{EntityId, TypeError};

/// Errors from the mapping engine.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// A path segment does not exist in the container store.
    #[error("nothing at path {path}")]
    NotFound { path: String },

    /// A cross-reference was resolved before its target was written.
    #[error("entity {entity} has not been written in this pass")]
    UnresolvedReference { entity: EntityId },

    /// The arrays of one multi-channel signal do not share one section.
    #[error("signal {signal}: array {array} does not share the signal's metadata section")]
    MetadataConsistency { signal: String, array: String },

    /// The path string is malformed or names an impossible nesting.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// An entity name cannot be used as a container name.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A container object does not have the shape its type promises.
    #[error("corrupt object at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Mapper configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for mapping operations.
pub type MapResult<T> = Result<T, MapError>;
