use crate::object::{ObjectId, ObjectKind, SectionId};

/// Errors from container store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The requested metadata section was not found.
    #[error("section not found: {0}")]
    SectionNotFound(SectionId),

    /// The object exists but has a different kind than the caller expected.
    #[error("object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// A sibling with the same name already exists in the namespace.
    #[error("name {name:?} already taken in {namespace}")]
    DuplicateName { namespace: String, name: String },

    /// Deleting the object would leave a dangling link from a surviving one.
    #[error("cannot delete {id}: still referenced by {by}")]
    StillReferenced { id: ObjectId, by: ObjectId },

    /// A section cannot be moved into its own subtree.
    #[error("cannot move section {id} under its descendant {parent}")]
    SectionCycle { id: SectionId, parent: SectionId },

    /// The store was opened read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// The open mode string is not recognised.
    #[error("invalid open mode: {0:?}")]
    InvalidMode(String),

    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization, deserialization or checksum failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The file is not a container document this build can read.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
