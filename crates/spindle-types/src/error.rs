use thiserror::Error;

/// Errors produced by record-model operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("shape {shape:?} requires {expected} values, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("ragged channel data: channel {channel} has {actual} samples, expected {expected}")]
    RaggedChannels {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),
}
