use codemodel_core::CodeModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector is empty")]
    EmptyVector,

    #[error("Vector has zero magnitude")]
    ZeroVector,

    #[error("Vector contains non-finite components")]
    NonFinite,

    #[error("Batch size mismatch: expected {expected} embeddings, got {actual}")]
    BatchSizeMismatch { expected: usize, actual: usize },

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl From<VectorError> for CodeModelError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                CodeModelError::DimensionMismatch { expected, actual }
            }
            VectorError::EmptyVector | VectorError::ZeroVector | VectorError::NonFinite => {
                CodeModelError::invalid_argument("vector", "<vector>", err.to_string())
            }
            VectorError::BatchSizeMismatch { .. } => CodeModelError::Embedding(err.to_string()),
            VectorError::Snapshot(msg) => CodeModelError::Serialization(msg),
        }
    }
}
