use codemodel_core::CodeModelError;
use thiserror::Error;

/// Failure of a named operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: CodeModelError,
    },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid parameters for {operation}: {message}")]
    InvalidParameters {
        operation: &'static str,
        message: String,
    },
}

impl QueryError {
    pub fn operation(operation: &'static str, source: CodeModelError) -> Self {
        Self::Operation { operation, source }
    }

    /// Underlying engine error, if the operation reached the engine.
    pub fn engine_error(&self) -> Option<&CodeModelError> {
        match self {
            Self::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.engine_error().is_some_and(CodeModelError::is_not_found)
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidParameters { .. })
            || matches!(self.engine_error(), Some(CodeModelError::InvalidArgument { .. }))
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
