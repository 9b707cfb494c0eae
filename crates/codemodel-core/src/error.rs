use crate::{RelationKind, SymbolId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodeModelError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid argument `{name}` = {value}: {reason}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid edge {from} -[{kind}]-> {to}: endpoint {missing} does not exist")]
    InvalidEdge {
        from: SymbolId,
        to: SymbolId,
        kind: RelationKind,
        missing: SymbolId,
    },

    #[error("embedding not yet computed for symbol {0}")]
    IndexUnavailable(SymbolId),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CodeModelError {
    pub fn symbol_not_found(id: &SymbolId) -> Self {
        Self::NotFound {
            kind: "symbol",
            id: id.to_string(),
        }
    }

    pub fn invalid_argument(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for CodeModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodeModelError>;
