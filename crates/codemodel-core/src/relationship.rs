use crate::{CodeModelError, RelationKind, Result, Symbol, SymbolId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Directed, typed edge between two symbols.
///
/// `(source, target, kind)` is the identity of an edge: inserting the same triple
/// twice yields a single edge whose strength is the last one written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub source: SymbolId,
    pub target: SymbolId,
    pub kind: RelationKind,
    pub strength: f64,
}

impl Relationship {
    pub fn new(source: impl Into<SymbolId>, target: impl Into<SymbolId>, kind: RelationKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            strength: 1.0,
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            kind: self.kind,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.strength > 0.0 && self.strength <= 1.0) {
            return Err(CodeModelError::invalid_argument(
                "strength",
                self.strength,
                "relationship strength must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct EdgeKey {
    pub source: SymbolId,
    pub target: SymbolId,
    pub kind: RelationKind,
}

/// One record of the parser feed, the only ingestion path into the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ParserUpdate {
    UpsertSymbol { symbol: Symbol },
    RemoveSymbol { id: SymbolId },
    UpsertRelationship { relationship: Relationship },
    RemoveRelationship { key: EdgeKey },
}
