use crate::{Location, Modifier, StructuralMetrics, SymbolId, SymbolKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named, located code element as delivered by the parser feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    /// Owning module, e.g. `billing.cart` or `crate::billing`
    #[serde(default)]
    pub module: String,
    /// Lexical container (class owning a method or field). May point at a symbol
    /// that has not been ingested yet.
    pub parent: Option<SymbolId>,
    pub signature: Option<String>,
    pub documentation: Option<String>,
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
    #[serde(default)]
    pub metrics: StructuralMetrics,
}

impl Symbol {
    pub fn new(
        id: impl Into<SymbolId>,
        name: impl Into<String>,
        kind: SymbolKind,
        location: Location,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            location,
            module: String::new(),
            parent: None,
            signature: None,
            documentation: None,
            modifiers: BTreeSet::new(),
            metrics: StructuralMetrics::default(),
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<SymbolId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    pub fn with_metrics(mut self, branch_count: u32, nesting_depth: u32) -> Self {
        self.metrics = StructuralMetrics {
            branch_count,
            nesting_depth,
        };
        self
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    /// True when the symbol lives in `filter` or one of its submodules.
    ///
    /// Submodules are recognised through the `::`, `.` and `/` separators, so
    /// `billing` matches `billing.cart` but not `billing_v2`.
    pub fn in_module(&self, filter: &str) -> bool {
        module_matches(&self.module, filter)
    }

    pub fn summary(&self) -> SymbolSummary {
        SymbolSummary::from(self)
    }
}

pub fn module_matches(module: &str, filter: &str) -> bool {
    if filter.is_empty() || module == filter {
        return true;
    }
    match module.strip_prefix(filter) {
        Some(rest) => rest.starts_with("::") || rest.starts_with('.') || rest.starts_with('/'),
        None => false,
    }
}

/// Compact symbol view embedded in query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SymbolSummary {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub module: String,
    pub location: Location,
}

impl From<&Symbol> for SymbolSummary {
    fn from(symbol: &Symbol) -> Self {
        Self {
            id: symbol.id.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind,
            module: symbol.module.clone(),
            location: symbol.location.clone(),
        }
    }
}
