use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Stable symbol identifier handed out by the parser feed (e.g. `src/cart.py::Cart.total`).
///
/// Identifiers survive re-indexing of unchanged code, so they double as the
/// deterministic tie-break key for every ordered result.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SymbolId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SymbolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Module,
    Variable,
    Field,
    Test,
    Other,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 9] = [
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Class,
        SymbolKind::Interface,
        SymbolKind::Module,
        SymbolKind::Variable,
        SymbolKind::Field,
        SymbolKind::Test,
        SymbolKind::Other,
    ];

    /// Functions and methods: the symbols that carry executable bodies.
    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    pub fn is_type(self) -> bool {
        matches!(self, SymbolKind::Class | SymbolKind::Interface)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Module => "module",
            SymbolKind::Variable => "variable",
            SymbolKind::Field => "field",
            SymbolKind::Test => "test",
            SymbolKind::Other => "other",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "function" | "fn" | "def" => Ok(SymbolKind::Function),
            "method" => Ok(SymbolKind::Method),
            "class" | "struct" => Ok(SymbolKind::Class),
            "interface" | "trait" | "protocol" => Ok(SymbolKind::Interface),
            "module" | "package" | "namespace" => Ok(SymbolKind::Module),
            "variable" | "var" | "const" => Ok(SymbolKind::Variable),
            "field" | "attribute" | "property" => Ok(SymbolKind::Field),
            "test" => Ok(SymbolKind::Test),
            "other" => Ok(SymbolKind::Other),
            other => Err(format!("unknown symbol kind: {}", other)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Abstract,
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl Location {
    pub fn new(file_path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            file_path: file_path.into(),
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

/// Raw structural measurements supplied by the parser for a symbol body.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct StructuralMetrics {
    pub branch_count: u32,
    pub nesting_depth: u32,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Calls,
    Imports,
    Inherits,
    References,
    WritesTo,
    ReadsFrom,
    Tests,
}

impl RelationKind {
    pub const ALL: [RelationKind; 7] = [
        RelationKind::Calls,
        RelationKind::Imports,
        RelationKind::Inherits,
        RelationKind::References,
        RelationKind::WritesTo,
        RelationKind::ReadsFrom,
        RelationKind::Tests,
    ];

    /// Edge kinds followed by dependency analysis.
    pub const DEPENDENCY: [RelationKind; 3] = [
        RelationKind::Imports,
        RelationKind::Calls,
        RelationKind::References,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Calls => "calls",
            RelationKind::Imports => "imports",
            RelationKind::Inherits => "inherits",
            RelationKind::References => "references",
            RelationKind::WritesTo => "writes-to",
            RelationKind::ReadsFrom => "reads-from",
            RelationKind::Tests => "tests",
        }
    }
}

impl Default for RelationKind {
    fn default() -> Self {
        RelationKind::References
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "calls" | "call" => Ok(RelationKind::Calls),
            "imports" | "import" => Ok(RelationKind::Imports),
            "inherits" | "extends" | "implements" => Ok(RelationKind::Inherits),
            "references" | "uses" => Ok(RelationKind::References),
            "writes-to" | "writes" => Ok(RelationKind::WritesTo),
            "reads-from" | "reads" => Ok(RelationKind::ReadsFrom),
            "tests" => Ok(RelationKind::Tests),
            other => Err(format!("unknown relationship kind: {}", other)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    pub fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_kind_parses_aliases() {
        assert_eq!("writes_to".parse::<RelationKind>(), Ok(RelationKind::WritesTo));
        assert_eq!("Reads-From".parse::<RelationKind>(), Ok(RelationKind::ReadsFrom));
        assert_eq!("extends".parse::<RelationKind>(), Ok(RelationKind::Inherits));
        assert!("friend".parse::<RelationKind>().is_err());
    }

    #[test]
    fn relation_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&RelationKind::WritesTo).unwrap();
        assert_eq!(json, "\"writes-to\"");
        assert_eq!(RelationKind::ReadsFrom.to_string(), "reads-from");
    }

    #[test]
    fn symbol_kind_round_trips_through_display() {
        for kind in SymbolKind::ALL {
            assert_eq!(kind.to_string().parse::<SymbolKind>(), Ok(kind));
        }
    }

    #[test]
    fn location_clamps_inverted_ranges() {
        let loc = Location::new("a.py", 10, 3);
        assert_eq!(loc.end_line, 10);
        assert_eq!(loc.line_count(), 1);
    }
}
