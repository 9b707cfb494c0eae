//! Typed parameters and results of the named operations.
//!
//! Absent optional fields mean "no filter" or "use the configured default".
//! Counts are signed so that negative input reaches validation and is
//! reported as an invalid argument rather than a decoding failure.

use codemodel_core::{CodeModelError, Direction, RelationKind, Result, SymbolId, SymbolKind, SymbolSummary};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OverviewRequest {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindSymbolRequest {
    /// Name or name fragment, matched case-insensitively
    pub name: String,
    /// Restrict to one symbol kind
    #[serde(default)]
    pub kind: Option<SymbolKind>,
    /// Require the whole name to match instead of a substring
    #[serde(default)]
    pub exact: bool,
    /// Restrict to a module and its submodules
    #[serde(default)]
    pub module: Option<String>,
    /// Maximum results (default: all)
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeDependenciesRequest {
    /// Symbol id, or a name that identifies exactly one symbol
    pub symbol: String,
    /// Hops to explore (default: 2, 0 returns the symbol alone)
    #[serde(default)]
    pub depth: Option<i64>,
    /// Edge direction to follow (default: outgoing)
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Relationship kinds to follow (default: imports, calls, references)
    #[serde(default)]
    pub kinds: Option<Vec<RelationKind>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TraceDataFlowRequest {
    /// Exact variable name to start from
    pub variable: String,
    /// Maximum hops in the chain (default: configured maximum flow length)
    #[serde(default)]
    pub max_length: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindPatternsRequest {
    /// Catalog entry to evaluate (default: all)
    #[serde(default)]
    pub pattern_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeComplexityRequest {
    /// Restrict to a module and its submodules
    #[serde(default)]
    pub module: Option<String>,
    /// Flagging threshold (default: configured threshold)
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SuggestRefactoringRequest {
    /// Scope advice to this symbol and its direct neighbours (default: whole graph)
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SemanticSearchRequest {
    /// Natural-language query
    pub query: String,
    /// Maximum results (default: configured search limit)
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetTestCoverageRequest {
    /// Restrict to a module and its submodules
    #[serde(default)]
    pub module: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExplainArchitectureRequest {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindSimilarRequest {
    /// Symbol id, or a name that identifies exactly one symbol
    pub symbol: String,
    /// Maximum results (default: configured search limit)
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindCyclesRequest {
    /// Relationship kinds forming the dependency graph (default: calls, imports)
    #[serde(default)]
    pub kinds: Option<Vec<RelationKind>>,
}

/// One semantic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredSymbol {
    pub symbol: SymbolSummary,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CycleReport {
    pub kinds: Vec<RelationKind>,
    /// Each cycle sorted by id; cycles sorted
    pub cycles: Vec<Vec<SymbolId>>,
}

/// `value` as a hop count in `0..=max`.
pub(crate) fn validate_depth(name: &'static str, value: i64, max: usize) -> Result<usize> {
    match usize::try_from(value) {
        Ok(depth) if depth <= max => Ok(depth),
        Ok(_) => Err(CodeModelError::invalid_argument(
            name,
            value,
            format!("must not exceed {}", max),
        )),
        Err(_) => Err(CodeModelError::invalid_argument(name, value, "must not be negative")),
    }
}

/// `value` as a result count in `1..=max`.
pub(crate) fn validate_limit(name: &'static str, value: i64, max: usize) -> Result<usize> {
    if value <= 0 {
        return Err(CodeModelError::invalid_argument(name, value, "must be greater than 0"));
    }
    match usize::try_from(value) {
        Ok(limit) if limit <= max => Ok(limit),
        _ => Err(CodeModelError::invalid_argument(
            name,
            value,
            format!("must not exceed {}", max),
        )),
    }
}

pub(crate) fn require_text(name: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CodeModelError::invalid_argument(name, value, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_bounds() {
        assert_eq!(validate_depth("depth", 0, 10).unwrap(), 0);
        assert_eq!(validate_depth("depth", 10, 10).unwrap(), 10);
        assert!(validate_depth("depth", -1, 10).is_err());
        assert!(validate_depth("depth", 11, 10).is_err());
    }

    #[test]
    fn test_limit_bounds() {
        assert_eq!(validate_limit("limit", 1, 100).unwrap(), 1);
        assert!(validate_limit("limit", 0, 100).is_err());
        assert!(validate_limit("limit", -5, 100).is_err());
        assert!(validate_limit("limit", 101, 100).is_err());
    }

    #[test]
    fn test_requests_reject_unknown_fields() {
        let parsed: std::result::Result<FindSymbolRequest, _> =
            serde_json::from_value(serde_json::json!({"name": "x", "nmae": "y"}));
        assert!(parsed.is_err());

        let parsed: FindSymbolRequest =
            serde_json::from_value(serde_json::json!({"name": "parse", "kind": "function"})).unwrap();
        assert_eq!(parsed.kind, Some(SymbolKind::Function));
        assert!(!parsed.exact);
    }
}
