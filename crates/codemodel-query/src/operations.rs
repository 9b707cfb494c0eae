use crate::requests::*;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Every operation the facade exposes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Overview,
    FindSymbol,
    AnalyzeDependencies,
    TraceDataFlow,
    FindPatterns,
    AnalyzeComplexity,
    SuggestRefactoring,
    SemanticSearch,
    GetTestCoverage,
    ExplainArchitecture,
    FindSimilar,
    FindCycles,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::Overview,
        Operation::FindSymbol,
        Operation::AnalyzeDependencies,
        Operation::TraceDataFlow,
        Operation::FindPatterns,
        Operation::AnalyzeComplexity,
        Operation::SuggestRefactoring,
        Operation::SemanticSearch,
        Operation::GetTestCoverage,
        Operation::ExplainArchitecture,
        Operation::FindSimilar,
        Operation::FindCycles,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Overview => "overview",
            Operation::FindSymbol => "find_symbol",
            Operation::AnalyzeDependencies => "analyze_dependencies",
            Operation::TraceDataFlow => "trace_data_flow",
            Operation::FindPatterns => "find_patterns",
            Operation::AnalyzeComplexity => "analyze_complexity",
            Operation::SuggestRefactoring => "suggest_refactoring",
            Operation::SemanticSearch => "semantic_search",
            Operation::GetTestCoverage => "get_test_coverage",
            Operation::ExplainArchitecture => "explain_architecture",
            Operation::FindSimilar => "find_similar",
            Operation::FindCycles => "find_cycles",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::Overview => {
                "Counts of symbols and relationships by kind, modules, files and embedding progress."
            }
            Operation::FindSymbol => {
                "Look up symbols by name (case-insensitive substring or exact), optionally filtered \
                 by kind and module. Returns an empty list when nothing matches."
            }
            Operation::AnalyzeDependencies => {
                "Layered breadth-first dependency traversal from a symbol up to a depth, with cycle \
                 members marked."
            }
            Operation::TraceDataFlow => {
                "Follow a variable's value forward through readers and the variables they write, \
                 bounded by a maximum chain length."
            }
            Operation::FindPatterns => {
                "Detect design patterns and anti-patterns from the catalog, with confidence scores."
            }
            Operation::AnalyzeComplexity => {
                "Rank symbols by a weighted complexity score and flag those at or above a threshold."
            }
            Operation::SuggestRefactoring => {
                "Ranked refactoring suggestions combining complexity, anti-pattern, coverage and \
                 dependency-cycle signals."
            }
            Operation::SemanticSearch => {
                "Find symbols whose embedded description is closest to a natural-language query."
            }
            Operation::GetTestCoverage => {
                "Which symbols are exercised by tests, directly or through a short call chain."
            }
            Operation::ExplainArchitecture => {
                "Module-level structure: symbol counts, relationship density, cross-module \
                 dependencies, hubs and cycles."
            }
            Operation::FindSimilar => {
                "Symbols whose embeddings are closest to an already-embedded symbol."
            }
            Operation::FindCycles => {
                "Every dependency cycle in the graph over the given relationship kinds."
            }
        }
    }

    /// JSON schema of the operation's parameters.
    pub fn parameters_schema(self) -> JsonValue {
        let schema = match self {
            Operation::Overview => schemars::schema_for!(OverviewRequest),
            Operation::FindSymbol => schemars::schema_for!(FindSymbolRequest),
            Operation::AnalyzeDependencies => schemars::schema_for!(AnalyzeDependenciesRequest),
            Operation::TraceDataFlow => schemars::schema_for!(TraceDataFlowRequest),
            Operation::FindPatterns => schemars::schema_for!(FindPatternsRequest),
            Operation::AnalyzeComplexity => schemars::schema_for!(AnalyzeComplexityRequest),
            Operation::SuggestRefactoring => schemars::schema_for!(SuggestRefactoringRequest),
            Operation::SemanticSearch => schemars::schema_for!(SemanticSearchRequest),
            Operation::GetTestCoverage => schemars::schema_for!(GetTestCoverageRequest),
            Operation::ExplainArchitecture => schemars::schema_for!(ExplainArchitectureRequest),
            Operation::FindSimilar => schemars::schema_for!(FindSimilarRequest),
            Operation::FindCycles => schemars::schema_for!(FindCyclesRequest),
        };
        serde_json::to_value(schema).unwrap_or_default()
    }

    pub fn schema(self) -> OperationSchema {
        OperationSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name, description and parameter schema for registration with an
/// invocation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSchema {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

/// Name -> operation table.
pub fn operation_table() -> BTreeMap<&'static str, Operation> {
    Operation::ALL.iter().map(|op| (op.name(), *op)).collect()
}
