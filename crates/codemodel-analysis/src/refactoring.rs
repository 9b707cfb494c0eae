use crate::{ComplexityAnalyzer, CoverageMapper, PatternDetector, GOD_OBJECT};
use codemodel_core::{
    CodeModelConfig, CodeModelError, Direction, Modifier, RefactoringConfig, RelationKind, Result,
    Symbol, SymbolId, SymbolSummary,
};
use codemodel_graph::{find_cycles, GraphStore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    ReduceComplexity,
    SplitGodObject,
    AddTests,
    BreakDependencyCycle,
}

impl SuggestionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionCategory::ReduceComplexity => "reduce_complexity",
            SuggestionCategory::SplitGodObject => "split_god_object",
            SuggestionCategory::AddTests => "add_tests",
            SuggestionCategory::BreakDependencyCycle => "break_dependency_cycle",
        }
    }
}

impl fmt::Display for SuggestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RefactoringSuggestion {
    pub symbol: SymbolSummary,
    pub category: SuggestionCategory,
    pub message: String,
    /// In `[0, 1]`
    pub severity: f64,
    /// Other symbols involved (cycle members, god object members)
    pub related: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RefactoringReport {
    /// Root symbol when the advice was scoped
    pub scope: Option<SymbolId>,
    pub suggestions: Vec<RefactoringSuggestion>,
    /// Suggestions produced before the cap was applied
    pub total_candidates: usize,
}

/// Combines complexity, anti-pattern, coverage and cycle signals into ranked advice.
#[derive(Debug, Clone)]
pub struct RefactoringAdvisor {
    config: RefactoringConfig,
    complexity: ComplexityAnalyzer,
    patterns: PatternDetector,
    coverage: CoverageMapper,
}

impl RefactoringAdvisor {
    pub fn new(config: &CodeModelConfig) -> Self {
        Self {
            config: config.refactoring.clone(),
            complexity: ComplexityAnalyzer::new(config.complexity.clone()),
            patterns: PatternDetector::new(config.patterns.clone()),
            coverage: CoverageMapper::new(config.traversal.coverage_depth),
        }
    }

    pub fn complexity(&self) -> &ComplexityAnalyzer {
        &self.complexity
    }

    pub fn patterns(&self) -> &PatternDetector {
        &self.patterns
    }

    pub fn coverage(&self) -> &CoverageMapper {
        &self.coverage
    }

    /// Suggestions for the whole graph, or for `symbol` and its direct
    /// neighbours only.
    ///
    /// Ranked by severity descending, then symbol id, then category, and capped
    /// at `max_suggestions`.
    pub fn suggest(&self, store: &GraphStore, symbol: Option<&SymbolId>) -> Result<RefactoringReport> {
        let threshold = self.config.complexity_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CodeModelError::invalid_argument(
                "complexity_threshold",
                threshold,
                "must be a non-negative number",
            ));
        }

        let scope: Option<BTreeSet<SymbolId>> = match symbol {
            Some(root) => {
                let mut ids: BTreeSet<SymbolId> = store
                    .neighbors(root, None, Direction::Both)?
                    .into_iter()
                    .map(|n| n.symbol.id.clone())
                    .collect();
                ids.insert(root.clone());
                Some(ids)
            }
            None => None,
        };
        let in_scope = |id: &SymbolId| scope.as_ref().map_or(true, |ids| ids.contains(id));

        let mut suggestions = Vec::new();

        // Complexity
        let report = self.complexity.analyze(store, None, threshold)?;
        let mut complex: HashMap<SymbolId, f64> = HashMap::new();
        for score in report.scores.iter().filter(|s| s.flagged) {
            complex.insert(score.symbol.id.clone(), score.score);
            if !in_scope(&score.symbol.id) {
                continue;
            }
            suggestions.push(RefactoringSuggestion {
                symbol: score.symbol.clone(),
                category: SuggestionCategory::ReduceComplexity,
                message: format!(
                    "{} scores {:.1} against a threshold of {:.1}; extract branches or flatten nesting",
                    score.symbol.name, score.score, threshold
                ),
                severity: complexity_severity(score.score, threshold),
                related: Vec::new(),
            });
        }

        // God objects
        for found in self.patterns.detect(store, Some(GOD_OBJECT))? {
            if !in_scope(&found.anchor) {
                continue;
            }
            let Ok(class) = store.get_symbol(&found.anchor) else {
                continue;
            };
            suggestions.push(RefactoringSuggestion {
                symbol: class.summary(),
                category: SuggestionCategory::SplitGodObject,
                message: format!("{}; split it into focused collaborators", found.description),
                severity: found.confidence.clamp(0.0, 1.0),
                related: found
                    .symbols
                    .iter()
                    .filter(|id| **id != found.anchor)
                    .cloned()
                    .collect(),
            });
        }

        // Coverage
        let coverage = self.coverage.map(store, None);
        for entry in coverage.symbols.iter().filter(|s| !s.covered) {
            if !in_scope(&entry.symbol.id) {
                continue;
            }
            let Ok(symbol) = store.get_symbol(&entry.symbol.id) else {
                continue;
            };
            let is_complex = complex.contains_key(&symbol.id);
            if !is_complex && !is_public(&symbol) {
                continue;
            }
            let mut severity = self.config.uncovered_severity;
            if is_complex {
                severity += 0.3;
            }
            suggestions.push(RefactoringSuggestion {
                symbol: entry.symbol.clone(),
                category: SuggestionCategory::AddTests,
                message: if is_complex {
                    format!("{} is complex and no test exercises it", symbol.name)
                } else {
                    format!("{} is public and no test exercises it", symbol.name)
                },
                severity: severity.clamp(0.0, 1.0),
                related: Vec::new(),
            });
        }

        // Dependency cycles
        for cycle in find_cycles(store, &[RelationKind::Calls, RelationKind::Imports]) {
            for member in &cycle {
                if !in_scope(member) {
                    continue;
                }
                let Ok(symbol) = store.get_symbol(member) else {
                    continue;
                };
                let related: Vec<SymbolId> = cycle.iter().filter(|id| *id != member).cloned().collect();
                suggestions.push(RefactoringSuggestion {
                    symbol: symbol.summary(),
                    category: SuggestionCategory::BreakDependencyCycle,
                    message: if related.is_empty() {
                        format!("{} depends on itself", symbol.name)
                    } else {
                        format!(
                            "{} is part of a dependency cycle with {} other symbol(s)",
                            symbol.name,
                            related.len()
                        )
                    },
                    severity: CYCLE_SEVERITY,
                    related,
                });
            }
        }

        suggestions.sort_by(|a, b| {
            b.severity
                .total_cmp(&a.severity)
                .then_with(|| a.symbol.id.cmp(&b.symbol.id))
                .then_with(|| a.category.cmp(&b.category))
        });
        let total_candidates = suggestions.len();
        suggestions.truncate(self.config.max_suggestions);

        debug!(
            scope = symbol.map(|s| s.as_str()).unwrap_or("*"),
            total_candidates,
            returned = suggestions.len(),
            "Refactoring suggestions ranked"
        );

        Ok(RefactoringReport {
            scope: symbol.cloned(),
            suggestions,
            total_candidates,
        })
    }
}

const CYCLE_SEVERITY: f64 = 0.6;

/// 0.5 at the threshold, rising linearly to 1.0 at twice the threshold.
fn complexity_severity(score: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 1.0;
    }
    0.5 + 0.5 * ((score - threshold) / threshold).clamp(0.0, 1.0)
}

/// Explicitly public, or not marked private/protected and not `_`-prefixed.
fn is_public(symbol: &Symbol) -> bool {
    if symbol.has_modifier(Modifier::Public) {
        return true;
    }
    !symbol.has_modifier(Modifier::Private)
        && !symbol.has_modifier(Modifier::Protected)
        && !symbol.name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use codemodel_core::{Location, Relationship, SymbolKind};

    fn add(store: &GraphStore, symbol: Symbol) {
        store.upsert_symbol(symbol).unwrap();
    }

    fn function(id: &str) -> Symbol {
        Symbol::new(id, id, SymbolKind::Function, Location::new("svc.py", 1, 20)).with_module("svc")
    }

    fn fixture() -> GraphStore {
        let store = GraphStore::new();
        // score 1*12 + 2*4 = 20 -> severity 0.5 + 0.5 * 1.0
        add(&store, function("process").with_metrics(12, 4));
        add(&store, function("_helper"));
        add(&store, function("render"));
        add(&store, Symbol::new("test_render", "test_render", SymbolKind::Test, Location::new("t.py", 1, 2)));
        add(&store, function("ping"));
        add(&store, function("pong"));
        for (from, to, kind) in [
            ("test_render", "render", RelationKind::Tests),
            ("ping", "pong", RelationKind::Calls),
            ("pong", "ping", RelationKind::Calls),
        ] {
            store.upsert_relationship(Relationship::new(from, to, kind)).unwrap();
        }
        store
    }

    fn advisor() -> RefactoringAdvisor {
        RefactoringAdvisor::new(&CodeModelConfig::default())
    }

    #[test]
    fn test_signals_combined_and_ranked() {
        let report = advisor().suggest(&fixture(), None).unwrap();
        let found: Vec<(&str, SuggestionCategory)> = report
            .suggestions
            .iter()
            .map(|s| (s.symbol.id.as_str(), s.category))
            .collect();

        assert_eq!(
            found,
            vec![
                ("process", SuggestionCategory::ReduceComplexity),
                ("process", SuggestionCategory::AddTests),
                ("ping", SuggestionCategory::BreakDependencyCycle),
                ("pong", SuggestionCategory::BreakDependencyCycle),
                ("ping", SuggestionCategory::AddTests),
                ("pong", SuggestionCategory::AddTests),
            ]
        );
        assert_relative_eq!(report.suggestions[0].severity, 1.0);
        // uncovered_severity + 0.3
        assert_relative_eq!(report.suggestions[1].severity, 0.7);
        assert_eq!(report.suggestions[2].related, vec![SymbolId::from("pong")]);
    }

    #[test]
    fn test_private_uncovered_symbol_is_not_flagged() {
        let report = advisor().suggest(&fixture(), None).unwrap();
        assert!(report.suggestions.iter().all(|s| s.symbol.id.as_str() != "_helper"));
        assert!(report.suggestions.iter().all(|s| s.symbol.id.as_str() != "render"));
    }

    #[test]
    fn test_scoped_to_symbol_and_neighbors() {
        let report = advisor().suggest(&fixture(), Some(&"ping".into())).unwrap();
        assert_eq!(report.scope, Some(SymbolId::from("ping")));
        assert!(report
            .suggestions
            .iter()
            .all(|s| matches!(s.symbol.id.as_str(), "ping" | "pong")));
        assert_eq!(report.suggestions.len(), 4);
    }

    #[test]
    fn test_unknown_scope_symbol_fails() {
        let err = advisor().suggest(&fixture(), Some(&"missing".into())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_cap_keeps_total_count() {
        let mut config = CodeModelConfig::default();
        config.refactoring.max_suggestions = 2;
        let report = RefactoringAdvisor::new(&config).suggest(&fixture(), None).unwrap();
        assert_eq!(report.suggestions.len(), 2);
        assert_eq!(report.total_candidates, 6);
    }

    #[test]
    fn test_severity_curve() {
        assert_relative_eq!(complexity_severity(10.0, 10.0), 0.5);
        assert_relative_eq!(complexity_severity(15.0, 10.0), 0.75);
        assert_relative_eq!(complexity_severity(50.0, 10.0), 1.0);
        assert_relative_eq!(complexity_severity(3.0, 0.0), 1.0);
    }
}
