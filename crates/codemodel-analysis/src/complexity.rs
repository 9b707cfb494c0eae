use codemodel_core::{
    CodeModelError, ComplexityConfig, Direction, RelationKind, Result, Symbol, SymbolKind,
    SymbolSummary,
};
use codemodel_graph::GraphStore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Symbol kinds that carry a body worth scoring.
pub const SCORED_KINDS: [SymbolKind; 4] = [
    SymbolKind::Function,
    SymbolKind::Method,
    SymbolKind::Class,
    SymbolKind::Test,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexityMetrics {
    pub branch_count: u32,
    pub nesting_depth: u32,
    /// Distinct symbols this one calls
    pub fan_out: usize,
    /// Distinct symbols calling this one
    pub fan_in: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexityScore {
    pub symbol: SymbolSummary,
    pub score: f64,
    pub metrics: ComplexityMetrics,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleComplexity {
    pub module: String,
    pub symbols: usize,
    pub total: f64,
    pub mean: f64,
    pub max: f64,
    pub flagged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexityReport {
    pub module_filter: Option<String>,
    pub threshold: f64,
    /// Descending score, ties by symbol id
    pub scores: Vec<ComplexityScore>,
    /// Sorted by module name
    pub modules: Vec<ModuleComplexity>,
    pub flagged_count: usize,
}

/// Weighted composite of parser metrics and call fan-out.
///
/// Pure function of the graph state: the same graph always produces the same
/// scores and the same order.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    config: ComplexityConfig,
}

impl ComplexityAnalyzer {
    pub fn new(config: ComplexityConfig) -> Self {
        Self { config }
    }

    pub fn default_threshold(&self) -> f64 {
        self.config.default_threshold
    }

    pub fn metrics(&self, store: &GraphStore, symbol: &Symbol) -> ComplexityMetrics {
        ComplexityMetrics {
            branch_count: symbol.metrics.branch_count,
            nesting_depth: symbol.metrics.nesting_depth,
            fan_out: store.degree(&symbol.id, &[RelationKind::Calls], Direction::Outgoing),
            fan_in: store.degree(&symbol.id, &[RelationKind::Calls], Direction::Incoming),
        }
    }

    pub fn score(&self, metrics: &ComplexityMetrics) -> f64 {
        self.config.branch_weight * f64::from(metrics.branch_count)
            + self.config.nesting_weight * f64::from(metrics.nesting_depth)
            + self.config.fan_out_weight * metrics.fan_out as f64
    }

    pub fn analyze(
        &self,
        store: &GraphStore,
        module_filter: Option<&str>,
        threshold: f64,
    ) -> Result<ComplexityReport> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CodeModelError::invalid_argument(
                "threshold",
                threshold,
                "must be a non-negative number",
            ));
        }
        let module_filter = module_filter.filter(|m| !m.is_empty());

        let mut scores: Vec<ComplexityScore> = store
            .symbols()
            .iter()
            .filter(|symbol| SCORED_KINDS.contains(&symbol.kind))
            .filter(|symbol| module_filter.map_or(true, |m| symbol.in_module(m)))
            .map(|symbol| {
                let metrics = self.metrics(store, symbol);
                let score = self.score(&metrics);
                ComplexityScore {
                    symbol: symbol.summary(),
                    score,
                    metrics,
                    flagged: score >= threshold,
                }
            })
            .collect();

        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.symbol.id.cmp(&b.symbol.id))
        });

        let modules = aggregate_modules(&scores);
        let flagged_count = scores.iter().filter(|s| s.flagged).count();

        debug!(
            module = module_filter.unwrap_or("*"),
            threshold,
            scored = scores.len(),
            flagged = flagged_count,
            "Complexity analysis complete"
        );

        Ok(ComplexityReport {
            module_filter: module_filter.map(str::to_string),
            threshold,
            scores,
            modules,
            flagged_count,
        })
    }
}

fn aggregate_modules(scores: &[ComplexityScore]) -> Vec<ModuleComplexity> {
    let mut by_module: BTreeMap<&str, ModuleComplexity> = BTreeMap::new();
    for score in scores {
        let entry = by_module
            .entry(score.symbol.module.as_str())
            .or_insert_with(|| ModuleComplexity {
                module: score.symbol.module.clone(),
                symbols: 0,
                total: 0.0,
                mean: 0.0,
                max: 0.0,
                flagged: 0,
            });
        entry.symbols += 1;
        entry.total += score.score;
        entry.max = entry.max.max(score.score);
        if score.flagged {
            entry.flagged += 1;
        }
    }
    by_module
        .into_values()
        .map(|mut module| {
            module.mean = module.total / module.symbols as f64;
            module
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use codemodel_core::{Location, Relationship};

    fn store() -> GraphStore {
        let store = GraphStore::new();
        let symbols = [
            ("billing.total", "billing", 4, 2),
            ("billing.tax", "billing", 1, 0),
            ("billing.cart.add", "billing.cart", 6, 3),
            ("shipping.quote", "shipping", 4, 2),
        ];
        for (id, module, branches, nesting) in symbols {
            store
                .upsert_symbol(
                    Symbol::new(id, id, SymbolKind::Function, Location::new("x.py", 1, 9))
                        .with_module(module)
                        .with_metrics(branches, nesting),
                )
                .unwrap();
        }
        store
            .upsert_symbol(Symbol::new(
                "billing.RATE",
                "RATE",
                SymbolKind::Variable,
                Location::new("x.py", 1, 1),
            ).with_module("billing"))
            .unwrap();
        for target in ["billing.tax", "shipping.quote"] {
            store
                .upsert_relationship(Relationship::new("billing.total", target, RelationKind::Calls))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_composite_score() {
        let analyzer = ComplexityAnalyzer::new(ComplexityConfig::default());
        let report = analyzer.analyze(&store(), None, 10.0).unwrap();

        let total = report
            .scores
            .iter()
            .find(|s| s.symbol.id.as_str() == "billing.total")
            .unwrap();
        // 1.0*4 + 2.0*2 + 0.5*2
        assert_relative_eq!(total.score, 9.0);
        assert_eq!(total.metrics.fan_out, 2);
        assert!(!total.flagged);

        let tax = report
            .scores
            .iter()
            .find(|s| s.symbol.id.as_str() == "billing.tax")
            .unwrap();
        assert_eq!(tax.metrics.fan_in, 1);
    }

    #[test]
    fn test_ranking_and_ties() {
        let analyzer = ComplexityAnalyzer::new(ComplexityConfig {
            fan_out_weight: 0.0,
            ..ComplexityConfig::default()
        });
        let report = analyzer.analyze(&store(), None, 8.0).unwrap();
        let order: Vec<&str> = report.scores.iter().map(|s| s.symbol.id.as_str()).collect();
        // billing.total and shipping.quote tie at 8.0
        assert_eq!(
            order,
            vec!["billing.cart.add", "billing.total", "shipping.quote", "billing.tax"]
        );
        assert_eq!(report.flagged_count, 3);
    }

    #[test]
    fn test_module_filter_and_aggregates() {
        let analyzer = ComplexityAnalyzer::new(ComplexityConfig::default());
        let report = analyzer.analyze(&store(), Some("billing"), 10.0).unwrap();

        assert_eq!(report.scores.len(), 3);
        let modules: Vec<&str> = report.modules.iter().map(|m| m.module.as_str()).collect();
        assert_eq!(modules, vec!["billing", "billing.cart"]);
        let billing = &report.modules[0];
        assert_eq!(billing.symbols, 2);
        assert_relative_eq!(billing.max, 9.0);
        assert_relative_eq!(billing.mean, (9.0 + 1.0) / 2.0);
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let analyzer = ComplexityAnalyzer::new(ComplexityConfig::default());
        assert!(matches!(
            analyzer.analyze(&store(), None, -1.0),
            Err(CodeModelError::InvalidArgument { name: "threshold", .. })
        ));
        assert!(analyzer.analyze(&store(), None, f64::NAN).is_err());
    }

    #[test]
    fn test_identical_state_identical_report() {
        let analyzer = ComplexityAnalyzer::new(ComplexityConfig::default());
        let store = store();
        assert_eq!(
            analyzer.analyze(&store, None, 5.0).unwrap(),
            analyzer.analyze(&store, None, 5.0).unwrap()
        );
    }
}
