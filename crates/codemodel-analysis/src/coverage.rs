use codemodel_core::{Direction, RelationKind, SymbolId, SymbolKind, SymbolSummary};
use codemodel_graph::GraphStore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Kinds whose coverage is reported.
pub const COVERED_KINDS: [SymbolKind; 3] = [SymbolKind::Function, SymbolKind::Method, SymbolKind::Class];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageLink {
    pub test: SymbolId,
    /// 1 for a symbol the test targets directly
    pub hops: usize,
    /// `1 / hops`
    pub confidence: f64,
    pub direct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SymbolCoverage {
    pub symbol: SymbolSummary,
    pub covered: bool,
    pub direct: bool,
    pub links: Vec<CoverageLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleCoverage {
    pub module: String,
    pub total: usize,
    pub covered: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageReport {
    pub module_filter: Option<String>,
    pub total: usize,
    pub covered: usize,
    pub uncovered: usize,
    /// `covered / total`, 0 when nothing is in scope
    pub ratio: f64,
    pub tests: Vec<SymbolSummary>,
    /// Sorted by id
    pub symbols: Vec<SymbolCoverage>,
    /// Sorted by module name
    pub modules: Vec<ModuleCoverage>,
}

/// Associates tests with the symbols they exercise: the targets of their
/// `tests` (or `calls`) edges, then whatever those call, up to `depth` hops.
#[derive(Debug, Clone, Copy)]
pub struct CoverageMapper {
    depth: usize,
}

impl CoverageMapper {
    pub fn new(depth: usize) -> Self {
        Self { depth: depth.max(1) }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Test symbols: kind `test`, or the source of any `tests` edge.
    pub fn test_symbols(&self, store: &GraphStore) -> Vec<SymbolSummary> {
        let mut tests: BTreeMap<SymbolId, SymbolSummary> = BTreeMap::new();
        for symbol in store.symbols() {
            if symbol.kind == SymbolKind::Test {
                tests.insert(symbol.id.clone(), symbol.summary());
            }
        }
        for relationship in store.relationships() {
            if relationship.kind != RelationKind::Tests || tests.contains_key(&relationship.source) {
                continue;
            }
            if let Ok(symbol) = store.get_symbol(&relationship.source) {
                tests.insert(symbol.id.clone(), symbol.summary());
            }
        }
        tests.into_values().collect()
    }

    /// Every symbol reached by any test, with one link per test at its
    /// shortest hop distance.
    pub fn links(&self, store: &GraphStore) -> HashMap<SymbolId, Vec<CoverageLink>> {
        let mut links: HashMap<SymbolId, Vec<CoverageLink>> = HashMap::new();

        for test in self.test_symbols(store) {
            let mut visited: HashSet<SymbolId> = HashSet::from([test.id.clone()]);
            let mut frontier = vec![test.id.clone()];

            for hop in 1..=self.depth {
                let kinds: &[RelationKind] = if hop == 1 {
                    &[RelationKind::Tests, RelationKind::Calls]
                } else {
                    &[RelationKind::Calls]
                };

                let mut reached: BTreeMap<SymbolId, bool> = BTreeMap::new();
                for id in &frontier {
                    for (target, kind) in store.adjacent_ids(id, kinds, Direction::Outgoing) {
                        if visited.contains(&target) {
                            continue;
                        }
                        *reached.entry(target).or_insert(false) |= kind == RelationKind::Tests;
                    }
                }
                if reached.is_empty() {
                    break;
                }

                frontier = Vec::with_capacity(reached.len());
                for (target, direct) in reached {
                    visited.insert(target.clone());
                    links.entry(target.clone()).or_default().push(CoverageLink {
                        test: test.id.clone(),
                        hops: hop,
                        confidence: 1.0 / hop as f64,
                        direct,
                    });
                    frontier.push(target);
                }
            }
        }

        for entries in links.values_mut() {
            sort_links(entries);
        }
        links
    }

    pub fn map(&self, store: &GraphStore, module_filter: Option<&str>) -> CoverageReport {
        let module_filter = module_filter.filter(|m| !m.is_empty());
        let tests = self.test_symbols(store);
        let test_ids: HashSet<&SymbolId> = tests.iter().map(|t| &t.id).collect();
        let links = self.links(store);

        let mut symbols = Vec::new();
        for symbol in store.symbols() {
            if !COVERED_KINDS.contains(&symbol.kind)
                || test_ids.contains(&symbol.id)
                || !module_filter.map_or(true, |m| symbol.in_module(m))
            {
                continue;
            }

            let mut own = links.get(&symbol.id).cloned().unwrap_or_default();
            if symbol.kind == SymbolKind::Class {
                // A class counts as exercised through its members
                for child in store.children(&symbol.id) {
                    if let Some(child_links) = links.get(&child.id) {
                        own.extend(child_links.iter().cloned());
                    }
                }
                own = shortest_per_test(own);
            }

            symbols.push(SymbolCoverage {
                symbol: symbol.summary(),
                covered: !own.is_empty(),
                direct: own.iter().any(|l| l.direct),
                links: own,
            });
        }

        let mut modules: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for coverage in &symbols {
            let entry = modules.entry(coverage.symbol.module.as_str()).or_default();
            entry.0 += 1;
            if coverage.covered {
                entry.1 += 1;
            }
        }
        let modules: Vec<ModuleCoverage> = modules
            .into_iter()
            .map(|(module, (total, covered))| ModuleCoverage {
                module: module.to_string(),
                total,
                covered,
                ratio: ratio(covered, total),
            })
            .collect();

        let total = symbols.len();
        let covered = symbols.iter().filter(|s| s.covered).count();
        debug!(
            module = module_filter.unwrap_or("*"),
            tests = tests.len(),
            total,
            covered,
            "Coverage mapping complete"
        );

        CoverageReport {
            module_filter: module_filter.map(str::to_string),
            total,
            covered,
            uncovered: total - covered,
            ratio: ratio(covered, total),
            tests,
            symbols,
            modules,
        }
    }
}

fn ratio(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

fn sort_links(links: &mut [CoverageLink]) {
    links.sort_by(|a, b| a.hops.cmp(&b.hops).then_with(|| a.test.cmp(&b.test)));
}

fn shortest_per_test(mut links: Vec<CoverageLink>) -> Vec<CoverageLink> {
    sort_links(&mut links);
    let mut seen = BTreeSet::new();
    links.retain(|link| seen.insert(link.test.clone()));
    links
}
