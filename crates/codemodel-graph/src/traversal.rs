use crate::{find_cyclic_components, GraphStore};
use codemodel_core::{
    CodeModelError, Direction, RelationKind, Result, SymbolId, SymbolSummary,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Parameters of a dependency traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyQuery {
    pub depth: usize,
    pub direction: Direction,
    pub kinds: Vec<RelationKind>,
}

impl Default for DependencyQuery {
    fn default() -> Self {
        Self {
            depth: 2,
            direction: Direction::Outgoing,
            kinds: RelationKind::DEPENDENCY.to_vec(),
        }
    }
}

impl DependencyQuery {
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReachedSymbol {
    pub symbol: SymbolSummary,
    pub depth: usize,
    /// Relationship kind of the edge that first reached this symbol
    pub via: Option<RelationKind>,
    /// Symbol this one was first reached from (lowest id in the previous layer)
    pub reached_from: Option<SymbolId>,
    /// Member of a dependency cycle inside the explored region
    pub cyclic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyLayer {
    pub depth: usize,
    pub symbols: Vec<ReachedSymbol>,
}

/// Layered breadth-first result. Layer 0 holds the root alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyAnalysis {
    pub root: SymbolId,
    pub depth: usize,
    pub direction: Direction,
    pub kinds: Vec<RelationKind>,
    pub layers: Vec<DependencyLayer>,
    /// Cycles fully contained in the explored region, each sorted by id
    pub cycles: Vec<Vec<SymbolId>>,
}

impl DependencyAnalysis {
    pub fn reached(&self) -> impl Iterator<Item = &ReachedSymbol> {
        self.layers.iter().flat_map(|layer| layer.symbols.iter())
    }

    /// Every reached id except the root.
    pub fn dependency_ids(&self) -> Vec<SymbolId> {
        self.reached()
            .filter(|reached| reached.depth > 0)
            .map(|reached| reached.symbol.id.clone())
            .collect()
    }

    pub fn total_reached(&self) -> usize {
        self.layers.iter().map(|layer| layer.symbols.len()).sum()
    }
}

/// Breadth-first dependency traversal bounded by `query.depth`.
///
/// Frontiers are expanded in id order so the first discoverer of a symbol, and
/// every layer, are stable across runs. Already-visited symbols are never
/// re-expanded, which keeps cyclic graphs finite.
pub fn analyze_dependencies(
    store: &GraphStore,
    root: &SymbolId,
    query: &DependencyQuery,
) -> Result<DependencyAnalysis> {
    if query.kinds.is_empty() {
        return Err(CodeModelError::invalid_argument(
            "kinds",
            "[]",
            "at least one relationship kind is required",
        ));
    }
    let root_symbol = store.get_symbol(root)?;

    let mut visited: HashSet<SymbolId> = HashSet::from([root.clone()]);
    let mut layers: Vec<Vec<(SymbolId, Option<RelationKind>, Option<SymbolId>)>> =
        vec![vec![(root.clone(), None, None)]];

    for depth in 1..=query.depth {
        let Some(frontier) = layers.last() else { break };
        // BTreeMap keeps the next layer ordered by id
        let mut next: BTreeMap<SymbolId, (RelationKind, SymbolId)> = BTreeMap::new();
        for (current, _, _) in frontier {
            for (neighbor, kind) in store.adjacent_ids(current, &query.kinds, query.direction) {
                if visited.contains(&neighbor) || next.contains_key(&neighbor) {
                    continue;
                }
                next.insert(neighbor, (kind, current.clone()));
            }
        }
        if next.is_empty() {
            debug!(root = %root, depth, "Dependency frontier exhausted");
            break;
        }
        visited.extend(next.keys().cloned());
        layers.push(
            next.into_iter()
                .map(|(id, (kind, from))| (id, Some(kind), Some(from)))
                .collect(),
        );
    }

    // Cycles are computed on forward edges; reversing every edge keeps the same components.
    let mut explored: Vec<SymbolId> = visited.iter().cloned().collect();
    explored.sort();
    let cycles = find_cyclic_components(&explored, |id| {
        store
            .adjacent_ids(id, &query.kinds, Direction::Outgoing)
            .into_iter()
            .map(|(target, _)| target)
            .collect()
    });
    let cyclic: HashSet<&SymbolId> = cycles.iter().flatten().collect();

    let mut result_layers = Vec::with_capacity(layers.len());
    for (depth, layer) in layers.iter().enumerate() {
        let mut symbols = Vec::with_capacity(layer.len());
        for (id, via, from) in layer {
            let summary = if id == root {
                root_symbol.summary()
            } else {
                match store.get_symbol(id) {
                    Ok(symbol) => symbol.summary(),
                    // Removed by a concurrent writer after being reached
                    Err(_) => continue,
                }
            };
            symbols.push(ReachedSymbol {
                symbol: summary,
                depth,
                via: *via,
                reached_from: from.clone(),
                cyclic: cyclic.contains(id),
            });
        }
        result_layers.push(DependencyLayer { depth, symbols });
    }

    let analysis = DependencyAnalysis {
        root: root.clone(),
        depth: query.depth,
        direction: query.direction,
        kinds: query.kinds.clone(),
        layers: result_layers,
        cycles,
    };
    debug!(
        root = %root,
        depth = query.depth,
        reached = analysis.total_reached(),
        cycles = analysis.cycles.len(),
        "Dependency analysis complete"
    );
    Ok(analysis)
}

/// Every dependency cycle in the whole graph over `kinds`.
pub fn find_cycles(store: &GraphStore, kinds: &[RelationKind]) -> Vec<Vec<SymbolId>> {
    let nodes: Vec<SymbolId> = store.symbols().iter().map(|s| s.id.clone()).collect();
    find_cyclic_components(&nodes, |id| {
        store
            .adjacent_ids(id, kinds, Direction::Outgoing)
            .into_iter()
            .map(|(target, _)| target)
            .collect()
    })
}
