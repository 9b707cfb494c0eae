use codemodel_core::{Direction, RelationKind, SymbolId, SymbolSummary};
use codemodel_graph::{find_cycles, GraphStore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Entries kept in the ranked sections of [`ArchitectureSummary`].
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectOverview {
    pub total_symbols: usize,
    pub total_relationships: usize,
    pub symbols_by_kind: BTreeMap<String, usize>,
    pub relationships_by_kind: BTreeMap<String, usize>,
    pub modules: usize,
    pub files: usize,
    pub embedded_symbols: usize,
    pub pending_embeddings: usize,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleSummary {
    pub module: String,
    pub symbols: usize,
    pub by_kind: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleDependency {
    pub from_module: String,
    pub to_module: String,
    pub relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HubSymbol {
    pub symbol: SymbolSummary,
    pub fan_in: usize,
    pub fan_out: usize,
    pub degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArchitectureSummary {
    pub total_symbols: usize,
    pub total_relationships: usize,
    /// Sorted by module name
    pub modules: Vec<ModuleSummary>,
    /// `edges / (n * (n - 1))`, 0 below two symbols
    pub density: f64,
    pub relationships_by_kind: BTreeMap<String, usize>,
    /// Cross-module dependency edges, most first
    pub module_dependencies: Vec<ModuleDependency>,
    /// Best-connected symbols, most first
    pub hubs: Vec<HubSymbol>,
    /// Cycles over `calls`/`imports`
    pub dependency_cycles: usize,
}

/// Graph-wide counts. `is_embedded` reports whether a symbol currently has a vector.
pub fn project_overview<F>(store: &GraphStore, is_embedded: F) -> ProjectOverview
where
    F: Fn(&SymbolId) -> bool,
{
    let symbols = store.symbols();
    let mut symbols_by_kind: BTreeMap<String, usize> = BTreeMap::new();
    let mut modules: BTreeSet<&str> = BTreeSet::new();
    let mut files: BTreeSet<&str> = BTreeSet::new();
    let mut embedded = 0;

    for symbol in &symbols {
        *symbols_by_kind.entry(symbol.kind.to_string()).or_default() += 1;
        if !symbol.module.is_empty() {
            modules.insert(symbol.module.as_str());
        }
        files.insert(symbol.location.file_path.as_str());
        if is_embedded(&symbol.id) {
            embedded += 1;
        }
    }

    ProjectOverview {
        total_symbols: symbols.len(),
        total_relationships: store.relationship_count(),
        symbols_by_kind,
        relationships_by_kind: relationships_by_kind(store),
        modules: modules.len(),
        files: files.len(),
        embedded_symbols: embedded,
        pending_embeddings: symbols.len() - embedded,
        revision: store.revision(),
    }
}

pub fn explain_architecture(store: &GraphStore) -> ArchitectureSummary {
    let symbols = store.symbols();
    let relationships = store.relationships();

    let mut modules: BTreeMap<&str, ModuleSummary> = BTreeMap::new();
    let mut module_of: HashMap<&SymbolId, &str> = HashMap::with_capacity(symbols.len());
    for symbol in &symbols {
        module_of.insert(&symbol.id, symbol.module.as_str());
        let summary = modules
            .entry(symbol.module.as_str())
            .or_insert_with(|| ModuleSummary {
                module: symbol.module.clone(),
                symbols: 0,
                by_kind: BTreeMap::new(),
            });
        summary.symbols += 1;
        *summary.by_kind.entry(symbol.kind.to_string()).or_default() += 1;
    }

    let mut cross_module: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for relationship in &relationships {
        if !RelationKind::DEPENDENCY.contains(&relationship.kind) {
            continue;
        }
        let (Some(from), Some(to)) = (
            module_of.get(&relationship.source),
            module_of.get(&relationship.target),
        ) else {
            continue;
        };
        if from != to {
            *cross_module.entry((*from, *to)).or_default() += 1;
        }
    }
    let mut module_dependencies: Vec<ModuleDependency> = cross_module
        .into_iter()
        .map(|((from, to), count)| ModuleDependency {
            from_module: from.to_string(),
            to_module: to.to_string(),
            relationships: count,
        })
        .collect();
    // Stable sort keeps module-name order among equal counts
    module_dependencies.sort_by(|a, b| b.relationships.cmp(&a.relationships));
    module_dependencies.truncate(TOP_N);

    let mut hubs: Vec<HubSymbol> = symbols
        .iter()
        .filter_map(|symbol| {
            let fan_in = store.degree(&symbol.id, &RelationKind::ALL, Direction::Incoming);
            let fan_out = store.degree(&symbol.id, &RelationKind::ALL, Direction::Outgoing);
            let degree = fan_in + fan_out;
            (degree > 0).then(|| HubSymbol {
                symbol: symbol.summary(),
                fan_in,
                fan_out,
                degree,
            })
        })
        .collect();
    hubs.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.symbol.id.cmp(&b.symbol.id)));
    hubs.truncate(TOP_N);

    let n = symbols.len();
    let density = if n < 2 {
        0.0
    } else {
        relationships.len() as f64 / (n as f64 * (n as f64 - 1.0))
    };

    let dependency_cycles = find_cycles(store, &[RelationKind::Calls, RelationKind::Imports]).len();

    debug!(
        symbols = n,
        relationships = relationships.len(),
        modules = modules.len(),
        dependency_cycles,
        "Architecture summary built"
    );

    ArchitectureSummary {
        total_symbols: n,
        total_relationships: relationships.len(),
        modules: modules.into_values().collect(),
        density,
        relationships_by_kind: relationships_by_kind(store),
        module_dependencies,
        hubs,
        dependency_cycles,
    }
}

fn relationships_by_kind(store: &GraphStore) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for relationship in store.relationships() {
        *counts.entry(relationship.kind.to_string()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemodel_core::{Location, Relationship, Symbol, SymbolKind};

    fn fixture() -> GraphStore {
        let store = GraphStore::new();
        for (id, kind, module, file) in [
            ("api.handler", SymbolKind::Function, "api", "api.py"),
            ("api.Router", SymbolKind::Class, "api", "api.py"),
            ("db.query", SymbolKind::Function, "db", "db.py"),
            ("db.connect", SymbolKind::Function, "db", "db.py"),
        ] {
            store
                .upsert_symbol(Symbol::new(id, id, kind, Location::new(file, 1, 2)).with_module(module))
                .unwrap();
        }
        for (from, to, kind) in [
            ("api.handler", "db.query", RelationKind::Calls),
            ("api.handler", "db.connect", RelationKind::Calls),
            ("api.Router", "api.handler", RelationKind::References),
            ("db.query", "db.connect", RelationKind::Calls),
            ("db.connect", "db.query", RelationKind::Calls),
        ] {
            store.upsert_relationship(Relationship::new(from, to, kind)).unwrap();
        }
        store
    }

    #[test]
    fn test_overview_counts() {
        let store = fixture();
        let overview = project_overview(&store, |id| id.as_str().starts_with("db."));
        assert_eq!(overview.total_symbols, 4);
        assert_eq!(overview.total_relationships, 5);
        assert_eq!(overview.symbols_by_kind["function"], 3);
        assert_eq!(overview.relationships_by_kind["calls"], 4);
        assert_eq!(overview.modules, 2);
        assert_eq!(overview.files, 2);
        assert_eq!(overview.embedded_symbols, 2);
        assert_eq!(overview.pending_embeddings, 2);
    }

    #[test]
    fn test_architecture_summary() {
        let summary = explain_architecture(&fixture());

        assert_eq!(summary.modules.len(), 2);
        assert_eq!(summary.modules[0].module, "api");
        assert_eq!(summary.modules[0].by_kind["class"], 1);
        assert!((summary.density - 5.0 / 12.0).abs() < 1e-9);

        assert_eq!(
            summary.module_dependencies,
            vec![ModuleDependency {
                from_module: "api".to_string(),
                to_module: "db".to_string(),
                relationships: 2,
            }]
        );
        assert_eq!(summary.dependency_cycles, 1);

        // api.handler: in 1, out 2; db.connect and db.query: in 2, out 1
        let hubs: Vec<&str> = summary.hubs.iter().map(|h| h.symbol.id.as_str()).collect();
        assert_eq!(hubs, vec!["api.handler", "db.connect", "db.query", "api.Router"]);
    }

    #[test]
    fn test_empty_graph() {
        let summary = explain_architecture(&GraphStore::new());
        assert_eq!(summary.density, 0.0);
        assert!(summary.hubs.is_empty());
        assert!(summary.modules.is_empty());
    }
}
