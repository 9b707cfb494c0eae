use crate::GraphStore;
use codemodel_core::{
    CodeModelError, Direction, Location, RelationKind, Result, SymbolId, SymbolSummary,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlowOperation {
    /// `symbol` reads the value held by `from`
    Read,
    /// `symbol` is written by `from`
    Write,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowHop {
    pub step: usize,
    pub symbol: SymbolSummary,
    pub operation: FlowOperation,
    pub from: SymbolId,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataFlowTrace {
    pub variable: String,
    /// Symbols named `variable` the trace started from
    pub origins: Vec<SymbolSummary>,
    /// Symbols writing to the origins; context only, not part of the chain
    pub writers: Vec<SymbolSummary>,
    pub hops: Vec<FlowHop>,
    /// The chain was cut at the length cap
    pub truncated: bool,
}

/// Follow the value of every symbol named `variable` forward: readers of a
/// variable (`reads-from` edges into it), then the variables those readers write
/// (`writes-to` edges out of them), and so on.
///
/// Hops are emitted breadth-first with each level ordered by id. Each symbol is
/// visited once, and at most `max_length` hops are reported. An unknown variable
/// yields an empty trace.
pub fn trace_data_flow(store: &GraphStore, variable: &str, max_length: usize) -> Result<DataFlowTrace> {
    if variable.trim().is_empty() {
        return Err(CodeModelError::invalid_argument(
            "variable",
            variable,
            "variable name must not be empty",
        ));
    }
    if max_length == 0 {
        return Err(CodeModelError::invalid_argument(
            "max_length",
            max_length,
            "must be greater than 0",
        ));
    }

    let origins: Vec<_> = store
        .find_symbols(variable, None, true)
        .into_iter()
        .filter(|symbol| symbol.name == variable)
        .collect();

    let mut visited: HashSet<SymbolId> = origins.iter().map(|s| s.id.clone()).collect();
    let mut writers: BTreeMap<SymbolId, SymbolSummary> = BTreeMap::new();
    for origin in &origins {
        for (writer, _) in store.adjacent_ids(&origin.id, &[RelationKind::WritesTo], Direction::Incoming) {
            if let Ok(symbol) = store.get_symbol(&writer) {
                writers.insert(writer, symbol.summary());
            }
        }
    }

    let mut hops: Vec<FlowHop> = Vec::new();
    let mut truncated = false;
    let mut frontier: Vec<SymbolId> = origins.iter().map(|s| s.id.clone()).collect();

    'levels: while !frontier.is_empty() {
        // Readers of the current variables
        let mut readers: BTreeMap<SymbolId, SymbolId> = BTreeMap::new();
        for var in &frontier {
            for (reader, _) in store.adjacent_ids(var, &[RelationKind::ReadsFrom], Direction::Incoming) {
                if !visited.contains(&reader) {
                    readers.entry(reader).or_insert_with(|| var.clone());
                }
            }
        }

        // Variables those readers write to
        let mut written: BTreeMap<SymbolId, SymbolId> = BTreeMap::new();
        for (reader, from) in &readers {
            if !push_hop(store, &mut hops, reader, FlowOperation::Read, from, max_length) {
                truncated = true;
                break 'levels;
            }
            visited.insert(reader.clone());
        }
        for reader in readers.keys() {
            for (target, _) in store.adjacent_ids(reader, &[RelationKind::WritesTo], Direction::Outgoing) {
                if !visited.contains(&target) {
                    written.entry(target).or_insert_with(|| reader.clone());
                }
            }
        }

        frontier = Vec::with_capacity(written.len());
        for (target, from) in written {
            if !push_hop(store, &mut hops, &target, FlowOperation::Write, &from, max_length) {
                truncated = true;
                break 'levels;
            }
            visited.insert(target.clone());
            frontier.push(target);
        }
    }

    debug!(
        variable,
        origins = origins.len(),
        hops = hops.len(),
        truncated,
        "Data-flow trace complete"
    );

    Ok(DataFlowTrace {
        variable: variable.to_string(),
        origins: origins.iter().map(|s| s.summary()).collect(),
        writers: writers.into_values().collect(),
        hops,
        truncated,
    })
}

/// Append a hop unless the cap is reached. Returns `false` when the chain is full.
fn push_hop(
    store: &GraphStore,
    hops: &mut Vec<FlowHop>,
    id: &SymbolId,
    operation: FlowOperation,
    from: &SymbolId,
    max_length: usize,
) -> bool {
    let Ok(symbol) = store.get_symbol(id) else {
        // Removed concurrently; nothing to report for it
        return true;
    };
    if hops.len() >= max_length {
        return false;
    }
    hops.push(FlowHop {
        step: hops.len(),
        symbol: symbol.summary(),
        operation,
        from: from.clone(),
        location: symbol.location.clone(),
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemodel_core::{Relationship, Symbol, SymbolKind};

    fn add(store: &GraphStore, id: &str, name: &str, kind: SymbolKind) {
        store
            .upsert_symbol(Symbol::new(id, name, kind, Location::new("flow.py", 1, 2)))
            .unwrap();
    }

    fn edge(store: &GraphStore, a: &str, b: &str, kind: RelationKind) {
        store.upsert_relationship(Relationship::new(a, b, kind)).unwrap();
    }

    #[test]
    fn test_variable_without_readers_yields_empty_chain() {
        let store = GraphStore::new();
        add(&store, "v.total", "total", SymbolKind::Variable);
        add(&store, "f.compute", "compute", SymbolKind::Function);
        edge(&store, "f.compute", "v.total", RelationKind::WritesTo);

        let trace = trace_data_flow(&store, "total", 256).unwrap();
        assert!(trace.hops.is_empty());
        assert!(!trace.truncated);
        assert_eq!(trace.origins.len(), 1);
        assert_eq!(trace.writers[0].id.as_str(), "f.compute");
    }

    #[test]
    fn test_unknown_variable_is_empty_not_error() {
        let store = GraphStore::new();
        let trace = trace_data_flow(&store, "missing", 10).unwrap();
        assert!(trace.origins.is_empty());
        assert!(trace.hops.is_empty());
    }

    #[test]
    fn test_flow_chain_order() {
        let store = GraphStore::new();
        add(&store, "v.price", "price", SymbolKind::Variable);
        add(&store, "v.subtotal", "subtotal", SymbolKind::Variable);
        add(&store, "f.sum", "sum", SymbolKind::Function);
        add(&store, "f.render", "render", SymbolKind::Function);
        edge(&store, "f.sum", "v.price", RelationKind::ReadsFrom);
        edge(&store, "f.sum", "v.subtotal", RelationKind::WritesTo);
        edge(&store, "f.render", "v.subtotal", RelationKind::ReadsFrom);

        let trace = trace_data_flow(&store, "price", 256).unwrap();
        let chain: Vec<(String, FlowOperation)> = trace
            .hops
            .iter()
            .map(|hop| (hop.symbol.id.to_string(), hop.operation))
            .collect();
        assert_eq!(
            chain,
            vec![
                ("f.sum".to_string(), FlowOperation::Read),
                ("v.subtotal".to_string(), FlowOperation::Write),
                ("f.render".to_string(), FlowOperation::Read),
            ]
        );
        assert_eq!(trace.hops[1].from.as_str(), "f.sum");
    }

    #[test]
    fn test_cyclic_flow_terminates_and_truncates() {
        let store = GraphStore::new();
        add(&store, "v.a", "a", SymbolKind::Variable);
        add(&store, "v.b", "b", SymbolKind::Variable);
        add(&store, "f.ab", "ab", SymbolKind::Function);
        add(&store, "f.ba", "ba", SymbolKind::Function);
        edge(&store, "f.ab", "v.a", RelationKind::ReadsFrom);
        edge(&store, "f.ab", "v.b", RelationKind::WritesTo);
        edge(&store, "f.ba", "v.b", RelationKind::ReadsFrom);
        edge(&store, "f.ba", "v.a", RelationKind::WritesTo);

        let full = trace_data_flow(&store, "a", 256).unwrap();
        assert_eq!(full.hops.len(), 3);
        assert!(!full.truncated);

        let capped = trace_data_flow(&store, "a", 2).unwrap();
        assert_eq!(capped.hops.len(), 2);
        assert!(capped.truncated);
    }
}
