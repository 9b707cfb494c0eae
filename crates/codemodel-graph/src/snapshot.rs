use crate::GraphStore;
use codemodel_core::{CodeModelError, Relationship, Result, Symbol, SymbolId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub const GRAPH_SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the whole store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphSnapshot {
    format_version: u32,
    captured_at_ms: i64,
    revision: u64,
    symbols: Vec<Symbol>,
    relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStats {
    pub symbols: usize,
    pub relationships: usize,
    pub captured_at_ms: i64,
}

impl GraphStore {
    /// Serialize the full graph to bytes for an external storage layer.
    ///
    /// Mutations are held off while the contents are copied so the symbols and
    /// relationships come from the same moment.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let guards = self.lock_all();
        let snapshot = GraphSnapshot {
            format_version: GRAPH_SNAPSHOT_VERSION,
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
            revision: self.revision(),
            symbols: self.symbols().iter().map(|s| s.as_ref().clone()).collect(),
            relationships: self
                .relationships()
                .iter()
                .map(|r| r.as_ref().clone())
                .collect(),
        };
        drop(guards);

        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e: bincode::error::EncodeError| CodeModelError::Serialization(e.to_string()))?;
        info!(
            symbols = snapshot.symbols.len(),
            relationships = snapshot.relationships.len(),
            bytes = bytes.len(),
            "Graph snapshot captured"
        );
        Ok(bytes)
    }

    /// Replace the store contents with a snapshot.
    ///
    /// The snapshot is decoded and checked in full before anything is touched;
    /// a rejected snapshot leaves the store as it was.
    pub fn restore(&self, bytes: &[u8]) -> Result<RestoreStats> {
        let snapshot = decode(bytes)?;
        validate(&snapshot)?;

        let _guards = self.lock_all();

        self.symbols.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.by_name.clear();
        self.children.clear();

        for symbol in &snapshot.symbols {
            self.by_name
                .entry(symbol.name.to_lowercase())
                .or_default()
                .insert(symbol.id.clone());
            if let Some(parent) = &symbol.parent {
                self.children
                    .entry(parent.clone())
                    .or_default()
                    .insert(symbol.id.clone());
            }
        }
        let symbol_count = snapshot.symbols.len();
        for symbol in snapshot.symbols {
            self.symbols.insert(symbol.id.clone(), Arc::new(symbol));
        }

        let relationship_count = snapshot.relationships.len();
        for relationship in snapshot.relationships {
            let relationship = Arc::new(relationship);
            self.outgoing
                .entry(relationship.source.clone())
                .or_default()
                .insert(
                    (relationship.kind, relationship.target.clone()),
                    Arc::clone(&relationship),
                );
            self.incoming
                .entry(relationship.target.clone())
                .or_default()
                .insert(
                    (relationship.kind, relationship.source.clone()),
                    Arc::clone(&relationship),
                );
        }

        // Stay monotonic across restores so observers always see a change
        let next = self.revision().max(snapshot.revision) + 1;
        self.revision.store(next, Ordering::Release);

        info!(
            symbols = symbol_count,
            relationships = relationship_count,
            captured_at_ms = snapshot.captured_at_ms,
            "Graph snapshot restored"
        );
        Ok(RestoreStats {
            symbols: symbol_count,
            relationships: relationship_count,
            captured_at_ms: snapshot.captured_at_ms,
        })
    }

    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let store = Self::new();
        store.restore(bytes)?;
        Ok(store)
    }
}

fn decode(bytes: &[u8]) -> Result<GraphSnapshot> {
    let (snapshot, _): (GraphSnapshot, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e: bincode::error::DecodeError| CodeModelError::Serialization(e.to_string()))?;
    if snapshot.format_version != GRAPH_SNAPSHOT_VERSION {
        return Err(CodeModelError::Serialization(format!(
            "unsupported graph snapshot version {} (expected {})",
            snapshot.format_version, GRAPH_SNAPSHOT_VERSION
        )));
    }
    Ok(snapshot)
}

fn validate(snapshot: &GraphSnapshot) -> Result<()> {
    let mut ids: HashSet<&SymbolId> = HashSet::with_capacity(snapshot.symbols.len());
    for symbol in &snapshot.symbols {
        if symbol.id.is_empty() {
            return Err(CodeModelError::Serialization(
                "graph snapshot contains a symbol with an empty id".to_string(),
            ));
        }
        if !ids.insert(&symbol.id) {
            return Err(CodeModelError::Serialization(format!(
                "graph snapshot contains symbol {} twice",
                symbol.id
            )));
        }
    }

    let mut edges = HashSet::with_capacity(snapshot.relationships.len());
    for relationship in &snapshot.relationships {
        relationship.validate()?;
        for endpoint in [&relationship.source, &relationship.target] {
            if !ids.contains(endpoint) {
                return Err(CodeModelError::InvalidEdge {
                    from: relationship.source.clone(),
                    to: relationship.target.clone(),
                    kind: relationship.kind,
                    missing: endpoint.clone(),
                });
            }
        }
        if !edges.insert(relationship.key()) {
            return Err(CodeModelError::Serialization(format!(
                "graph snapshot contains edge {} -[{}]-> {} twice",
                relationship.source, relationship.kind, relationship.target
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemodel_core::{Direction, Location, Modifier, RelationKind, SymbolKind};

    fn populated() -> GraphStore {
        let store = GraphStore::new();
        store
            .upsert_symbol(
                Symbol::new("Cart", "Cart", SymbolKind::Class, Location::new("cart.py", 1, 80))
                    .with_module("shop.cart")
                    .with_documentation("Shopping cart"),
            )
            .unwrap();
        store
            .upsert_symbol(
                Symbol::new("Cart.total", "total", SymbolKind::Method, Location::new("cart.py", 10, 30))
                    .with_parent("Cart")
                    .with_modifier(Modifier::Public)
                    .with_metrics(4, 2),
            )
            .unwrap();
        store
            .upsert_relationship(
                Relationship::new("Cart.total", "Cart", RelationKind::References).with_strength(0.7),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_snapshot_restore_preserves_graph() {
        let store = populated();
        let bytes = store.snapshot().unwrap();

        let restored = GraphStore::from_snapshot(&bytes).unwrap();
        assert_eq!(restored.symbol_count(), 2);
        assert_eq!(restored.relationship_count(), 1);
        assert_eq!(
            restored.get_symbol(&"Cart.total".into()).unwrap().as_ref(),
            store.get_symbol(&"Cart.total".into()).unwrap().as_ref()
        );
        assert_eq!(restored.children(&"Cart".into()).len(), 1);
        assert_eq!(restored.find_symbols("TOTAL", None, true).len(), 1);
        let incoming = restored
            .neighbors(&"Cart".into(), None, Direction::Incoming)
            .unwrap();
        assert_eq!(incoming[0].relationship.strength, 0.7);
    }

    #[test]
    fn test_restore_replaces_existing_contents() {
        let target = GraphStore::new();
        target
            .upsert_symbol(Symbol::new("stale", "stale", SymbolKind::Function, Location::new("x.py", 1, 1)))
            .unwrap();
        let before = target.revision();

        target.restore(&populated().snapshot().unwrap()).unwrap();
        assert!(!target.contains(&"stale".into()));
        assert_eq!(target.symbol_count(), 2);
        assert!(target.revision() > before);
    }

    #[test]
    fn test_corrupt_snapshot_leaves_store_untouched() {
        let store = populated();
        let err = store.restore(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, CodeModelError::Serialization(_)));
        assert_eq!(store.symbol_count(), 2);
    }

    #[test]
    fn test_dangling_edge_in_snapshot_is_rejected() {
        let snapshot = GraphSnapshot {
            format_version: GRAPH_SNAPSHOT_VERSION,
            captured_at_ms: 0,
            revision: 0,
            symbols: vec![Symbol::new("a", "a", SymbolKind::Function, Location::new("a.py", 1, 1))],
            relationships: vec![Relationship::new("a", "gone", RelationKind::Calls)],
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();

        let store = populated();
        let err = store.restore(&bytes).unwrap_err();
        assert!(matches!(err, CodeModelError::InvalidEdge { .. }));
        assert_eq!(store.symbol_count(), 2);
    }
}
