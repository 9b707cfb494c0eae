use codemodel_core::{
    CodeModelError, Direction, EdgeKey, ParserUpdate, RelationKind, Relationship, Result, Symbol,
    SymbolId, SymbolKind,
};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_LOCK_STRIPES: usize = 64;

/// Per-symbol adjacency keyed by `(kind, other endpoint)`.
pub(crate) type Adjacency = BTreeMap<(RelationKind, SymbolId), Arc<Relationship>>;

/// Shared in-memory symbol graph.
///
/// Reads go straight to the sharded maps and never wait on each other. Mutations
/// take the lock stripe of every symbol they touch (both endpoints for an edge,
/// lower stripe first), so re-indexing one file does not stall unrelated writers.
pub struct GraphStore {
    pub(crate) symbols: DashMap<SymbolId, Arc<Symbol>>,
    pub(crate) outgoing: DashMap<SymbolId, Adjacency>,
    pub(crate) incoming: DashMap<SymbolId, Adjacency>,
    /// Lower-cased name -> ids
    pub(crate) by_name: DashMap<String, BTreeSet<SymbolId>>,
    /// Parent id -> ids of symbols declaring it as `parent`
    pub(crate) children: DashMap<SymbolId, BTreeSet<SymbolId>>,
    pub(crate) stripes: Box<[Mutex<()>]>,
    pub(crate) revision: AtomicU64,
}

/// One adjacent symbol as returned by [`GraphStore::neighbors`].
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub relationship: Arc<Relationship>,
    pub symbol: Arc<Symbol>,
    /// `Outgoing` when the relationship starts at the queried symbol.
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub symbols_upserted: usize,
    pub symbols_removed: usize,
    pub relationships_upserted: usize,
    pub relationships_removed: usize,
    /// Updates that left the graph as it was (re-applied records, removals of absent ids)
    pub unchanged: usize,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_lock_stripes(DEFAULT_LOCK_STRIPES)
    }

    pub fn with_lock_stripes(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            symbols: DashMap::new(),
            outgoing: DashMap::new(),
            incoming: DashMap::new(),
            by_name: DashMap::new(),
            children: DashMap::new(),
            stripes,
            revision: AtomicU64::new(0),
        }
    }

    fn stripe_of(&self, id: &SymbolId) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    fn lock_symbol(&self, id: &SymbolId) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(id)].lock()
    }

    fn lock_edge(&self, a: &SymbolId, b: &SymbolId) -> (MutexGuard<'_, ()>, Option<MutexGuard<'_, ()>>) {
        let (i, j) = (self.stripe_of(a), self.stripe_of(b));
        if i == j {
            return (self.stripes[i].lock(), None);
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let first = self.stripes[lo].lock();
        let second = self.stripes[hi].lock();
        (first, Some(second))
    }

    pub(crate) fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.stripes.iter().map(|stripe| stripe.lock()).collect()
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Monotonic counter of effective mutations.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Insert or replace a symbol. Returns `false` when an identical record was
    /// already stored.
    pub fn upsert_symbol(&self, symbol: Symbol) -> Result<bool> {
        if symbol.id.is_empty() {
            return Err(CodeModelError::invalid_argument(
                "symbol.id",
                &symbol.id,
                "symbol identifier must not be empty",
            ));
        }

        let _guard = self.lock_symbol(&symbol.id);

        let previous = self.symbols.get(&symbol.id).map(|s| Arc::clone(s.value()));
        if let Some(previous) = &previous {
            if previous.as_ref() == &symbol {
                return Ok(false);
            }
            if previous.name != symbol.name {
                self.unindex_name(&previous.name, &previous.id);
            }
            if previous.parent != symbol.parent {
                if let Some(parent) = &previous.parent {
                    self.unindex_child(parent, &previous.id);
                }
            }
        }

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

        debug!(
            id = %symbol.id,
            kind = %symbol.kind,
            replaced = previous.is_some(),
            "Upserted symbol"
        );
        self.symbols.insert(symbol.id.clone(), Arc::new(symbol));
        self.bump_revision();
        Ok(true)
    }

    /// Remove a symbol together with every relationship incident to it.
    pub fn remove_symbol(&self, id: &SymbolId) -> Result<Arc<Symbol>> {
        let _guard = self.lock_symbol(id);

        let (_, symbol) = self
            .symbols
            .remove(id)
            .ok_or_else(|| CodeModelError::symbol_not_found(id))?;

        let mut detached = 0usize;
        if let Some((_, outgoing)) = self.outgoing.remove(id) {
            for (kind, target) in outgoing.keys() {
                detached += 1;
                if target != id {
                    self.detach(&self.incoming, target, *kind, id);
                }
            }
        }
        if let Some((_, incoming)) = self.incoming.remove(id) {
            for (kind, source) in incoming.keys() {
                if source != id {
                    detached += 1;
                    self.detach(&self.outgoing, source, *kind, id);
                }
            }
        }

        self.unindex_name(&symbol.name, id);
        if let Some(parent) = &symbol.parent {
            self.unindex_child(parent, id);
        }

        debug!(id = %id, relationships = detached, "Removed symbol");
        self.bump_revision();
        Ok(symbol)
    }

    /// Insert or update an edge. Both endpoints must already exist.
    pub fn upsert_relationship(&self, relationship: Relationship) -> Result<bool> {
        relationship.validate()?;

        let _guards = self.lock_edge(&relationship.source, &relationship.target);

        for endpoint in [&relationship.source, &relationship.target] {
            if !self.symbols.contains_key(endpoint) {
                return Err(CodeModelError::InvalidEdge {
                    from: relationship.source.clone(),
                    to: relationship.target.clone(),
                    kind: relationship.kind,
                    missing: endpoint.clone(),
                });
            }
        }

        let out_key = (relationship.kind, relationship.target.clone());
        let unchanged = self
            .outgoing
            .get(&relationship.source)
            .and_then(|adj| adj.get(&out_key).map(|existing| existing.as_ref() == &relationship))
            .unwrap_or(false);
        if unchanged {
            return Ok(false);
        }

        let in_key = (relationship.kind, relationship.source.clone());
        let source = relationship.source.clone();
        let target = relationship.target.clone();
        let relationship = Arc::new(relationship);

        self.outgoing
            .entry(source.clone())
            .or_default()
            .insert(out_key, Arc::clone(&relationship));
        self.incoming
            .entry(target.clone())
            .or_default()
            .insert(in_key, Arc::clone(&relationship));

        debug!(
            source = %source,
            target = %target,
            kind = %relationship.kind,
            "Upserted relationship"
        );
        self.bump_revision();
        Ok(true)
    }

    /// Remove one edge. Returns `false` when it did not exist.
    pub fn remove_relationship(
        &self,
        source: &SymbolId,
        target: &SymbolId,
        kind: RelationKind,
    ) -> bool {
        let _guards = self.lock_edge(source, target);

        let removed = self
            .outgoing
            .get_mut(source)
            .and_then(|mut adj| adj.remove(&(kind, target.clone())))
            .is_some();
        if !removed {
            return false;
        }
        self.outgoing.remove_if(source, |_, adj| adj.is_empty());
        self.detach(&self.incoming, target, kind, source);

        debug!(source = %source, target = %target, kind = %kind, "Removed relationship");
        self.bump_revision();
        true
    }

    /// Drop every symbol located in `file_path`, cascading their edges.
    pub fn remove_file(&self, file_path: &str) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self
            .symbols
            .iter()
            .filter(|entry| entry.value().location.file_path == file_path)
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();

        ids.retain(|id| self.remove_symbol(id).is_ok());
        debug!(file = file_path, removed = ids.len(), "Removed file symbols");
        ids
    }

    /// Apply one parser-feed record.
    pub fn apply(&self, update: ParserUpdate) -> Result<bool> {
        match update {
            ParserUpdate::UpsertSymbol { symbol } => self.upsert_symbol(symbol),
            ParserUpdate::RemoveSymbol { id } => match self.remove_symbol(&id) {
                Ok(_) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            },
            ParserUpdate::UpsertRelationship { relationship } => {
                self.upsert_relationship(relationship)
            }
            ParserUpdate::RemoveRelationship { key } => {
                Ok(self.remove_relationship(&key.source, &key.target, key.kind))
            }
        }
    }

    /// Apply a parser-feed batch: edge removals, symbol removals, symbol upserts,
    /// then edge upserts, so edges referring to symbols of the same batch validate.
    ///
    /// Stops at the first failing record; records applied before it stay applied.
    pub fn apply_batch<I>(&self, updates: I) -> Result<BatchStats>
    where
        I: IntoIterator<Item = ParserUpdate>,
    {
        let mut ordered: Vec<ParserUpdate> = updates.into_iter().collect();
        ordered.sort_by_key(batch_rank);

        let mut stats = BatchStats::default();
        for update in ordered {
            let rank = batch_rank(&update);
            if !self.apply(update)? {
                stats.unchanged += 1;
                continue;
            }
            match rank {
                0 => stats.relationships_removed += 1,
                1 => stats.symbols_removed += 1,
                2 => stats.symbols_upserted += 1,
                _ => stats.relationships_upserted += 1,
            }
        }

        debug!(?stats, "Applied parser batch");
        Ok(stats)
    }

    fn detach(&self, map: &DashMap<SymbolId, Adjacency>, owner: &SymbolId, kind: RelationKind, other: &SymbolId) {
        if let Some(mut adj) = map.get_mut(owner) {
            adj.remove(&(kind, other.clone()));
        }
        map.remove_if(owner, |_, adj| adj.is_empty());
    }

    fn unindex_name(&self, name: &str, id: &SymbolId) {
        let key = name.to_lowercase();
        if let Some(mut ids) = self.by_name.get_mut(&key) {
            ids.remove(id);
        }
        self.by_name.remove_if(&key, |_, ids| ids.is_empty());
    }

    fn unindex_child(&self, parent: &SymbolId, id: &SymbolId) {
        if let Some(mut ids) = self.children.get_mut(parent) {
            ids.remove(id);
        }
        self.children.remove_if(parent, |_, ids| ids.is_empty());
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn get_symbol(&self, id: &SymbolId) -> Result<Arc<Symbol>> {
        self.symbols
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CodeModelError::symbol_not_found(id))
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.symbols.contains_key(id)
    }

    /// Case-insensitive name lookup, either exact or substring, sorted by id.
    ///
    /// No match is an empty result, never an error.
    pub fn find_symbols(&self, pattern: &str, kind: Option<SymbolKind>, exact: bool) -> Vec<Arc<Symbol>> {
        let needle = pattern.to_lowercase();
        let mut found: Vec<Arc<Symbol>> = if exact {
            self.by_name
                .get(&needle)
                .map(|ids| ids.iter().filter_map(|id| self.symbol_entry(id)).collect())
                .unwrap_or_default()
        } else {
            self.symbols
                .iter()
                .filter(|entry| entry.value().name.to_lowercase().contains(&needle))
                .map(|entry| Arc::clone(entry.value()))
                .collect()
        };

        if let Some(kind) = kind {
            found.retain(|symbol| symbol.kind == kind);
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Symbols adjacent to `id` over the given kinds (all kinds when `None`).
    ///
    /// Ordered outgoing first, then by relationship kind and neighbor id.
    pub fn neighbors(
        &self,
        id: &SymbolId,
        kinds: Option<&[RelationKind]>,
        direction: Direction,
    ) -> Result<Vec<Neighbor>> {
        if !self.contains(id) {
            return Err(CodeModelError::symbol_not_found(id));
        }

        let mut result = Vec::new();
        let sides = [
            (Direction::Outgoing, &self.outgoing, direction.includes_outgoing()),
            (Direction::Incoming, &self.incoming, direction.includes_incoming()),
        ];
        for (side, map, wanted) in sides {
            if !wanted {
                continue;
            }
            let Some(adj) = map.get(id) else { continue };
            for ((kind, other), relationship) in adj.iter() {
                if !kind_selected(kinds, *kind) {
                    continue;
                }
                match self.symbol_entry(other) {
                    Some(symbol) => result.push(Neighbor {
                        relationship: Arc::clone(relationship),
                        symbol,
                        direction: side,
                    }),
                    None => warn!(
                        from = %id,
                        to = %other,
                        kind = %kind,
                        "Skipping dangling adjacency entry"
                    ),
                }
            }
        }
        Ok(result)
    }

    /// Adjacent ids without materializing symbols; unknown ids yield nothing.
    ///
    /// Sorted by `(neighbor id, kind)` and deduplicated across both directions.
    pub fn adjacent_ids(
        &self,
        id: &SymbolId,
        kinds: &[RelationKind],
        direction: Direction,
    ) -> Vec<(SymbolId, RelationKind)> {
        let mut result = Vec::new();
        if direction.includes_outgoing() {
            collect_adjacent(&self.outgoing, id, kinds, &mut result);
        }
        if direction.includes_incoming() {
            collect_adjacent(&self.incoming, id, kinds, &mut result);
        }
        result.sort();
        result.dedup();
        result
    }

    /// Number of distinct symbols reached over `kinds` in `direction`.
    pub fn degree(&self, id: &SymbolId, kinds: &[RelationKind], direction: Direction) -> usize {
        let mut ids: Vec<SymbolId> = self
            .adjacent_ids(id, kinds, direction)
            .into_iter()
            .map(|(other, _)| other)
            .collect();
        ids.dedup();
        ids.len()
    }

    /// Existing symbols whose `parent` is `id`, sorted by id.
    pub fn children(&self, id: &SymbolId) -> Vec<Arc<Symbol>> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|child| self.symbol_entry(child)).collect())
            .unwrap_or_default()
    }

    /// All symbols, sorted by id.
    pub fn symbols(&self) -> Vec<Arc<Symbol>> {
        let mut all: Vec<Arc<Symbol>> = self
            .symbols
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// All relationships, sorted by `(source, target, kind)`.
    pub fn relationships(&self) -> Vec<Arc<Relationship>> {
        let mut all: Vec<Arc<Relationship>> = self
            .outgoing
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect();
        all.sort_by_key(|rel| rel.key());
        all
    }

    pub fn relationship(&self, key: &EdgeKey) -> Option<Arc<Relationship>> {
        self.outgoing
            .get(&key.source)
            .and_then(|adj| adj.get(&(key.kind, key.target.clone())).cloned())
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.outgoing.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn symbol_entry(&self, id: &SymbolId) -> Option<Arc<Symbol>> {
        self.symbols.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

fn batch_rank(update: &ParserUpdate) -> u8 {
    match update {
        ParserUpdate::RemoveRelationship { .. } => 0,
        ParserUpdate::RemoveSymbol { .. } => 1,
        ParserUpdate::UpsertSymbol { .. } => 2,
        ParserUpdate::UpsertRelationship { .. } => 3,
    }
}

fn kind_selected(kinds: Option<&[RelationKind]>, kind: RelationKind) -> bool {
    kinds.map_or(true, |kinds| kinds.contains(&kind))
}

fn collect_adjacent(
    map: &DashMap<SymbolId, Adjacency>,
    id: &SymbolId,
    kinds: &[RelationKind],
    out: &mut Vec<(SymbolId, RelationKind)>,
) {
    if let Some(adj) = map.get(id) {
        out.extend(
            adj.keys()
                .filter(|(kind, _)| kinds.contains(kind))
                .map(|(kind, other)| (other.clone(), *kind)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemodel_core::Location;

    fn function(id: &str) -> Symbol {
        Symbol::new(id, id, SymbolKind::Function, Location::new("lib.py", 1, 5)).with_module("lib")
    }

    fn calls(a: &str, b: &str) -> Relationship {
        Relationship::new(a, b, RelationKind::Calls)
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let store = GraphStore::new();
        store.upsert_symbol(function("a")).unwrap();
        store.upsert_symbol(function("b")).unwrap();
        store.upsert_relationship(calls("a", "b")).unwrap();

        let out = store
            .neighbors(&"a".into(), Some(&[RelationKind::Calls]), Direction::Outgoing)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol.id.as_str(), "b");

        let inc = store
            .neighbors(&"b".into(), Some(&[RelationKind::Calls]), Direction::Incoming)
            .unwrap();
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].symbol.id.as_str(), "a");
        assert_eq!(inc[0].direction, Direction::Incoming);
    }

    #[test]
    fn test_missing_endpoint_is_invalid_edge() {
        let store = GraphStore::new();
        store.upsert_symbol(function("a")).unwrap();

        let err = store.upsert_relationship(calls("a", "ghost")).unwrap_err();
        match err {
            CodeModelError::InvalidEdge { missing, .. } => assert_eq!(missing.as_str(), "ghost"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.relationship_count(), 0);
    }

    #[test]
    fn test_remove_symbol_cascades() {
        let store = GraphStore::new();
        for id in ["a", "b", "c"] {
            store.upsert_symbol(function(id)).unwrap();
        }
        store.upsert_relationship(calls("a", "b")).unwrap();
        store.upsert_relationship(calls("b", "c")).unwrap();
        store.upsert_relationship(calls("b", "b")).unwrap();

        store.remove_symbol(&"b".into()).unwrap();

        assert_eq!(store.relationship_count(), 0);
        assert!(store
            .neighbors(&"a".into(), None, Direction::Both)
            .unwrap()
            .is_empty());
        assert!(store
            .neighbors(&"c".into(), None, Direction::Both)
            .unwrap()
            .is_empty());
        assert!(store.find_symbols("b", None, true).is_empty());
        assert!(store.remove_symbol(&"b".into()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_upserts_are_idempotent() {
        let store = GraphStore::new();
        assert!(store.upsert_symbol(function("a")).unwrap());
        assert!(store.upsert_symbol(function("b")).unwrap());
        assert!(store.upsert_relationship(calls("a", "b")).unwrap());
        let revision = store.revision();

        assert!(!store.upsert_symbol(function("a")).unwrap());
        assert!(!store.upsert_relationship(calls("a", "b")).unwrap());
        assert_eq!(store.revision(), revision);
        assert_eq!(store.relationship_count(), 1);

        // Same triple with a new strength replaces, never duplicates
        assert!(store
            .upsert_relationship(calls("a", "b").with_strength(0.5))
            .unwrap());
        assert_eq!(store.relationship_count(), 1);
        assert_eq!(store.relationships()[0].strength, 0.5);
    }

    #[test]
    fn test_find_symbols_case_insensitive() {
        let store = GraphStore::new();
        store
            .upsert_symbol(Symbol::new(
                "m::ParseFile",
                "ParseFile",
                SymbolKind::Function,
                Location::new("m.py", 1, 1),
            ))
            .unwrap();
        store
            .upsert_symbol(Symbol::new(
                "m::Parser",
                "Parser",
                SymbolKind::Class,
                Location::new("m.py", 3, 9),
            ))
            .unwrap();

        assert_eq!(store.find_symbols("parse", None, false).len(), 2);
        assert_eq!(store.find_symbols("PARSEFILE", None, true).len(), 1);
        assert_eq!(store.find_symbols("parse", Some(SymbolKind::Class), false).len(), 1);
        assert!(store.find_symbols("render", None, false).is_empty());
    }

    #[test]
    fn test_rename_updates_name_index() {
        let store = GraphStore::new();
        store.upsert_symbol(function("a")).unwrap();
        let mut renamed = function("a");
        renamed.name = "alpha".to_string();
        store.upsert_symbol(renamed).unwrap();

        assert!(store.find_symbols("a", None, true).is_empty());
        assert_eq!(store.find_symbols("alpha", None, true).len(), 1);
    }

    #[test]
    fn test_children_follow_parent_links() {
        let store = GraphStore::new();
        let class = Symbol::new("Cart", "Cart", SymbolKind::Class, Location::new("c.py", 1, 40));
        store.upsert_symbol(class).unwrap();
        for method in ["Cart.total", "Cart.add"] {
            store
                .upsert_symbol(
                    Symbol::new(method, method, SymbolKind::Method, Location::new("c.py", 2, 3))
                        .with_parent("Cart"),
                )
                .unwrap();
        }

        let ids: Vec<_> = store
            .children(&"Cart".into())
            .iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["Cart.add", "Cart.total"]);

        store.remove_symbol(&"Cart.add".into()).unwrap();
        assert_eq!(store.children(&"Cart".into()).len(), 1);
    }

    #[test]
    fn test_batch_orders_symbols_before_edges() {
        let store = GraphStore::new();
        let stats = store
            .apply_batch(vec![
                ParserUpdate::UpsertRelationship {
                    relationship: calls("a", "b"),
                },
                ParserUpdate::UpsertSymbol { symbol: function("a") },
                ParserUpdate::UpsertSymbol { symbol: function("b") },
                ParserUpdate::RemoveSymbol { id: "zzz".into() },
            ])
            .unwrap();

        assert_eq!(stats.symbols_upserted, 2);
        assert_eq!(stats.relationships_upserted, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(store.relationship_count(), 1);
    }

    #[test]
    fn test_remove_file() {
        let store = GraphStore::new();
        store.upsert_symbol(function("a")).unwrap();
        store
            .upsert_symbol(Symbol::new("x", "x", SymbolKind::Function, Location::new("other.py", 1, 1)))
            .unwrap();
        store.upsert_relationship(calls("x", "a")).unwrap();

        let removed = store.remove_file("lib.py");
        assert_eq!(removed, vec![SymbolId::from("a")]);
        assert_eq!(store.symbol_count(), 1);
        assert_eq!(store.relationship_count(), 0);
    }

    #[test]
    fn test_concurrent_writers_keep_integrity() {
        let store = Arc::new(GraphStore::with_lock_stripes(8));
        for i in 0..64 {
            store.upsert_symbol(function(&format!("s{i}"))).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..64 {
                        let a = format!("s{}", (i + t) % 64);
                        let b = format!("s{}", (i * 7 + t) % 64);
                        let _ = store.upsert_relationship(calls(&a, &b));
                        if i % 16 == t {
                            let _ = store.remove_symbol(&SymbolId::from(b.as_str()));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for rel in store.relationships() {
            assert!(store.contains(&rel.source));
            assert!(store.contains(&rel.target));
        }
    }
}
