//! Structural design-pattern matching.
//!
//! Each catalog entry is a small template: an anchor role plus roles linked to
//! earlier ones by containment or a typed edge. Matching binds roles to distinct
//! symbols by bounded backtracking, so cost grows with template size rather than
//! graph size.

mod catalog;

pub use catalog::{catalog, GOD_OBJECT};

use codemodel_core::{
    CodeModelError, Direction, Modifier, PatternConfig, RelationKind, Result, Symbol, SymbolId,
    SymbolKind, SymbolSummary,
};
use codemodel_graph::GraphStore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Backtracking steps allowed per anchor before the search gives up.
pub const MAX_STEPS_PER_ANCHOR: usize = 10_000;

/// How a role's candidates are found from already-bound roles.
#[derive(Debug, Clone, Copy)]
pub enum Link {
    /// Role 0: every symbol in the graph is a candidate
    Anchor,
    /// Declared with the bound role as `parent`
    MemberOf(usize),
    /// Adjacent to the bound role over `kinds`; `Outgoing` means the edge runs
    /// from the bound role to the candidate
    Edge {
        from: usize,
        kinds: &'static [RelationKind],
        direction: Direction,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum NameRule {
    Any,
    /// Lower-cased name (leading underscores stripped) starts with one of these
    Prefix(&'static [&'static str]),
    /// Lower-cased name contains one of these
    Contains(&'static [&'static str]),
    /// Named like the bound role, or a conventional constructor name
    ConstructorOf(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Role {
    pub name: &'static str,
    pub kinds: &'static [SymbolKind],
    pub link: Link,
    pub names: NameRule,
    pub required_modifiers: &'static [Modifier],
    pub optional: bool,
}

/// Edge that must exist between two bound roles. Ignored when either role is
/// optional and left unbound.
#[derive(Debug, Clone, Copy)]
pub struct ExtraEdge {
    pub from: usize,
    pub to: usize,
    pub kinds: &'static [RelationKind],
}

#[derive(Debug, Clone, Copy)]
pub struct PatternTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub anti_pattern: bool,
    pub base_confidence: f64,
    pub roles: &'static [Role],
    pub extra_edges: &'static [ExtraEdge],
    /// Every bound role must share the anchor's module
    pub same_module: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Participant {
    pub role: String,
    pub symbol: SymbolSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternMatch {
    pub pattern: String,
    pub anti_pattern: bool,
    /// In `[0, 1]`
    pub confidence: f64,
    pub anchor: SymbolId,
    pub participants: Vec<Participant>,
    /// Participating ids, sorted
    pub symbols: Vec<SymbolId>,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    /// Catalog names in presentation order.
    pub fn pattern_names() -> Vec<&'static str> {
        catalog()
            .iter()
            .map(|t| t.name)
            .chain(std::iter::once(GOD_OBJECT))
            .collect()
    }

    /// Run every catalog entry, or only `pattern_type` (case-insensitive,
    /// punctuation ignored, so `god_object` finds `GodObject`).
    ///
    /// Ordered by confidence descending, then pattern name, then anchor id.
    pub fn detect(&self, store: &GraphStore, pattern_type: Option<&str>) -> Result<Vec<PatternMatch>> {
        let selected = match pattern_type.filter(|p| !p.trim().is_empty()) {
            Some(requested) => Some(resolve_pattern(requested)?),
            None => None,
        };

        let mut matches = Vec::new();
        for template in catalog() {
            if selected.map_or(true, |name| name == template.name) {
                matches.extend(self.match_template(store, template));
            }
        }
        if selected.map_or(true, |name| name == GOD_OBJECT) {
            matches.extend(self.detect_god_objects(store));
        }

        matches.retain(|m| m.confidence >= self.config.min_confidence);
        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.pattern.cmp(&b.pattern))
                .then_with(|| a.anchor.cmp(&b.anchor))
        });

        debug!(
            pattern = selected.unwrap_or("*"),
            matches = matches.len(),
            "Pattern detection complete"
        );
        Ok(matches)
    }

    /// All matches of one template, one per anchor at most.
    pub fn match_template(&self, store: &GraphStore, template: &PatternTemplate) -> Vec<PatternMatch> {
        let Some(anchor_role) = template.roles.first() else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for anchor in store.symbols() {
            if !role_accepts(anchor_role, &anchor, &[]) {
                continue;
            }
            let mut search = BindingSearch::new(store, template);
            search.bound[0] = Some(Arc::clone(&anchor));
            search.used.insert(anchor.id.clone());
            search.extend(1);
            if search.exhausted {
                warn!(
                    pattern = template.name,
                    anchor = %anchor.id,
                    "Pattern search step budget exhausted"
                );
            }
            if let Some(binding) = search.best {
                found.push(build_match(template, &binding));
            }
        }
        found
    }

    /// Classes with too many members or too many distinct collaborators.
    fn detect_god_objects(&self, store: &GraphStore) -> Vec<PatternMatch> {
        let min_members = self.config.god_object_min_members.max(1);
        let min_fan_out = self.config.god_object_min_fan_out.max(1);

        let mut found = Vec::new();
        for class in store.symbols() {
            if class.kind != SymbolKind::Class {
                continue;
            }
            let members = store.children(&class.id);

            let own: HashSet<&SymbolId> = std::iter::once(&class.id)
                .chain(members.iter().map(|m| &m.id))
                .collect();
            let mut collaborators: BTreeSet<SymbolId> = BTreeSet::new();
            for id in &own {
                for (target, _) in store.adjacent_ids(id, &GOD_OBJECT_EDGES, Direction::Outgoing) {
                    if !own.contains(&target) {
                        collaborators.insert(target);
                    }
                }
            }

            if members.len() < min_members && collaborators.len() < min_fan_out {
                continue;
            }

            let ratio = (members.len() as f64 / min_members as f64)
                .max(collaborators.len() as f64 / min_fan_out as f64);
            let confidence = (GOD_OBJECT_CONFIDENCE * (0.8 + 0.2 * ratio)).min(1.0);

            let mut participants = vec![Participant {
                role: "class".to_string(),
                symbol: class.summary(),
            }];
            participants.extend(members.iter().map(|m| Participant {
                role: "member".to_string(),
                symbol: m.summary(),
            }));
            let mut symbols: Vec<SymbolId> = own.into_iter().cloned().collect();
            symbols.sort();

            found.push(PatternMatch {
                pattern: GOD_OBJECT.to_string(),
                anti_pattern: true,
                confidence,
                anchor: class.id.clone(),
                participants,
                symbols,
                description: format!(
                    "{} has {} members and {} distinct collaborators",
                    class.name,
                    members.len(),
                    collaborators.len()
                ),
            });
        }
        found
    }
}

const GOD_OBJECT_CONFIDENCE: f64 = 0.9;
const GOD_OBJECT_EDGES: [RelationKind; 3] = [
    RelationKind::Calls,
    RelationKind::References,
    RelationKind::Imports,
];

/// Map a user-supplied pattern name to its catalog name.
pub fn resolve_pattern(requested: &str) -> Result<&'static str> {
    let wanted = normalize(requested);
    PatternDetector::pattern_names()
        .into_iter()
        .find(|name| normalize(name) == wanted)
        .ok_or_else(|| {
            CodeModelError::invalid_argument(
                "pattern_type",
                requested,
                format!(
                    "unknown pattern; expected one of: {}",
                    PatternDetector::pattern_names().join(", ")
                ),
            )
        })
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

type Binding = Vec<Option<Arc<Symbol>>>;

struct BindingSearch<'a> {
    store: &'a GraphStore,
    template: &'a PatternTemplate,
    bound: Binding,
    used: HashSet<SymbolId>,
    steps: usize,
    exhausted: bool,
    best: Option<Binding>,
    best_bound: usize,
}

impl<'a> BindingSearch<'a> {
    fn new(store: &'a GraphStore, template: &'a PatternTemplate) -> Self {
        Self {
            store,
            template,
            bound: vec![None; template.roles.len()],
            used: HashSet::new(),
            steps: 0,
            exhausted: false,
            best: None,
            best_bound: 0,
        }
    }

    fn complete(&self) -> bool {
        self.best_bound == self.template.roles.len()
    }

    /// Bind roles from `index` on. Keeps the binding with the most roles bound;
    /// the first one found wins a tie.
    fn extend(&mut self, index: usize) {
        if self.complete() || self.exhausted {
            return;
        }
        if index == self.template.roles.len() {
            let bound = self.bound.iter().filter(|b| b.is_some()).count();
            if self.best.is_none() || bound > self.best_bound {
                self.best = Some(self.bound.clone());
                self.best_bound = bound;
            }
            return;
        }

        let template = self.template;
        let role = &template.roles[index];
        for candidate in self.candidates(index) {
            self.steps += 1;
            if self.steps > MAX_STEPS_PER_ANCHOR {
                self.exhausted = true;
                return;
            }
            if self.used.contains(&candidate.id)
                || !role_accepts(role, &candidate, &self.bound)
                || !self.module_holds(&candidate)
                || !self.extra_edges_hold(index, &candidate)
            {
                continue;
            }
            self.used.insert(candidate.id.clone());
            self.bound[index] = Some(candidate);
            self.extend(index + 1);
            if let Some(released) = self.bound[index].take() {
                self.used.remove(&released.id);
            }
            if self.complete() || self.exhausted {
                return;
            }
        }

        if role.optional {
            self.extend(index + 1);
        }
    }

    fn candidates(&self, index: usize) -> Vec<Arc<Symbol>> {
        match self.template.roles[index].link {
            Link::Anchor => self.store.symbols(),
            Link::MemberOf(parent) => match &self.bound[parent] {
                Some(parent) => self.store.children(&parent.id),
                None => Vec::new(),
            },
            Link::Edge {
                from,
                kinds,
                direction,
            } => match &self.bound[from] {
                Some(from) => self
                    .store
                    .adjacent_ids(&from.id, kinds, direction)
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .filter_map(|id| self.store.get_symbol(&id).ok())
                    .collect(),
                None => Vec::new(),
            },
        }
    }

    fn module_holds(&self, candidate: &Symbol) -> bool {
        if !self.template.same_module {
            return true;
        }
        self.bound[0]
            .as_ref()
            .is_some_and(|anchor| anchor.module == candidate.module)
    }

    /// Extra edges between `candidate` (as role `index`) and roles bound before it.
    fn extra_edges_hold(&self, index: usize, candidate: &Symbol) -> bool {
        self.template.extra_edges.iter().all(|edge| {
            let other = if edge.from == index {
                edge.to
            } else if edge.to == index {
                edge.from
            } else {
                return true;
            };
            if other > index {
                return true;
            }
            let Some(other) = &self.bound[other] else {
                return true;
            };
            let (source, target) = if edge.from == index {
                (&candidate.id, &other.id)
            } else {
                (&other.id, &candidate.id)
            };
            self.store
                .adjacent_ids(source, edge.kinds, Direction::Outgoing)
                .iter()
                .any(|(id, _)| id == target)
        })
    }
}

fn role_accepts(role: &Role, symbol: &Symbol, bound: &[Option<Arc<Symbol>>]) -> bool {
    if !role.kinds.contains(&symbol.kind) {
        return false;
    }
    if !role.required_modifiers.iter().all(|m| symbol.has_modifier(*m)) {
        return false;
    }
    let lowered = symbol.name.to_lowercase();
    match role.names {
        NameRule::Any => true,
        NameRule::Prefix(prefixes) => {
            let trimmed = lowered.trim_start_matches('_');
            prefixes.iter().any(|p| trimmed.starts_with(p))
        }
        NameRule::Contains(parts) => parts.iter().any(|p| lowered.contains(p)),
        NameRule::ConstructorOf(owner) => {
            let owner_named = bound
                .get(owner)
                .and_then(Option::as_ref)
                .is_some_and(|owner| owner.name.to_lowercase() == lowered);
            owner_named || CONSTRUCTOR_NAMES.contains(&lowered.as_str())
        }
    }
}

const CONSTRUCTOR_NAMES: [&str; 4] = ["__init__", "constructor", "new", "init"];

fn build_match(template: &PatternTemplate, binding: &Binding) -> PatternMatch {
    let mut participants = Vec::new();
    for (role, symbol) in template.roles.iter().zip(binding) {
        if let Some(symbol) = symbol {
            participants.push(Participant {
                role: role.name.to_string(),
                symbol: symbol.summary(),
            });
        }
    }
    let mut symbols: Vec<SymbolId> = participants.iter().map(|p| p.symbol.id.clone()).collect();
    symbols.sort();

    let confidence =
        template.base_confidence * participants.len() as f64 / template.roles.len() as f64;
    let anchor = participants
        .first()
        .map(|p| p.symbol.id.clone())
        .unwrap_or_else(|| SymbolId::new(""));

    PatternMatch {
        pattern: template.name.to_string(),
        anti_pattern: template.anti_pattern,
        confidence,
        anchor,
        participants,
        symbols,
        description: template.description.to_string(),
    }
}
