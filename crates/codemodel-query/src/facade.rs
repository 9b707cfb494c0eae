use crate::error::{QueryError, QueryResult};
use crate::operations::{operation_table, Operation, OperationSchema};
use crate::requests::*;
use codemodel_analysis::{
    explain_architecture, project_overview, ArchitectureSummary, ComplexityReport,
    CoverageReport, PatternMatch, ProjectOverview, RefactoringAdvisor, RefactoringReport,
};
use codemodel_core::{
    CodeModelConfig, CodeModelError, ConfigManager, EmbeddingProvider, ParserUpdate,
    Relationship, RelationKind, Result, Symbol, SymbolId,
};
use codemodel_graph::{
    analyze_dependencies, find_cycles, trace_data_flow, BatchStats, DataFlowTrace,
    DependencyAnalysis, DependencyQuery, GraphStore, RestoreStats,
};
use codemodel_vector::{RefreshStats, SearchHit, SemanticSearch, VectorIndex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const QUERY_LOG_TARGET: &str = "codemodel::query";

/// The engine behind every named operation.
///
/// Holds the shared graph store and vector index plus the optional embedding
/// provider. Query methods take `&self` and may run concurrently with each
/// other and with mutations.
pub struct CodeModel {
    config: CodeModelConfig,
    store: Arc<GraphStore>,
    index: Arc<VectorIndex>,
    search: Option<SemanticSearch>,
    operations: BTreeMap<&'static str, Operation>,
    /// Also owns the complexity, pattern and coverage analyzers
    advisor: RefactoringAdvisor,
}

impl CodeModel {
    /// Empty model without an embedding provider; text search is unavailable
    /// until one is configured, vectors can still be indexed directly.
    pub fn new(config: CodeModelConfig) -> Result<Self> {
        let index = Arc::new(VectorIndex::from_config(&config.search)?);
        Self::from_parts(config, Arc::new(GraphStore::new()), index, None)
    }

    pub fn with_provider(config: CodeModelConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let index = Arc::new(VectorIndex::from_config(&config.search)?);
        Self::from_parts(config, Arc::new(GraphStore::new()), index, Some(provider))
    }

    pub fn from_parts(
        config: CodeModelConfig,
        store: Arc<GraphStore>,
        index: Arc<VectorIndex>,
        provider: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        ConfigManager::validate_config(&config)?;
        if index.dimension() != config.search.dimension {
            return Err(CodeModelError::DimensionMismatch {
                expected: config.search.dimension,
                actual: index.dimension(),
            });
        }
        let search = match provider {
            Some(provider) => Some(SemanticSearch::new(
                Arc::clone(&index),
                provider,
                config.search.batch_size,
            )?),
            None => None,
        };

        info!(
            index = ?index.kind(),
            dimension = index.dimension(),
            provider = search.as_ref().map(|s| s.provider_name()).unwrap_or("none"),
            "CodeModel initialized"
        );

        Ok(Self {
            advisor: RefactoringAdvisor::new(&config),
            operations: operation_table(),
            config,
            store,
            index,
            search,
        })
    }

    pub fn config(&self) -> &CodeModelConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn operation_names(&self) -> Vec<&'static str> {
        self.operations.keys().copied().collect()
    }

    pub fn schemas(&self) -> Vec<OperationSchema> {
        self.operations.values().map(|op| op.schema()).collect()
    }

    // Mutations

    pub fn upsert_symbol(&self, symbol: Symbol) -> Result<bool> {
        self.store.upsert_symbol(symbol)
    }

    /// Remove a symbol, its relationships and its vector.
    pub fn remove_symbol(&self, id: &SymbolId) -> Result<Arc<Symbol>> {
        let removed = self.store.remove_symbol(id)?;
        self.index.remove(id);
        Ok(removed)
    }

    pub fn upsert_relationship(&self, relationship: Relationship) -> Result<bool> {
        self.store.upsert_relationship(relationship)
    }

    pub fn remove_relationship(&self, source: &SymbolId, target: &SymbolId, kind: RelationKind) -> bool {
        self.store.remove_relationship(source, target, kind)
    }

    /// Apply a parser batch, then drop vectors of symbols it removed.
    pub fn apply_batch<I>(&self, updates: I) -> Result<BatchStats>
    where
        I: IntoIterator<Item = ParserUpdate>,
    {
        let stats = self.store.apply_batch(updates)?;
        if stats.symbols_removed > 0 {
            self.purge_vectors();
        }
        Ok(stats)
    }

    pub fn remove_file(&self, file_path: &str) -> Vec<SymbolId> {
        let removed = self.store.remove_file(file_path);
        for id in &removed {
            self.index.remove(id);
        }
        removed
    }

    /// Store or replace a symbol's vector directly.
    pub fn index_vector(&self, id: &SymbolId, vector: &[f32]) -> Result<()> {
        if !self.store.contains(id) {
            return Err(CodeModelError::symbol_not_found(id));
        }
        self.index.insert(id.clone(), vector)?;
        // Removed while inserting
        if !self.store.contains(id) {
            self.index.remove(id);
            return Err(CodeModelError::symbol_not_found(id));
        }
        Ok(())
    }

    /// Embed new and changed symbols through the provider.
    pub async fn refresh_embeddings(&self) -> Result<RefreshStats> {
        self.searcher()?.refresh(&self.store).await
    }

    pub fn snapshot_graph(&self) -> Result<Vec<u8>> {
        self.store.snapshot()
    }

    /// Replace the graph from a snapshot and drop vectors it no longer backs.
    pub fn restore_graph(&self, bytes: &[u8]) -> Result<RestoreStats> {
        let stats = self.store.restore(bytes)?;
        self.purge_vectors();
        Ok(stats)
    }

    pub fn snapshot_index(&self) -> Result<Vec<u8>> {
        self.index.snapshot()
    }

    pub fn restore_index(&self, bytes: &[u8]) -> Result<usize> {
        self.index.restore(bytes)?;
        self.purge_vectors();
        Ok(self.index.len())
    }

    fn purge_vectors(&self) -> usize {
        let store = &self.store;
        let purged = self.index.retain(|id| store.contains(id));
        if !purged.is_empty() {
            debug!(purged = purged.len(), "Dropped vectors of removed symbols");
        }
        purged.len()
    }

    fn searcher(&self) -> Result<&SemanticSearch> {
        self.search
            .as_ref()
            .ok_or_else(|| CodeModelError::Embedding("no embedding provider configured".to_string()))
    }

    /// A symbol id, or a name shared by exactly one symbol.
    pub fn resolve_symbol(&self, symbol: &str) -> Result<SymbolId> {
        require_text("symbol", symbol)?;
        let id = SymbolId::from(symbol);
        if self.store.contains(&id) {
            return Ok(id);
        }
        let named: Vec<SymbolId> = self
            .store
            .find_symbols(symbol, None, true)
            .into_iter()
            .filter(|s| s.name == symbol)
            .map(|s| s.id.clone())
            .collect();
        match named.as_slice() {
            [] => Err(CodeModelError::symbol_not_found(&id)),
            [only] => Ok(only.clone()),
            many => Err(CodeModelError::invalid_argument(
                "symbol",
                symbol,
                format!(
                    "name is ambiguous; use one of: {}",
                    many.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }

    // Operations

    pub fn overview(&self) -> QueryResult<ProjectOverview> {
        op(
            Operation::Overview,
            Ok(project_overview(&self.store, |id| self.index.contains(id))),
        )
    }

    /// Exact (case-insensitive) name matches first, then by id.
    pub fn find_symbol(&self, request: &FindSymbolRequest) -> QueryResult<Vec<Symbol>> {
        op(Operation::FindSymbol, self.find_symbol_inner(request))
    }

    fn find_symbol_inner(&self, request: &FindSymbolRequest) -> Result<Vec<Symbol>> {
        require_text("name", &request.name)?;
        let limit = request
            .limit
            .map(|limit| validate_limit("limit", limit, usize::MAX))
            .transpose()?;

        let wanted = request.name.to_lowercase();
        let module = request.module.as_deref().filter(|m| !m.is_empty());
        let mut found: Vec<Arc<Symbol>> = self
            .store
            .find_symbols(&request.name, request.kind, request.exact)
            .into_iter()
            .filter(|s| module.map_or(true, |m| s.in_module(m)))
            .collect();
        found.sort_by(|a, b| {
            let a_exact = a.name.to_lowercase() == wanted;
            let b_exact = b.name.to_lowercase() == wanted;
            b_exact.cmp(&a_exact).then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        Ok(found.iter().map(|s| s.as_ref().clone()).collect())
    }

    pub fn analyze_dependencies(&self, request: &AnalyzeDependenciesRequest) -> QueryResult<DependencyAnalysis> {
        op(Operation::AnalyzeDependencies, self.analyze_dependencies_inner(request))
    }

    fn analyze_dependencies_inner(&self, request: &AnalyzeDependenciesRequest) -> Result<DependencyAnalysis> {
        let defaults = DependencyQuery::default();
        let depth = match request.depth {
            Some(depth) => validate_depth("depth", depth, self.config.traversal.max_depth)?,
            None => defaults.depth.min(self.config.traversal.max_depth),
        };
        let root = self.resolve_symbol(&request.symbol)?;
        let query = DependencyQuery {
            depth,
            direction: request.direction.unwrap_or(defaults.direction),
            kinds: request.kinds.clone().unwrap_or(defaults.kinds),
        };
        analyze_dependencies(&self.store, &root, &query)
    }

    pub fn trace_data_flow(&self, request: &TraceDataFlowRequest) -> QueryResult<DataFlowTrace> {
        op(Operation::TraceDataFlow, self.trace_data_flow_inner(request))
    }

    fn trace_data_flow_inner(&self, request: &TraceDataFlowRequest) -> Result<DataFlowTrace> {
        let max_length = self.config.traversal.max_flow_length;
        let max_length = match request.max_length {
            Some(length) => validate_limit("max_length", length, max_length)?,
            None => max_length,
        };
        trace_data_flow(&self.store, &request.variable, max_length)
    }

    pub fn find_patterns(&self, request: &FindPatternsRequest) -> QueryResult<Vec<PatternMatch>> {
        op(
            Operation::FindPatterns,
            self.advisor
                .patterns()
                .detect(&self.store, request.pattern_type.as_deref()),
        )
    }

    pub fn analyze_complexity(&self, request: &AnalyzeComplexityRequest) -> QueryResult<ComplexityReport> {
        let complexity = self.advisor.complexity();
        let threshold = request.threshold.unwrap_or(complexity.default_threshold());
        op(
            Operation::AnalyzeComplexity,
            complexity.analyze(&self.store, request.module.as_deref(), threshold),
        )
    }

    pub fn suggest_refactoring(&self, request: &SuggestRefactoringRequest) -> QueryResult<RefactoringReport> {
        op(Operation::SuggestRefactoring, self.suggest_refactoring_inner(request))
    }

    fn suggest_refactoring_inner(&self, request: &SuggestRefactoringRequest) -> Result<RefactoringReport> {
        let scope = match request.symbol.as_deref() {
            Some(symbol) => Some(self.resolve_symbol(symbol)?),
            None => None,
        };
        self.advisor.suggest(&self.store, scope.as_ref())
    }

    pub async fn semantic_search(&self, request: &SemanticSearchRequest) -> QueryResult<Vec<ScoredSymbol>> {
        op(Operation::SemanticSearch, self.semantic_search_inner(request).await)
    }

    async fn semantic_search_inner(&self, request: &SemanticSearchRequest) -> Result<Vec<ScoredSymbol>> {
        require_text("query", &request.query)?;
        let limit = self.limit(request.limit)?;
        let hits = self.searcher()?.search_text(&request.query, limit).await?;
        Ok(self.scored(hits))
    }

    pub fn get_test_coverage(&self, request: &GetTestCoverageRequest) -> QueryResult<CoverageReport> {
        op(
            Operation::GetTestCoverage,
            Ok(self
                .advisor
                .coverage()
                .map(&self.store, request.module.as_deref())),
        )
    }

    pub fn explain_architecture(&self) -> QueryResult<ArchitectureSummary> {
        op(Operation::ExplainArchitecture, Ok(explain_architecture(&self.store)))
    }

    pub fn find_similar(&self, request: &FindSimilarRequest) -> QueryResult<Vec<ScoredSymbol>> {
        op(Operation::FindSimilar, self.find_similar_inner(request))
    }

    fn find_similar_inner(&self, request: &FindSimilarRequest) -> Result<Vec<ScoredSymbol>> {
        let limit = self.limit(request.limit)?;
        let id = self.resolve_symbol(&request.symbol)?;
        let hits = self.index.similar_to(&id, limit)?;
        Ok(self.scored(hits))
    }

    pub fn find_cycles(&self, request: &FindCyclesRequest) -> QueryResult<CycleReport> {
        op(Operation::FindCycles, self.find_cycles_inner(request))
    }

    fn find_cycles_inner(&self, request: &FindCyclesRequest) -> Result<CycleReport> {
        let kinds = request
            .kinds
            .clone()
            .unwrap_or_else(|| vec![RelationKind::Calls, RelationKind::Imports]);
        if kinds.is_empty() {
            return Err(CodeModelError::invalid_argument(
                "kinds",
                "[]",
                "at least one relationship kind is required",
            ));
        }
        let cycles = find_cycles(&self.store, &kinds);
        Ok(CycleReport { kinds, cycles })
    }

    fn limit(&self, requested: Option<i64>) -> Result<usize> {
        match requested {
            Some(limit) => validate_limit("limit", limit, self.config.search.max_limit),
            None => Ok(self.config.search.default_limit),
        }
    }

    /// Attach summaries, skipping hits whose symbol is already gone.
    fn scored(&self, hits: Vec<SearchHit>) -> Vec<ScoredSymbol> {
        hits.into_iter()
            .filter_map(|hit| {
                self.store.get_symbol(&hit.id).ok().map(|symbol| ScoredSymbol {
                    symbol: symbol.summary(),
                    score: hit.score,
                })
            })
            .collect()
    }

    /// Run an operation by name with JSON parameters (`null` means no
    /// parameters). Returns `{"operation": name, "result": ...}`.
    pub async fn execute(&self, name: &str, parameters: JsonValue) -> QueryResult<JsonValue> {
        let operation = *self
            .operations
            .get(name)
            .ok_or_else(|| QueryError::UnknownOperation(name.to_string()))?;

        info!(target: QUERY_LOG_TARGET, operation = name, "Operation started");
        debug!(
            target: QUERY_LOG_TARGET,
            operation = name,
            "Operation parameters: {}",
            parameters
        );
        let started = Instant::now();

        let result = self.dispatch(operation, parameters).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                info!(
                    target: QUERY_LOG_TARGET,
                    operation = name,
                    elapsed_ms,
                    result_items = result_items(&result),
                    "Operation completed"
                );
                Ok(json!({
                    "operation": name,
                    "result": result,
                }))
            }
            Err(err) => {
                warn!(
                    target: QUERY_LOG_TARGET,
                    operation = name,
                    elapsed_ms,
                    error = %err,
                    "Operation failed"
                );
                Err(err)
            }
        }
    }

    async fn dispatch(&self, operation: Operation, parameters: JsonValue) -> QueryResult<JsonValue> {
        match operation {
            Operation::Overview => {
                let _: OverviewRequest = decode(operation, parameters)?;
                encode(operation, self.overview()?)
            }
            Operation::FindSymbol => {
                let request: FindSymbolRequest = decode(operation, parameters)?;
                encode(operation, self.find_symbol(&request)?)
            }
            Operation::AnalyzeDependencies => {
                let request: AnalyzeDependenciesRequest = decode(operation, parameters)?;
                encode(operation, self.analyze_dependencies(&request)?)
            }
            Operation::TraceDataFlow => {
                let request: TraceDataFlowRequest = decode(operation, parameters)?;
                encode(operation, self.trace_data_flow(&request)?)
            }
            Operation::FindPatterns => {
                let request: FindPatternsRequest = decode(operation, parameters)?;
                encode(operation, self.find_patterns(&request)?)
            }
            Operation::AnalyzeComplexity => {
                let request: AnalyzeComplexityRequest = decode(operation, parameters)?;
                encode(operation, self.analyze_complexity(&request)?)
            }
            Operation::SuggestRefactoring => {
                let request: SuggestRefactoringRequest = decode(operation, parameters)?;
                encode(operation, self.suggest_refactoring(&request)?)
            }
            Operation::SemanticSearch => {
                let request: SemanticSearchRequest = decode(operation, parameters)?;
                encode(operation, self.semantic_search(&request).await?)
            }
            Operation::GetTestCoverage => {
                let request: GetTestCoverageRequest = decode(operation, parameters)?;
                encode(operation, self.get_test_coverage(&request)?)
            }
            Operation::ExplainArchitecture => {
                let _: ExplainArchitectureRequest = decode(operation, parameters)?;
                encode(operation, self.explain_architecture()?)
            }
            Operation::FindSimilar => {
                let request: FindSimilarRequest = decode(operation, parameters)?;
                encode(operation, self.find_similar(&request)?)
            }
            Operation::FindCycles => {
                let request: FindCyclesRequest = decode(operation, parameters)?;
                encode(operation, self.find_cycles(&request)?)
            }
        }
    }
}

/// Attach the operation name to an engine failure.
fn op<T>(operation: Operation, result: Result<T>) -> QueryResult<T> {
    result.map_err(|source| {
        debug!(target: QUERY_LOG_TARGET, operation = operation.name(), error = %source, "Engine error");
        QueryError::operation(operation.name(), source)
    })
}

fn decode<T: DeserializeOwned>(operation: Operation, parameters: JsonValue) -> QueryResult<T> {
    let parameters = if parameters.is_null() {
        JsonValue::Object(Default::default())
    } else {
        parameters
    };
    serde_json::from_value(parameters).map_err(|e| QueryError::InvalidParameters {
        operation: operation.name(),
        message: e.to_string(),
    })
}

fn encode<T: Serialize>(operation: Operation, value: T) -> QueryResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| QueryError::operation(operation.name(), e.into()))
}

fn result_items(result: &JsonValue) -> usize {
    match result {
        JsonValue::Array(items) => items.len(),
        JsonValue::Null => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemodel_core::{Location, SymbolKind};

    fn model() -> CodeModel {
        let mut config = CodeModelConfig::default();
        config.search.dimension = 3;
        let model = CodeModel::new(config).unwrap();
        for id in ["billing.total", "billing.tax", "shipping.total"] {
            let name = id.rsplit('.').next().unwrap_or(id);
            model
                .upsert_symbol(
                    Symbol::new(id, name, SymbolKind::Function, Location::new("m.py", 1, 4))
                        .with_module(id.split('.').next().unwrap_or_default()),
                )
                .unwrap();
        }
        model
    }

    #[test]
    fn test_resolve_by_id_or_unique_name() {
        let model = model();
        assert_eq!(model.resolve_symbol("billing.tax").unwrap().as_str(), "billing.tax");
        assert_eq!(model.resolve_symbol("tax").unwrap().as_str(), "billing.tax");

        let err = model.resolve_symbol("total").unwrap_err();
        assert!(matches!(err, CodeModelError::InvalidArgument { name: "symbol", .. }));
        assert!(model.resolve_symbol("nothing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_symbol_ranks_exact_names_first() {
        let model = model();
        model
            .upsert_symbol(Symbol::new("a.subtotal", "subtotal", SymbolKind::Function, Location::new("a.py", 1, 1)))
            .unwrap();
        let found = model
            .find_symbol(&FindSymbolRequest {
                name: "TOTAL".to_string(),
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["billing.total", "shipping.total", "a.subtotal"]);

        let filtered = model
            .find_symbol(&FindSymbolRequest {
                name: "total".to_string(),
                module: Some("shipping".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_removing_symbol_drops_its_vector() {
        let model = model();
        let id = SymbolId::from("billing.tax");
        model.index_vector(&id, &[1.0, 0.0, 0.0]).unwrap();
        assert!(model.index().contains(&id));

        model.remove_symbol(&id).unwrap();
        assert!(!model.index().contains(&id));
        assert!(model.index_vector(&id, &[1.0, 0.0, 0.0]).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_text_search_needs_a_provider() {
        let model = model();
        let err = model
            .semantic_search(&SemanticSearchRequest {
                query: "tax".to_string(),
                limit: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.engine_error(), Some(CodeModelError::Embedding(_))));
    }

    #[test]
    fn test_analyzers_follow_configuration() {
        let mut config = CodeModelConfig::default();
        config.search.dimension = 3;
        config.traversal.coverage_depth = 1;
        config.complexity.default_threshold = 2.5;
        let model = CodeModel::new(config).unwrap();
        for id in ["lib.entry", "lib.helper", "tests.test_entry"] {
            let kind = if id.starts_with("tests.") { SymbolKind::Test } else { SymbolKind::Function };
            model
                .upsert_symbol(Symbol::new(id, id, kind, Location::new("m.py", 1, 2)).with_module("lib"))
                .unwrap();
        }
        model
            .upsert_relationship(Relationship::new("tests.test_entry", "lib.entry", RelationKind::Tests))
            .unwrap();
        model
            .upsert_relationship(Relationship::new("lib.entry", "lib.helper", RelationKind::Calls))
            .unwrap();

        // One hop: the helper behind the tested entry stays uncovered
        let coverage = model.get_test_coverage(&GetTestCoverageRequest::default()).unwrap();
        assert_eq!(coverage.total, 2);
        assert_eq!(coverage.covered, 1);

        let complexity = model
            .analyze_complexity(&AnalyzeComplexityRequest::default())
            .unwrap();
        assert_eq!(complexity.threshold, 2.5);
    }

    #[test]
    fn test_mismatched_index_dimension_rejected() {
        let config = CodeModelConfig::default();
        let index = Arc::new(VectorIndex::flat(8).unwrap());
        let err = CodeModel::from_parts(config, Arc::new(GraphStore::new()), index, None).err();
        assert!(matches!(err, Some(CodeModelError::DimensionMismatch { .. })));
    }
}
