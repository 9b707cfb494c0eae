use async_trait::async_trait;
use codemodel_core::{
    CodeModelError, EmbeddingProvider, Location, Result, Symbol, SymbolId, SymbolKind,
};
use codemodel_graph::GraphStore;
use codemodel_vector::{IndexKind, SemanticSearch, VectorIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const AXES: [&str; 4] = ["parse", "write", "cart", "test"];

/// Deterministic provider: one axis per keyword plus a catch-all axis.
struct KeywordProvider {
    calls: AtomicUsize,
}

impl KeywordProvider {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut v: Vec<f32> = AXES
                    .iter()
                    .map(|axis| lower.matches(axis).count() as f32)
                    .collect();
                v.push(if v.iter().all(|x| *x == 0.0) { 1.0 } else { 0.0 });
                v
            })
            .collect())
    }

    fn embedding_dimension(&self) -> usize {
        AXES.len() + 1
    }

    fn provider_name(&self) -> &str {
        "keyword-axes"
    }
}

/// Returns one vector fewer than asked for
struct ShortProvider;

#[async_trait]
impl EmbeddingProvider for ShortProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
    }

    fn embedding_dimension(&self) -> usize {
        2
    }

    fn provider_name(&self) -> &str {
        "short"
    }
}

fn function(id: &str, name: &str) -> Symbol {
    Symbol::new(id, name, SymbolKind::Function, Location::new("io.py", 1, 5)).with_module("io")
}

#[test]
fn index_scenario_prefers_closest_vector() {
    let index = VectorIndex::flat(3).unwrap();
    index.insert("parseFile".into(), &[1.0, 0.0, 0.0]).unwrap();
    index.insert("writeFile".into(), &[0.0, 1.0, 0.0]).unwrap();

    let hits = index.search(&[0.9, 0.1, 0.0], 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "parseFile");
}

#[test]
fn repeated_searches_are_identical() {
    let index = VectorIndex::new(
        8,
        IndexKind::Bucketed {
            hyperplanes: 4,
            probe_radius: 2,
            seed: 1,
        },
    )
    .unwrap();
    let mut rng = fastrand::Rng::with_seed(3);
    for i in 0..300 {
        let v: Vec<f32> = (0..8).map(|_| rng.f32() * 2.0 - 1.0).collect();
        index.insert(SymbolId::new(format!("s{i}")), &v).unwrap();
    }
    let query = [0.3, -0.2, 0.9, 0.1, 0.0, 0.4, -0.7, 0.2];
    let first = index.search(&query, 10).unwrap();
    let second = index.search(&query, 10).unwrap();
    assert_eq!(first, second);
    assert!(first.len() <= 10);
    assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn refresh_embeds_changed_symbols_only() {
    let store = GraphStore::new();
    store.upsert_symbol(function("io.parse", "parse_file")).unwrap();
    store.upsert_symbol(function("io.write", "write_file")).unwrap();

    let provider = Arc::new(KeywordProvider::new());
    let index = Arc::new(VectorIndex::flat(provider.embedding_dimension()).unwrap());
    let search = SemanticSearch::new(Arc::clone(&index), provider.clone(), 1).unwrap();

    let stats = search.refresh(&store).await.unwrap();
    assert_eq!(stats.embedded, 2);
    assert_eq!(stats.batches, 2);
    assert_eq!(index.len(), 2);

    let again = search.refresh(&store).await.unwrap();
    assert_eq!(again.embedded, 0);
    assert_eq!(again.unchanged, 2);

    store
        .upsert_symbol(function("io.write", "write_file").with_documentation("write the cart"))
        .unwrap();
    store.remove_symbol(&"io.parse".into()).unwrap();
    let third = search.refresh(&store).await.unwrap();
    assert_eq!(third.embedded, 1);
    assert_eq!(third.purged, 1);
    assert_eq!(index.ids(), vec![SymbolId::from("io.write")]);
}

#[tokio::test]
async fn text_search_and_similar() {
    let store = GraphStore::new();
    store.upsert_symbol(function("io.parse", "parse_file")).unwrap();
    store.upsert_symbol(function("io.parse2", "parse_header")).unwrap();
    store.upsert_symbol(function("io.write", "write_file")).unwrap();

    let provider = Arc::new(KeywordProvider::new());
    let index = Arc::new(VectorIndex::flat(provider.embedding_dimension()).unwrap());
    let search = SemanticSearch::new(index, provider, 32).unwrap();
    search.refresh(&store).await.unwrap();

    let hits = search.search_text("how do we parse input", 2).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["io.parse", "io.parse2"]);

    let similar = search.similar_to(&"io.parse".into(), 5).unwrap();
    assert_eq!(similar[0].id.as_str(), "io.parse2");
    assert!(similar.iter().all(|h| h.id.as_str() != "io.parse"));

    assert!(matches!(
        search.similar_to(&"io.unknown".into(), 5),
        Err(CodeModelError::IndexUnavailable(_))
    ));
    assert!(matches!(
        search.search_text("   ", 5).await,
        Err(CodeModelError::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn provider_contract_violations_are_reported() {
    let index = Arc::new(VectorIndex::flat(2).unwrap());
    let search = SemanticSearch::new(index, Arc::new(ShortProvider), 8).unwrap();
    let err = search.embed_text("anything").await.unwrap_err();
    assert!(matches!(err, CodeModelError::Embedding(_)));

    let wrong_dimension = Arc::new(VectorIndex::flat(3).unwrap());
    assert!(matches!(
        SemanticSearch::new(wrong_dimension, Arc::new(ShortProvider), 8),
        Err(CodeModelError::DimensionMismatch { .. })
    ));
}
