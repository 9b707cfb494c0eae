use crate::{SearchHit, VectorError, VectorIndex};
use codemodel_core::{CodeModelError, EmbeddingProvider, Result, Symbol, SymbolId};
use codemodel_graph::GraphStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub embedded: usize,
    pub unchanged: usize,
    pub purged: usize,
    pub batches: usize,
}

/// Semantic search over the vector index, with the embedding generator injected
/// at construction and shared read-only afterwards.
#[derive(Clone)]
pub struct SemanticSearch {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl SemanticSearch {
    pub fn new(
        index: Arc<VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self> {
        if provider.embedding_dimension() != index.dimension() {
            return Err(VectorError::DimensionMismatch {
                expected: index.dimension(),
                actual: provider.embedding_dimension(),
            }
            .into());
        }
        Ok(Self {
            index,
            provider,
            batch_size: batch_size.max(1),
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or(VectorError::BatchSizeMismatch {
                expected: 1,
                actual: 0,
            })
            .map_err(CodeModelError::from)
    }

    /// One provider call; the result must hold one vector of the index
    /// dimension per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.provider.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(VectorError::BatchSizeMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            }
            .into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.index.dimension()) {
            return Err(VectorError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: bad.len(),
            }
            .into());
        }
        Ok(vectors)
    }

    pub async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(CodeModelError::invalid_argument(
                "query",
                query,
                "query text must not be empty",
            ));
        }
        if limit == 0 {
            return Err(CodeModelError::invalid_argument("limit", limit, "must be greater than 0"));
        }
        let vector = self.embed_text(query).await?;
        let hits = self.index.search(&vector, limit)?;
        debug!(query, limit, hits = hits.len(), "Semantic search complete");
        Ok(hits)
    }

    /// Nearest neighbours of an already-embedded symbol, excluding the symbol itself.
    pub fn similar_to(&self, id: &SymbolId, limit: usize) -> Result<Vec<SearchHit>> {
        self.index.similar_to(id, limit)
    }

    /// Bring the index in line with the graph: embed symbols whose text changed
    /// or that have no vector yet, and drop vectors of symbols that are gone.
    pub async fn refresh(&self, store: &GraphStore) -> Result<RefreshStats> {
        let mut stats = RefreshStats::default();

        let mut pending: Vec<(SymbolId, String, String)> = Vec::new();
        for symbol in store.symbols() {
            let text = embedding_text(&symbol);
            let digest = fingerprint(&text);
            if self.index.fingerprint(&symbol.id).as_deref() == Some(digest.as_str()) {
                stats.unchanged += 1;
            } else {
                pending.push((symbol.id.clone(), text, digest));
            }
        }

        for chunk in pending.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|(_, text, _)| text.clone()).collect();
            let vectors = self.embed_batch(&texts).await?;
            for ((id, _, digest), vector) in chunk.iter().zip(vectors) {
                self.index
                    .insert_with_fingerprint(id.clone(), &vector, Some(digest.clone()))?;
                // The symbol may have been removed while the batch was embedding
                if !store.contains(id) {
                    self.index.remove(id);
                } else {
                    stats.embedded += 1;
                }
            }
            stats.batches += 1;
        }

        stats.purged = self.index.retain(|id| store.contains(id)).len();

        info!(
            provider = self.provider_name(),
            embedded = stats.embedded,
            unchanged = stats.unchanged,
            purged = stats.purged,
            batches = stats.batches,
            "Embedding refresh complete"
        );
        Ok(stats)
    }
}

/// Text a symbol is embedded from: kind, name, owning module, signature and
/// documentation.
pub fn embedding_text(symbol: &Symbol) -> String {
    let mut text = format!("{} {}", symbol.kind, symbol.name);
    if !symbol.module.is_empty() {
        text.push_str(" in ");
        text.push_str(&symbol.module);
    }
    if let Some(signature) = &symbol.signature {
        text.push('\n');
        text.push_str(signature);
    }
    if let Some(documentation) = &symbol.documentation {
        text.push('\n');
        text.push_str(documentation);
    }
    text
}

/// Hex SHA-256 of `text`.
pub fn fingerprint(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemodel_core::{Location, SymbolKind};

    #[test]
    fn test_embedding_text_includes_docs() {
        let symbol = Symbol::new("p", "parse_file", SymbolKind::Function, Location::new("io.py", 1, 9))
            .with_module("io")
            .with_signature("def parse_file(path)")
            .with_documentation("Parse a source file");
        let text = embedding_text(&symbol);
        assert!(text.starts_with("function parse_file in io"));
        assert!(text.contains("Parse a source file"));
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint("hello");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint("hello"));
        assert_ne!(a, fingerprint("hello!"));
    }
}
