use crate::{dot, normalize, VectorError};
use codemodel_core::{CodeModelError, IndexMode, Result, SearchConfig, SymbolId};
use dashmap::DashMap;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Above this many vectors an exact scan is split across the rayon pool.
const PARALLEL_SCAN_THRESHOLD: usize = 2048;
const MAX_HYPERPLANES: usize = 32;
const VECTOR_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Exact brute-force cosine scan
    Flat,
    /// Sign-random-projection buckets; candidates are re-ranked exactly
    Bucketed {
        hyperplanes: usize,
        probe_radius: usize,
        seed: u64,
    },
}

impl IndexKind {
    pub fn from_config(config: &SearchConfig) -> Self {
        match config.index {
            IndexMode::Flat => IndexKind::Flat,
            IndexMode::Bucketed => IndexKind::Bucketed {
                hyperplanes: config.hyperplanes,
                probe_radius: config.probe_radius,
                seed: config.seed,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
    pub id: SymbolId,
    pub score: f32,
}

#[derive(Debug, Clone)]
struct IndexedVector {
    /// Unit length
    vector: Arc<[f32]>,
    /// Hash of the text the vector was computed from, when known
    fingerprint: Option<String>,
    bucket: u32,
}

/// Cosine-similarity index keyed by symbol id.
///
/// Vectors are normalized on insert, so scoring is a dot product. Inserts and
/// removals are incremental; nothing is ever rebuilt.
pub struct VectorIndex {
    dimension: usize,
    kind: IndexKind,
    vectors: DashMap<SymbolId, IndexedVector>,
    hyperplanes: Vec<Vec<f32>>,
    buckets: DashMap<u32, BTreeSet<SymbolId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorSnapshot {
    format_version: u32,
    captured_at_ms: i64,
    dimension: usize,
    kind: IndexKind,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEntry {
    id: SymbolId,
    vector: Vec<f32>,
    fingerprint: Option<String>,
}

impl VectorIndex {
    pub fn new(dimension: usize, kind: IndexKind) -> Result<Self> {
        if dimension == 0 {
            return Err(CodeModelError::invalid_argument(
                "dimension",
                dimension,
                "must be greater than 0",
            ));
        }
        let hyperplanes = match kind {
            IndexKind::Flat => Vec::new(),
            IndexKind::Bucketed {
                hyperplanes, seed, ..
            } => {
                if hyperplanes == 0 || hyperplanes > MAX_HYPERPLANES {
                    return Err(CodeModelError::invalid_argument(
                        "hyperplanes",
                        hyperplanes,
                        format!("must be within 1..={}", MAX_HYPERPLANES),
                    ));
                }
                random_hyperplanes(hyperplanes, dimension, seed)
            }
        };

        Ok(Self {
            dimension,
            kind,
            vectors: DashMap::new(),
            hyperplanes,
            buckets: DashMap::new(),
        })
    }

    pub fn flat(dimension: usize) -> Result<Self> {
        Self::new(dimension, IndexKind::Flat)
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(config.dimension, IndexKind::from_config(config))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.vectors.contains_key(id)
    }

    /// Store or replace the vector of `id`.
    pub fn insert(&self, id: SymbolId, vector: &[f32]) -> Result<()> {
        self.insert_with_fingerprint(id, vector, None)
    }

    pub fn insert_with_fingerprint(
        &self,
        id: SymbolId,
        vector: &[f32],
        fingerprint: Option<String>,
    ) -> Result<()> {
        let unit = self.prepare(vector)?;
        let bucket = self.signature(&unit);

        // Bucket membership is updated while the entry's shard is held, so two
        // writers of the same id cannot interleave their bucket moves.
        let entry = self.vectors.entry(id.clone());
        if let dashmap::mapref::entry::Entry::Occupied(occupied) = &entry {
            let previous = occupied.get().bucket;
            if previous != bucket {
                self.leave_bucket(previous, &id);
            }
        }
        if !self.hyperplanes.is_empty() {
            self.buckets.entry(bucket).or_default().insert(id);
        }
        entry.insert(IndexedVector {
            vector: unit.into(),
            fingerprint,
            bucket,
        });
        Ok(())
    }

    pub fn remove(&self, id: &SymbolId) -> bool {
        // Same shard discipline as insert: leave the bucket before the entry goes
        match self.vectors.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                self.leave_bucket(occupied.get().bucket, id);
                occupied.remove();
                true
            }
            dashmap::mapref::entry::Entry::Vacant(_) => false,
        }
    }

    /// The stored (unit-length) vector of `id`.
    pub fn get(&self, id: &SymbolId) -> Result<Vec<f32>> {
        self.vectors
            .get(id)
            .map(|entry| entry.vector.to_vec())
            .ok_or_else(|| CodeModelError::IndexUnavailable(id.clone()))
    }

    /// Nearest neighbours of a stored vector, excluding `id` itself.
    pub fn similar_to(&self, id: &SymbolId, limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Err(CodeModelError::invalid_argument("limit", limit, "must be greater than 0"));
        }
        let vector = self.get(id)?;
        let mut hits = self.search(&vector, limit + 1)?;
        hits.retain(|hit| &hit.id != id);
        hits.truncate(limit);
        Ok(hits)
    }

    pub fn fingerprint(&self, id: &SymbolId) -> Option<String> {
        self.vectors.get(id).and_then(|entry| entry.fingerprint.clone())
    }

    pub fn ids(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.vectors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Drop every vector whose id fails `keep`. Returns the dropped ids, sorted.
    pub fn retain<F>(&self, keep: F) -> Vec<SymbolId>
    where
        F: Fn(&SymbolId) -> bool,
    {
        let dropped: Vec<SymbolId> = self.ids().into_iter().filter(|id| !keep(id)).collect();
        for id in &dropped {
            self.remove(id);
        }
        dropped
    }

    pub fn clear(&self) {
        self.vectors.clear();
        self.buckets.clear();
    }

    /// The `limit` most similar vectors, by descending score then ascending id.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Err(CodeModelError::invalid_argument(
                "limit",
                limit,
                "must be greater than 0",
            ));
        }
        let unit = self.prepare(query)?;

        let hits = match self.kind {
            IndexKind::Flat => self.exact_scan(&unit, limit),
            IndexKind::Bucketed { probe_radius, .. } => {
                let candidates = self.probe(&unit, probe_radius);
                if candidates.len() < limit {
                    debug!(
                        candidates = candidates.len(),
                        limit, "Too few bucket candidates, scanning exactly"
                    );
                    self.exact_scan(&unit, limit)
                } else {
                    let scored = candidates
                        .into_iter()
                        .filter_map(|id| {
                            let vector = self.vectors.get(&id)?.vector.clone();
                            Some(SearchHit {
                                score: dot(&unit, &vector),
                                id,
                            })
                        })
                        .collect();
                    top_k(scored, limit)
                }
            }
        };
        Ok(hits)
    }

    fn exact_scan(&self, unit: &[f32], limit: usize) -> Vec<SearchHit> {
        let entries: Vec<(SymbolId, Arc<[f32]>)> = self
            .vectors
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().vector)))
            .collect();

        let scored: Vec<SearchHit> = if entries.len() > PARALLEL_SCAN_THRESHOLD {
            entries
                .into_par_iter()
                .map(|(id, vector)| SearchHit {
                    score: dot(unit, &vector),
                    id,
                })
                .collect()
        } else {
            entries
                .into_iter()
                .map(|(id, vector)| SearchHit {
                    score: dot(unit, &vector),
                    id,
                })
                .collect()
        };
        top_k(scored, limit)
    }

    /// Ids in every bucket within Hamming distance `radius` of the query's bucket.
    fn probe(&self, unit: &[f32], radius: usize) -> BTreeSet<SymbolId> {
        let origin = self.signature(unit);
        let bits = self.hyperplanes.len();
        let mut signatures = vec![origin];
        if radius >= 1 {
            for i in 0..bits {
                signatures.push(origin ^ (1 << i));
            }
        }
        if radius >= 2 {
            for i in 0..bits {
                for j in (i + 1)..bits {
                    signatures.push(origin ^ (1 << i) ^ (1 << j));
                }
            }
        }

        let mut candidates = BTreeSet::new();
        for signature in signatures {
            if let Some(ids) = self.buckets.get(&signature) {
                candidates.extend(ids.iter().cloned());
            }
        }
        candidates
    }

    fn signature(&self, unit: &[f32]) -> u32 {
        self.hyperplanes
            .iter()
            .enumerate()
            .fold(0u32, |acc, (bit, plane)| {
                if dot(plane, unit) >= 0.0 {
                    acc | (1 << bit)
                } else {
                    acc
                }
            })
    }

    fn prepare(&self, vector: &[f32]) -> std::result::Result<Vec<f32>, VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        normalize(vector)
    }

    fn leave_bucket(&self, bucket: u32, id: &SymbolId) {
        if let Some(mut ids) = self.buckets.get_mut(&bucket) {
            ids.remove(id);
        }
        self.buckets.remove_if(&bucket, |_, ids| ids.is_empty());
    }

    // ---------------------------------------------------------------------
    // Snapshot / restore
    // ---------------------------------------------------------------------

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut entries: Vec<SnapshotEntry> = self
            .vectors
            .iter()
            .map(|entry| SnapshotEntry {
                id: entry.key().clone(),
                vector: entry.value().vector.to_vec(),
                fingerprint: entry.value().fingerprint.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let snapshot = VectorSnapshot {
            format_version: VECTOR_SNAPSHOT_VERSION,
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
            dimension: self.dimension,
            kind: self.kind,
            entries,
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e: bincode::error::EncodeError| VectorError::Snapshot(e.to_string()))?;
        info!(
            vectors = snapshot.entries.len(),
            bytes = bytes.len(),
            "Vector index snapshot captured"
        );
        Ok(bytes)
    }

    /// Replace the contents with a snapshot taken from an index of the same dimension.
    /// Every vector is checked before the current contents are dropped.
    pub fn restore(&self, bytes: &[u8]) -> Result<usize> {
        let snapshot = decode_snapshot(bytes)?;
        if snapshot.dimension != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: snapshot.dimension,
            }
            .into());
        }
        let mut prepared = Vec::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            let unit = self.prepare(&entry.vector)?;
            prepared.push((entry.id, unit, entry.fingerprint));
        }

        self.clear();
        let count = prepared.len();
        for (id, unit, fingerprint) in prepared {
            self.insert_with_fingerprint(id, &unit, fingerprint)?;
        }
        info!(vectors = count, "Vector index snapshot restored");
        Ok(count)
    }

    /// Rebuild an index, with the snapshot's own dimension and kind.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let snapshot = decode_snapshot(bytes)?;
        let index = Self::new(snapshot.dimension, snapshot.kind)?;
        index.restore(bytes)?;
        Ok(index)
    }
}

fn decode_snapshot(bytes: &[u8]) -> Result<VectorSnapshot> {
    let (snapshot, _): (VectorSnapshot, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e: bincode::error::DecodeError| VectorError::Snapshot(e.to_string()))?;
    if snapshot.format_version != VECTOR_SNAPSHOT_VERSION {
        return Err(VectorError::Snapshot(format!(
            "unsupported vector snapshot version {}",
            snapshot.format_version
        ))
        .into());
    }
    Ok(snapshot)
}

fn rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

fn top_k(mut scored: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    if scored.len() > limit {
        scored.select_nth_unstable_by(limit - 1, rank);
        scored.truncate(limit);
    }
    scored.sort_by(rank);
    scored
}

/// Gaussian hyperplanes from a seeded generator (Box-Muller), so the bucket
/// layout is identical across runs and restores.
fn random_hyperplanes(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| {
                    let u1 = rng.f64().max(f64::MIN_POSITIVE);
                    let u2 = rng.f64();
                    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()) as f32
                })
                .collect()
        })
        .collect()
}
