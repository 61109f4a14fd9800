//! In-memory form of a built index and exact nearest-neighbor search over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::filter::SearchFilter;

/// On-disk layout version written into every manifest.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// Euclidean distance mapped to `1 / (1 + d)` so that higher is closer.
    L2,
}

impl Metric {
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::L2 => {
                let dist = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(IndexError::InvalidConfig(format!("unknown metric: {other}"))),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub file_name: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub chunk_index: usize,
    /// Byte range of the chunk in the loaded document text.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Embedding model identifier every vector was produced with.
    pub model: String,
    /// Vector length; 0 for an index with no entries.
    pub dimension: usize,
    pub metric: Metric,
    pub entry_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Everything a build hands to [`IndexStore::rebuild`](crate::store::IndexStore::rebuild).
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub model: String,
    pub metric: Metric,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Immutable set of entries sharing one model, dimension and metric.
#[derive(Debug, Clone)]
pub struct Index {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Validate a snapshot and stamp a fresh manifest.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if vectors differ in length and
    /// [`IndexError::NonFiniteVector`] if any component is NaN or infinite.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self, IndexError> {
        let dimension = snapshot.entries.first().map_or(0, |e| e.vector.len());
        for (pos, entry) in snapshot.entries.iter().enumerate() {
            if entry.vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.vector.len(),
                });
            }
            if !entry.vector.iter().all(|x| x.is_finite()) {
                return Err(IndexError::NonFiniteVector(pos));
            }
        }
        Ok(Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                model: snapshot.model,
                dimension,
                metric: snapshot.metric,
                entry_count: snapshot.entries.len(),
                created_at: Utc::now(),
            },
            entries: snapshot.entries,
        })
    }

    /// Assemble from already-validated parts (see the store implementations).
    pub(crate) fn from_parts(manifest: IndexManifest, entries: Vec<IndexEntry>) -> Self {
        Self { manifest, entries }
    }

    #[must_use]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.manifest.model
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.manifest.metric
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact top-`k` search: every entry passing `filter` is scored against `query`.
    ///
    /// Hits are ordered by descending score; equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidK`] for `k == 0` and [`IndexError::DimensionMismatch`]
    /// when `query` does not have the index dimension.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.manifest.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.dimension,
                actual: query.len(),
            });
        }

        let metric = self.manifest.metric;
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.is_none_or(|f| f.matches(&e.metadata)))
            .map(|(i, e)| (i, metric.score(query, &e.vector)))
            .collect();

        // Stable: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let entry = &self.entries[i];
                SearchHit {
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    score,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FieldCondition;

    fn entry(text: &str, vector: Vec<f32>, file_name: &str) -> IndexEntry {
        IndexEntry {
            vector,
            text: text.into(),
            metadata: ChunkMetadata {
                source: format!("/docs/{file_name}"),
                file_name: file_name.into(),
                content_type: "text/plain".into(),
                page: None,
                chunk_index: 0,
                start: 0,
                end: text.len(),
            },
        }
    }

    fn index(metric: Metric, entries: Vec<IndexEntry>) -> Index {
        Index::from_snapshot(IndexSnapshot {
            model: "m".into(),
            metric,
            entries,
        })
        .unwrap()
    }

    fn sample() -> Index {
        index(
            Metric::Cosine,
            vec![
                entry("x", vec![1.0, 0.0], "x.txt"),
                entry("y", vec![0.0, 1.0], "y.txt"),
                entry("xy", vec![1.0, 1.0], "xy.txt"),
            ],
        )
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < f32::EPSILON);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn l2_score_is_inverse_distance() {
        assert!((Metric::L2.score(&[0.0, 0.0], &[3.0, 4.0]) - 1.0 / 6.0).abs() < 1e-6);
        assert!((Metric::L2.score(&[1.0], &[1.0]) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn metric_parses() {
        assert_eq!("Cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert!("dot".parse::<Metric>().is_err());
    }

    #[test]
    fn search_orders_by_score() {
        let hits = sample().search(&[1.0, 0.1], 3, None).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["x", "xy", "y"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn search_truncates_to_k() {
        assert_eq!(sample().search(&[1.0, 0.0], 2, None).unwrap().len(), 2);
        assert_eq!(sample().search(&[1.0, 0.0], 50, None).unwrap().len(), 3);
    }

    #[test]
    fn zero_k_is_invalid() {
        assert!(matches!(
            sample().search(&[1.0, 0.0], 0, None),
            Err(IndexError::InvalidK)
        ));
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = index(Metric::Cosine, Vec::new());
        assert_eq!(idx.dimension(), 0);
        assert!(idx.search(&[1.0, 2.0, 3.0], 5, None).unwrap().is_empty());
        assert!(matches!(
            idx.search(&[1.0], 0, None),
            Err(IndexError::InvalidK)
        ));
    }

    #[test]
    fn wrong_query_dimension() {
        assert!(matches!(
            sample().search(&[1.0, 0.0, 0.0], 1, None),
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let idx = index(
            Metric::Cosine,
            vec![
                entry("first", vec![1.0, 0.0], "a.txt"),
                entry("second", vec![2.0, 0.0], "b.txt"),
                entry("third", vec![3.0, 0.0], "c.txt"),
            ],
        );
        let hits = idx.search(&[1.0, 0.0], 3, None).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn filter_applies_before_truncation() {
        let filter = SearchFilter::default().must(FieldCondition::text("file_name", "y.txt"));
        let hits = sample().search(&[1.0, 0.0], 1, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "y");
    }

    #[test]
    fn l2_ranks_nearest_first() {
        let idx = index(
            Metric::L2,
            vec![
                entry("far", vec![10.0, 10.0], "far.txt"),
                entry("near", vec![1.0, 1.0], "near.txt"),
            ],
        );
        let hits = idx.search(&[0.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].text, "near");
    }

    #[test]
    fn snapshot_rejects_mixed_dimensions() {
        let err = Index::from_snapshot(IndexSnapshot {
            model: "m".into(),
            metric: Metric::Cosine,
            entries: vec![
                entry("a", vec![1.0, 0.0], "a.txt"),
                entry("b", vec![1.0], "b.txt"),
            ],
        })
        .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn snapshot_rejects_nan() {
        let err = Index::from_snapshot(IndexSnapshot {
            model: "m".into(),
            metric: Metric::Cosine,
            entries: vec![entry("a", vec![f32::NAN, 0.0], "a.txt")],
        })
        .unwrap_err();
        assert!(matches!(err, IndexError::NonFiniteVector(0)));
    }

    mod proptest_search {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn results_bounded_and_sorted(
                vectors in proptest::collection::vec(
                    proptest::collection::vec(-10.0f32..10.0, 4),
                    0..40,
                ),
                query in proptest::collection::vec(-10.0f32..10.0, 4),
                k in 1usize..20,
            ) {
                let entries = vectors
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| entry(&i.to_string(), v, "p.txt"))
                    .collect();
                let idx = index(Metric::Cosine, entries);
                let hits = idx.search(&query, k, None).unwrap();
                prop_assert!(hits.len() <= k);
                prop_assert!(hits.len() <= idx.len());
                prop_assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
            }
        }
    }
}
