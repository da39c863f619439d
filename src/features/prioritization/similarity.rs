//! Text similarity between a new report and existing issues.
//!
//! Two interchangeable backends sit behind [`SimilarityBackend`]:
//! a joint bag-of-terms TF-IDF space fitted per call, and dense semantic
//! embeddings. [`SimilarityMatcher`] applies the threshold and tie-break.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::prioritization::embedder::Embedder;
use crate::features::prioritization::text::{cosine, term_counts};

/// Minimum score for a live report to merge into an existing issue
pub const LIVE_MATCH_THRESHOLD: f64 = 0.75;

/// Minimum score for the offline duplicate scan
pub const BATCH_DUPLICATE_THRESHOLD: f64 = 0.8;

/// Embedding requests in flight per similarity call
const EMBED_CONCURRENCY: usize = 8;

/// Scores `query` against each candidate, in candidate order
#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    async fn scores(&self, query: &str, candidates: &[&str]) -> Result<Vec<f64>>;
}

/// TF-IDF fitted over `[query] + candidates` with smooth idf and l2 norm
#[derive(Debug, Clone, Copy, Default)]
pub struct TfidfSimilarity;

impl TfidfSimilarity {
    pub fn score_all(query: &str, candidates: &[&str]) -> Vec<f64> {
        let query_counts = term_counts(query);
        let candidate_counts: Vec<HashMap<String, usize>> =
            candidates.iter().map(|text| term_counts(text)).collect();
        let candidate_refs: Vec<&HashMap<String, usize>> = candidate_counts.iter().collect();
        Self::score_counts(&query_counts, &candidate_refs)
    }

    /// Same as [`Self::score_all`] over already tokenized documents
    pub fn score_counts(
        query: &HashMap<String, usize>,
        candidates: &[&HashMap<String, usize>],
    ) -> Vec<f64> {
        let docs: Vec<&HashMap<String, usize>> = std::iter::once(query)
            .chain(candidates.iter().copied())
            .collect();

        let n_docs = docs.len() as f64;
        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for term in doc.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let idf = |term: &str| -> f64 {
            let d = df.get(term).copied().unwrap_or(0) as f64;
            ((1.0 + n_docs) / (1.0 + d)).ln() + 1.0
        };

        let vectors: Vec<HashMap<&str, f64>> = docs
            .iter()
            .map(|doc| {
                let mut v: HashMap<&str, f64> = doc
                    .iter()
                    .map(|(term, count)| (term.as_str(), *count as f64 * idf(term)))
                    .collect();
                let norm = v.values().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    v.values_mut().for_each(|w| *w /= norm);
                }
                v
            })
            .collect();

        let Some((query_vec, candidate_vecs)) = vectors.split_first() else {
            return Vec::new();
        };
        candidate_vecs
            .iter()
            .map(|cand| {
                query_vec
                    .iter()
                    .filter_map(|(term, w)| cand.get(term).map(|c| w * c))
                    .sum::<f64>()
            })
            .collect()
    }
}

#[async_trait]
impl SimilarityBackend for TfidfSimilarity {
    async fn scores(&self, query: &str, candidates: &[&str]) -> Result<Vec<f64>> {
        Ok(Self::score_all(query, candidates))
    }
}

/// Cosine similarity of dense semantic embeddings
pub struct EmbeddingSimilarity {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingSimilarity {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl SimilarityBackend for EmbeddingSimilarity {
    async fn scores(&self, query: &str, candidates: &[&str]) -> Result<Vec<f64>> {
        // buffered keeps input order
        let texts = std::iter::once(query).chain(candidates.iter().copied());
        let vectors: Vec<Vec<f32>> = stream::iter(texts)
            .map(|text| self.embedder.embed(text))
            .boxed()
            .buffered(EMBED_CONCURRENCY)
            .try_collect()
            .await?;

        let Some((query_vec, candidate_vecs)) = vectors.split_first() else {
            return Ok(Vec::new());
        };
        Ok(candidate_vecs
            .iter()
            .map(|candidate_vec| cosine(query_vec, candidate_vec))
            .collect())
    }
}

/// Best candidate above a fixed threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatch {
    pub issue_id: Uuid,
    pub score: f64,
}

#[derive(Clone)]
pub struct SimilarityMatcher {
    backend: Arc<dyn SimilarityBackend>,
    threshold: f64,
}

impl SimilarityMatcher {
    pub fn new(backend: Arc<dyn SimilarityBackend>, threshold: f64) -> Self {
        Self { backend, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Highest-scoring candidate if it reaches the threshold. Ties go to the
    /// earliest candidate, so callers pass candidates in a stable order.
    pub async fn find_best_match(
        &self,
        new_text: &str,
        candidates: &[(Uuid, &str)],
    ) -> Result<Option<SimilarityMatch>> {
        if new_text.trim().is_empty() || candidates.is_empty() {
            return Ok(None);
        }

        let texts: Vec<&str> = candidates.iter().map(|(_, text)| *text).collect();
        let scores = self.backend.scores(new_text, &texts).await?;
        if scores.len() != candidates.len() {
            return Err(AppError::Internal(format!(
                "similarity backend returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }

        let mut best: Option<SimilarityMatch> = None;
        for ((issue_id, _), score) in candidates.iter().zip(scores) {
            match best {
                Some(b) if score <= b.score => {}
                _ => {
                    best = Some(SimilarityMatch {
                        issue_id: *issue_id,
                        score,
                    })
                }
            }
        }

        Ok(best.filter(|m| m.score >= self.threshold))
    }
}
