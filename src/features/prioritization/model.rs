//! Pre-trained severity model: a TF-IDF vectorizer and a linear classifier.
//!
//! Both artifacts are exported from the offline training pipeline as JSON:
//!
//! - `tfidf_vectorizer.json`: `{ "vocabulary": {term: index}, "idf": [..],
//!   "stop_words": [..], "sublinear_tf": false }`
//! - `severity_model.json`: `{ "classes": [0, 1, 2], "coef": [[..], ..],
//!   "intercept": [..] }`
//!
//! Artifacts are loaded lazily on first use, exactly once, and are read-only
//! afterwards. A load failure is cached: the service cannot score any issue
//! without the model, so the binary forces the load at startup.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::core::error::{AppError, Result};
use crate::features::prioritization::text::term_counts;

pub const VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
pub const CLASSIFIER_FILE: &str = "severity_model.json";

/// Sparse feature vector as sorted `(feature index, weight)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector(pub Vec<(usize, f64)>);

/// Stable predict interface over the pre-trained artifacts
pub trait SeverityModel: Send + Sync {
    fn vectorize(&self, text: &str) -> Result<FeatureVector>;

    /// Raw class label in the model's own output domain
    fn predict(&self, features: &FeatureVector) -> Result<i64>;
}

#[derive(Debug, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    #[serde(default)]
    stop_words: HashSet<String>,
    #[serde(default)]
    sublinear_tf: bool,
}

impl TfidfVectorizer {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some((term, idx)) = self.vocabulary.iter().find(|(_, idx)| **idx >= self.idf.len()) {
            return Err(format!(
                "vocabulary term '{}' has index {} but idf has {} entries",
                term,
                idx,
                self.idf.len()
            ));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// tf * idf, l2-normalised; unknown terms and stop words are dropped
    pub fn transform(&self, text: &str) -> FeatureVector {
        let mut weights: Vec<(usize, f64)> = term_counts(text)
            .into_iter()
            .filter(|(term, _)| !self.stop_words.contains(term))
            .filter_map(|(term, count)| {
                let idx = *self.vocabulary.get(&term)?;
                let tf = if self.sublinear_tf {
                    1.0 + (count as f64).ln()
                } else {
                    count as f64
                };
                Some((idx, tf * self.idf[idx]))
            })
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in weights.iter_mut() {
                *w /= norm;
            }
        }
        weights.sort_by_key(|(idx, _)| *idx);
        FeatureVector(weights)
    }
}

/// One-vs-rest linear classifier: argmax over `coef . x + intercept`
#[derive(Debug, Deserialize)]
pub struct LinearClassifier {
    classes: Vec<i64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
}

impl LinearClassifier {
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.classes.is_empty() {
            return Err("classifier has no classes".to_string());
        }
        if self.coef.len() != self.classes.len() || self.intercept.len() != self.classes.len() {
            return Err(format!(
                "classifier shape mismatch: {} classes, {} coef rows, {} intercepts",
                self.classes.len(),
                self.coef.len(),
                self.intercept.len()
            ));
        }
        if let Some(row) = self.coef.iter().find(|row| row.len() != n_features) {
            return Err(format!(
                "classifier expects {} features but vectorizer produces {}",
                row.len(),
                n_features
            ));
        }
        Ok(())
    }

    pub fn predict(&self, features: &FeatureVector) -> i64 {
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (k, (row, bias)) in self.coef.iter().zip(&self.intercept).enumerate() {
            let score = bias
                + features
                    .0
                    .iter()
                    .map(|(idx, w)| row.get(*idx).copied().unwrap_or(0.0) * w)
                    .sum::<f64>();
            // Strict comparison keeps the first class on ties
            if score > best_score {
                best = k;
                best_score = score;
            }
        }
        self.classes[best]
    }
}

struct LoadedArtifacts {
    vectorizer: TfidfVectorizer,
    classifier: LinearClassifier,
}

/// Severity model backed by artifact files, loaded once and cached
pub struct ArtifactSeverityModel {
    dir: PathBuf,
    artifacts: OnceLock<std::result::Result<LoadedArtifacts, String>>,
}

impl ArtifactSeverityModel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            artifacts: OnceLock::new(),
        }
    }

    /// Force the one-time load; used at startup so a missing model is fatal early
    pub fn ensure_loaded(&self) -> Result<()> {
        self.artifacts().map(|_| ())
    }

    fn artifacts(&self) -> Result<&LoadedArtifacts> {
        self.artifacts
            .get_or_init(|| {
                let loaded = load_artifacts(&self.dir);
                match &loaded {
                    Ok(a) => tracing::info!(
                        dir = %self.dir.display(),
                        features = a.vectorizer.n_features(),
                        classes = a.classifier.classes.len(),
                        "Severity model artifacts loaded"
                    ),
                    Err(e) => tracing::error!(
                        dir = %self.dir.display(),
                        "Failed to load severity model artifacts: {}",
                        e
                    ),
                }
                loaded
            })
            .as_ref()
            .map_err(|e| AppError::ArtifactLoad(e.clone()))
    }
}

impl SeverityModel for ArtifactSeverityModel {
    fn vectorize(&self, text: &str) -> Result<FeatureVector> {
        Ok(self.artifacts()?.vectorizer.transform(text))
    }

    fn predict(&self, features: &FeatureVector) -> Result<i64> {
        Ok(self.artifacts()?.classifier.predict(features))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> std::result::Result<T, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("corrupt artifact {}: {}", path.display(), e))
}

fn load_artifacts(dir: &Path) -> std::result::Result<LoadedArtifacts, String> {
    let vectorizer: TfidfVectorizer = read_json(&dir.join(VECTORIZER_FILE))?;
    vectorizer.validate()?;
    let classifier: LinearClassifier = read_json(&dir.join(CLASSIFIER_FILE))?;
    classifier.validate(vectorizer.n_features())?;
    Ok(LoadedArtifacts {
        vectorizer,
        classifier,
    })
}
