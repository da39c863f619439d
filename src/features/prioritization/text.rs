//! Tokenisation shared by the severity vectorizer and the TF-IDF matcher.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Two or more word characters, the bag-of-terms token pattern
    static ref TOKEN_REGEX: Regex = Regex::new(r"(?u)\b\w\w+\b").unwrap();
}

/// Lower-cased word tokens in order of appearance
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_REGEX
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Raw term counts for one document
pub fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Cosine similarity of two dense vectors; 0.0 when either is all zeros
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
