//! Fuzzy string comparison on a 0–100 scale.
//!
//! Similarity is a normalized Levenshtein ratio over lowercased text.
//! Callers compare against thresholds in the 80–90 range (reference-list
//! title matching, arXiv search verification).

use strsim::normalized_levenshtein;

/// Similarity between two strings as a 0–100 score, ignoring case.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase()) * 100.0
}

/// True when the two strings are at least `threshold` similar (0–100).
pub fn almost_matching(a: &str, b: &str, threshold: f64) -> bool {
    similarity_ratio(a, b) >= threshold
}
