//! Near-duplicate detection over normalized page text.
//!
//! Each page becomes a set of contiguous k-word shingles; every unordered pair
//! of pages is scored with the Jaccard index of their sets. Pairing is
//! quadratic in the number of pages.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DEFAULT_SHINGLE_SIZE: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
/// Above this many pages the pairwise pass is logged as expensive.
pub const LARGE_INPUT_PAGES: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityPair {
    pub url_a: String,
    pub url_b: String,
    pub jaccard_score: f64,
}

/// Contiguous `size`-word sequences of `text`. Text shorter than `size`
/// words has no shingles.
pub fn shingles(text: &str, size: usize) -> HashSet<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if size == 0 || words.len() < size {
        return HashSet::new();
    }
    words.windows(size).map(|w| w.join(" ")).collect()
}

/// |A ∩ B| / |A ∪ B|. Two empty sets score 1.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|s| large.contains(*s)).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

#[derive(Debug, Clone)]
pub struct ContentSimilarityDetector {
    shingle_size: usize,
    threshold: f64,
    min_shingles: usize,
}

impl Default for ContentSimilarityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSimilarityDetector {
    pub fn new() -> Self {
        Self {
            shingle_size: DEFAULT_SHINGLE_SIZE,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_shingles: 0,
        }
    }

    pub fn with_shingle_size(mut self, size: usize) -> Self {
        self.shingle_size = size.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_shingles(mut self, min_shingles: usize) -> Self {
        self.min_shingles = min_shingles;
        self
    }

    /// Score every unordered pair of `(url, normalized_text)` pages and keep
    /// those at or above the threshold, in input order.
    pub fn detect(&self, pages: &[(&str, &str)]) -> Vec<SimilarityPair> {
        if pages.len() > LARGE_INPUT_PAGES {
            warn!(
                "Pairwise similarity over {} pages ({} comparisons)",
                pages.len(),
                pages.len() * (pages.len() - 1) / 2
            );
        }

        let sets: Vec<(&str, HashSet<String>)> = pages
            .iter()
            .map(|(url, text)| (*url, shingles(text, self.shingle_size)))
            .filter(|(url, set)| {
                let keep = set.len() >= self.min_shingles;
                if !keep {
                    debug!("{} has {} shingles, below minimum", url, set.len());
                }
                keep
            })
            .collect();

        let mut pairs = Vec::new();
        for (i, (url_a, a)) in sets.iter().enumerate() {
            for (url_b, b) in &sets[i + 1..] {
                let score = jaccard(a, b);
                if score >= self.threshold {
                    pairs.push(SimilarityPair {
                        url_a: url_a.to_string(),
                        url_b: url_b.to_string(),
                        jaccard_score: score,
                    });
                }
            }
        }
        pairs
    }
}
