//! BM25 ranking over raw term counts.

use crate::index::InvertedIndex;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Length normalization.
    pub b: f64,
    /// Lower bound for idf. Terms present in more than half the corpus would
    /// otherwise get a negative weight.
    pub min_idf: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75, min_idf: 1e-4 }
    }
}

/// `ln((N - df + 0.5) / (df + 0.5))`, floored at `min_idf`.
pub fn idf(doc_count: usize, df: usize, params: &Bm25Params) -> f64 {
    let n = doc_count as f64;
    let df = df as f64;
    ((n - df + 0.5) / (df + 0.5)).ln().max(params.min_idf)
}

/// Contribution of one term with raw count `tf` to a document of `doc_len` tokens.
pub fn term_score(tf: u32, doc_len: u32, avgdl: f64, idf: f64, params: &Bm25Params) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = f64::from(tf);
    let ratio = if avgdl > 0.0 { f64::from(doc_len) / avgdl } else { 1.0 };
    let norm = params.k1 * (1.0 - params.b + params.b * ratio);
    idf * tf * (params.k1 + 1.0) / (tf + norm)
}

/// Score every document containing at least one query term.
pub fn bm25_scores(index: &InvertedIndex, terms: &[String], params: &Bm25Params) -> HashMap<DocId, f64> {
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    if index.doc_count() == 0 {
        return scores;
    }
    let n = index.doc_count();
    let avgdl = index.average_document_length();
    let unique: BTreeSet<&String> = terms.iter().collect();

    for term in unique {
        let Some(postings) = index.postings(term) else {
            continue;
        };
        let w = idf(n, postings.len(), params);
        for doc_id in postings {
            let tf = index.term_frequency(doc_id, term);
            let len = index.document_length(doc_id).unwrap_or(0);
            *scores.entry(doc_id.clone()).or_insert(0.0) += term_score(tf, len, avgdl, w, params);
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        let docs: &[(&str, &[&str])] = &[
            ("d1", &["rust", "program", "system", "fast"]),
            ("d2", &["python", "program", "script"]),
            ("d3", &["java", "enterprise", "program"]),
            ("d4", &["rust", "memory", "safety"]),
        ];
        for (id, words) in docs {
            let terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
            idx.add_document(id, &terms);
        }
        idx
    }

    #[test]
    fn idf_matches_formula_and_is_floored() {
        let p = Bm25Params::default();
        let expected = ((10.0 - 2.0 + 0.5) / (2.0 + 0.5) as f64).ln();
        assert!((idf(10, 2, &p) - expected).abs() < 1e-12);
        assert_eq!(idf(4, 3, &p), p.min_idf);
    }

    #[test]
    fn score_monotone_in_tf() {
        let p = Bm25Params::default();
        let w = idf(100, 5, &p);
        let mut last = 0.0;
        for tf in 0..50 {
            let s = term_score(tf, 20, 15.0, w, &p);
            assert!(s >= last, "tf={tf} score {s} < {last}");
            last = s;
        }
    }

    #[test]
    fn candidates_are_union_of_postings() {
        let idx = corpus();
        let terms = vec!["rust".to_string(), "python".to_string()];
        let scores = bm25_scores(&idx, &terms, &Bm25Params::default());
        let mut ids: Vec<_> = scores.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec!["d1", "d2", "d4"]);
        assert!(scores.values().all(|s| *s > 0.0));
    }

    #[test]
    fn shorter_document_scores_higher_for_same_tf() {
        let idx = corpus();
        let scores = bm25_scores(&idx, &["rust".to_string()], &Bm25Params::default());
        assert!(scores["d4"] > scores["d1"]);
    }

    #[test]
    fn empty_index_scores_nothing() {
        let idx = InvertedIndex::new();
        assert!(bm25_scores(&idx, &["rust".to_string()], &Bm25Params::default()).is_empty());
    }
}
