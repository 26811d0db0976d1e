use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

/// Term counts of one indexed document. `length` is always the sum of `terms`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocEntry {
    pub terms: HashMap<String, u32>,
    pub length: u32,
}

/// Posting list and corpus-wide occurrence count of one vocabulary term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermEntry {
    pub postings: BTreeSet<DocId>, // df == postings.len()
    pub occurrences: u64,
}

/// Inverted index over raw term counts.
///
/// The vocabulary only holds terms with a non-empty posting list, so a term
/// disappears exactly when its document frequency drops to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    docs: HashMap<DocId, DocEntry>,
    vocabulary: BTreeMap<String, TermEntry>,
    #[serde(skip)]
    avg_len: OnceLock<f64>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `terms` as the full content of `id`, replacing any prior version.
    pub fn add_document(&mut self, id: &str, terms: &[String]) {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }

        if let Some(previous) = self.docs.remove(id) {
            for (term, count) in &previous.terms {
                self.release(id, term, *count, !counts.contains_key(term));
            }
        }

        for (term, count) in &counts {
            let entry = self.vocabulary.entry(term.clone()).or_default();
            entry.occurrences += u64::from(*count);
            entry.postings.insert(id.to_string());
        }

        let length = counts.values().sum();
        self.docs.insert(id.to_string(), DocEntry { terms: counts, length });
        self.avg_len = OnceLock::new();
    }

    /// Returns false if `id` was not indexed.
    pub fn remove_document(&mut self, id: &str) -> bool {
        let Some(entry) = self.docs.remove(id) else {
            return false;
        };
        for (term, count) in &entry.terms {
            self.release(id, term, *count, true);
        }
        self.avg_len = OnceLock::new();
        true
    }

    fn release(&mut self, id: &str, term: &str, count: u32, unlink: bool) {
        let Some(entry) = self.vocabulary.get_mut(term) else {
            return;
        };
        entry.occurrences = entry.occurrences.saturating_sub(u64::from(count));
        if unlink {
            entry.postings.remove(id);
            if entry.postings.is_empty() {
                self.vocabulary.remove(term);
            }
        }
    }

    pub fn term_frequency(&self, id: &str, term: &str) -> u32 {
        self.docs
            .get(id)
            .and_then(|d| d.terms.get(term))
            .copied()
            .unwrap_or(0)
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.vocabulary.get(term).map_or(0, |e| e.postings.len())
    }

    /// Total occurrences of `term` across the corpus.
    pub fn occurrences(&self, term: &str) -> u64 {
        self.vocabulary.get(term).map_or(0, |e| e.occurrences)
    }

    /// Mean token count per document, recomputed on first access after a mutation.
    pub fn average_document_length(&self) -> f64 {
        *self.avg_len.get_or_init(|| {
            if self.docs.is_empty() {
                return 0.0;
            }
            let total: u64 = self.docs.values().map(|d| u64::from(d.length)).sum();
            total as f64 / self.docs.len() as f64
        })
    }

    pub fn postings(&self, term: &str) -> Option<&BTreeSet<DocId>> {
        self.vocabulary.get(term).map(|e| &e.postings)
    }

    pub fn document_length(&self, id: &str) -> Option<u32> {
        self.docs.get(id).map(|d| d.length)
    }

    pub fn document_terms(&self, id: &str) -> Option<&HashMap<String, u32>> {
        self.docs.get(id).map(|d| &d.terms)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &DocId> {
        self.docs.keys()
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn term_count(&self) -> usize {
        self.vocabulary.len()
    }

    /// Vocabulary in lexicographic order.
    pub fn terms(&self) -> impl Iterator<Item = (&String, &TermEntry)> {
        self.vocabulary.iter()
    }

    pub fn terms_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a TermEntry)> + 'a {
        self.vocabulary
            .range(prefix.to_string()..)
            .take_while(move |(term, _)| term.starts_with(prefix))
    }

    /// Rebuild vocabulary and statistics from the per-document counts.
    pub fn recompute_statistics(&mut self) {
        let mut vocabulary: BTreeMap<String, TermEntry> = BTreeMap::new();
        for (id, doc) in self.docs.iter_mut() {
            doc.terms.retain(|_, count| *count > 0);
            doc.length = doc.terms.values().sum();
            for (term, count) in &doc.terms {
                let entry = vocabulary.entry(term.clone()).or_default();
                entry.occurrences += u64::from(*count);
                entry.postings.insert(id.clone());
            }
        }
        self.vocabulary = vocabulary;
        self.avg_len = OnceLock::new();
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.vocabulary.clear();
        self.avg_len = OnceLock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn add_document_tracks_counts_and_df() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms(&["rust", "rust", "index"]));
        idx.add_document("d2", &terms(&["rust", "query"]));
        assert_eq!(idx.term_frequency("d1", "rust"), 2);
        assert_eq!(idx.term_frequency("d2", "index"), 0);
        assert_eq!(idx.document_frequency("rust"), 2);
        assert_eq!(idx.document_frequency("index"), 1);
        assert_eq!(idx.occurrences("rust"), 3);
        assert_eq!(idx.document_length("d1"), Some(3));
    }

    #[test]
    fn reindex_adjusts_df_by_one() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms(&["alpha", "beta"]));
        idx.add_document("d2", &terms(&["alpha"]));
        idx.add_document("d1", &terms(&["alpha", "gamma", "gamma"]));

        assert_eq!(idx.document_frequency("alpha"), 2);
        assert_eq!(idx.document_frequency("beta"), 0);
        assert_eq!(idx.document_frequency("gamma"), 1);
        assert_eq!(idx.occurrences("alpha"), 2);
        assert_eq!(idx.occurrences("gamma"), 2);
        assert!(idx.postings("beta").is_none());
        assert_eq!(idx.doc_count(), 2);
    }

    #[test]
    fn remove_document_drops_exclusive_terms() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms(&["hello", "world"]));
        idx.add_document("d2", &terms(&["hello", "rust"]));
        assert!(idx.remove_document("d1"));
        assert_eq!(idx.document_frequency("world"), 0);
        assert_eq!(idx.term_count(), 2);
        let postings: Vec<_> = idx.postings("hello").unwrap().iter().cloned().collect();
        assert_eq!(postings, vec!["d2".to_string()]);
        assert!(!idx.remove_document("d1"));
    }

    #[test]
    fn average_length_invalidated_on_mutation() {
        let mut idx = InvertedIndex::new();
        assert_eq!(idx.average_document_length(), 0.0);
        idx.add_document("d1", &terms(&["one", "two"]));
        assert_eq!(idx.average_document_length(), 2.0);
        idx.add_document("d2", &terms(&["one", "two", "three", "four"]));
        assert_eq!(idx.average_document_length(), 3.0);
        idx.remove_document("d1");
        assert_eq!(idx.average_document_length(), 4.0);
    }

    #[test]
    fn length_is_sum_of_counts() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms(&["aaa", "bbb", "aaa", "ccc", "aaa"]));
        let sum: u32 = idx.document_terms("d1").unwrap().values().sum();
        assert_eq!(idx.document_length("d1"), Some(sum));
    }

    #[test]
    fn prefix_iteration_is_bounded() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms(&["tea", "team", "tech", "ten", "zzz", "apple"]));
        let found: Vec<_> = idx.terms_with_prefix("te").map(|(t, _)| t.as_str()).collect();
        assert_eq!(found, vec!["tea", "team", "tech", "ten"]);
    }

    #[test]
    fn recompute_matches_incremental() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms(&["alpha", "beta", "beta"]));
        idx.add_document("d2", &terms(&["beta", "gamma"]));
        idx.add_document("d1", &terms(&["alpha"]));
        let before: Vec<(String, usize, u64)> = idx
            .terms()
            .map(|(t, e)| (t.clone(), e.postings.len(), e.occurrences))
            .collect();
        idx.recompute_statistics();
        let after: Vec<(String, usize, u64)> = idx
            .terms()
            .map(|(t, e)| (t.clone(), e.postings.len(), e.occurrences))
            .collect();
        assert_eq!(before, after);
    }
}
