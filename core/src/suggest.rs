use crate::index::InvertedIndex;
use std::cmp::Reverse;

/// Up to `limit` vocabulary terms starting with `prefix`, most frequent first,
/// ties in ascending lexicographic order.
///
/// The vocabulary spans every tenant; see [`suggest_within`] for a scoped lookup.
pub fn suggest(index: &InvertedIndex, prefix: &str, limit: usize) -> Vec<String> {
    let Some(prefix) = clean_prefix(prefix, limit) else {
        return Vec::new();
    };
    let candidates = index
        .terms_with_prefix(&prefix)
        .map(|(term, entry)| (term, entry.occurrences))
        .collect();
    rank(candidates, limit)
}

/// Like [`suggest`], but only documents accepted by `keep` contribute terms
/// and occurrence counts.
pub fn suggest_within<F>(index: &InvertedIndex, prefix: &str, limit: usize, keep: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let Some(prefix) = clean_prefix(prefix, limit) else {
        return Vec::new();
    };
    let candidates = index
        .terms_with_prefix(&prefix)
        .filter_map(|(term, entry)| {
            let occurrences: u64 = entry
                .postings
                .iter()
                .filter(|id| keep(id))
                .map(|id| u64::from(index.term_frequency(id, term)))
                .sum();
            (occurrences > 0).then_some((term, occurrences))
        })
        .collect();
    rank(candidates, limit)
}

fn clean_prefix(prefix: &str, limit: usize) -> Option<String> {
    let prefix = prefix.trim().to_lowercase();
    (!prefix.is_empty() && limit > 0).then_some(prefix)
}

fn rank(mut candidates: Vec<(&String, u64)>, limit: usize) -> Vec<String> {
    // Vocabulary iteration is already lexicographic, so a stable sort keeps ties ordered.
    candidates.sort_by_key(|(_, occurrences)| Reverse(*occurrences));
    candidates.into_iter().take(limit).map(|(term, _)| term.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary(counts: &[(&str, usize)]) -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        for (i, (term, count)) in counts.iter().enumerate() {
            let terms = vec![term.to_string(); *count];
            idx.add_document(&format!("d{i}"), &terms);
        }
        idx
    }

    #[test]
    fn orders_by_frequency_then_term() {
        let idx = vocabulary(&[("test", 10), ("team", 5), ("tech", 3), ("ten", 1), ("zzz", 1)]);
        assert_eq!(suggest(&idx, "te", 5), vec!["test", "team", "tech", "ten"]);
        assert_eq!(suggest(&idx, "te", 2), vec!["test", "team"]);
    }

    #[test]
    fn ties_are_lexicographic() {
        let idx = vocabulary(&[("tent", 2), ("tend", 2), ("tea", 2)]);
        assert_eq!(suggest(&idx, "TE", 10), vec!["tea", "tend", "tent"]);
    }

    #[test]
    fn scoped_lookup_counts_only_kept_documents() {
        // d0: test x10, d1: team x5, d2: tech x3
        let idx = vocabulary(&[("test", 10), ("team", 5), ("tech", 3)]);
        let mine = |id: &str| id != "d0";
        assert_eq!(suggest_within(&idx, "te", 5, mine), vec!["team", "tech"]);
        assert!(suggest_within(&idx, "te", 5, |_| false).is_empty());
        assert_eq!(suggest_within(&idx, "te", 5, |_| true), suggest(&idx, "te", 5));
    }

    #[test]
    fn empty_prefix_or_no_match() {
        let idx = vocabulary(&[("test", 1)]);
        assert!(suggest(&idx, "", 5).is_empty());
        assert!(suggest(&idx, "xy", 5).is_empty());
    }
}
