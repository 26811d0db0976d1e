//! Boolean and fuzzy retrieval plus the shared result ordering.
//!
//! Boolean scores are the summed raw counts of matched terms and fuzzy scores
//! are distance-weighted counts. Neither is comparable with BM25 scores from
//! [`crate::scoring`], and results from different modes must not be merged.

use crate::index::InvertedIndex;
use crate::tokenizer::Tokenizer;
use crate::DocId;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
    Not,
}

/// Flat left-to-right boolean query. No precedence and no grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanQuery {
    pub must: Vec<String>,
    pub should: Vec<String>,
    pub must_not: Vec<String>,
}

impl BooleanQuery {
    /// `AND`, `OR` and `NOT` (any case) set the group of the next word; the
    /// default is OR. A word directly followed by `AND` joins MUST as well.
    pub fn parse(text: &str, tokenizer: &Tokenizer) -> Self {
        let mut query = BooleanQuery::default();
        let mut op = Operator::Or;
        let mut last_should = 0usize;

        for word in text.split_whitespace() {
            match word.to_ascii_uppercase().as_str() {
                "AND" => {
                    let start = query.should.len() - last_should;
                    let promoted: Vec<String> = query.should.drain(start..).collect();
                    query.must.extend(promoted);
                    last_should = 0;
                    op = Operator::And;
                }
                "OR" => op = Operator::Or,
                "NOT" => op = Operator::Not,
                _ => {
                    let terms = tokenizer.tokenize(word);
                    last_should = 0;
                    match op {
                        Operator::And => query.must.extend(terms),
                        Operator::Not => query.must_not.extend(terms),
                        Operator::Or => {
                            last_should = terms.len();
                            query.should.extend(terms);
                        }
                    }
                    op = Operator::Or;
                }
            }
        }

        dedup(&mut query.must);
        dedup(&mut query.must_not);
        dedup(&mut query.should);
        let must = query.must.clone();
        query.should.retain(|t| !must.contains(t));
        query
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty()
    }

    /// Positive terms that contribute to the score.
    pub fn scoring_terms(&self) -> impl Iterator<Item = &String> {
        self.must.iter().chain(self.should.iter())
    }

    /// (MUST intersection, or SHOULD union when MUST is empty) minus the MUST_NOT union.
    pub fn evaluate(&self, index: &InvertedIndex) -> HashMap<DocId, f64> {
        let mut matched: BTreeSet<DocId> = if !self.must.is_empty() {
            let mut sets = self.must.iter().map(|t| index.postings(t));
            let first = match sets.next().flatten() {
                Some(p) => p.clone(),
                None => BTreeSet::new(),
            };
            sets.fold(first, |acc, postings| match postings {
                Some(p) => acc.intersection(p).cloned().collect(),
                None => BTreeSet::new(),
            })
        } else {
            self.should
                .iter()
                .filter_map(|t| index.postings(t))
                .flat_map(|p| p.iter().cloned())
                .collect()
        };

        for term in &self.must_not {
            if let Some(postings) = index.postings(term) {
                matched.retain(|id| !postings.contains(id));
            }
        }

        matched
            .into_iter()
            .map(|id| {
                let score: u32 = self.scoring_terms().map(|t| index.term_frequency(&id, t)).sum();
                (id, f64::from(score))
            })
            .collect()
    }
}

fn dedup(terms: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    terms.retain(|t| seen.insert(t.clone()));
}

/// Deadline and cancellation signal for long-running searches.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Some(Instant::now() + timeout), cancel: None }
    }

    pub fn deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(at);
        self
    }

    /// Abort once `flag` is set by another thread.
    pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FuzzyOutcome {
    pub scores: HashMap<DocId, f64>,
    /// Vocabulary terms that matched some query term.
    pub matched_terms: BTreeSet<String>,
    pub aborted: bool,
}

/// Compare every query term with every vocabulary term. O(query × vocabulary).
///
/// A document matches when any of its terms is within `max_distance` of a
/// query term and accumulates `(1 - d / max_distance) * tf` per matching pair.
/// The budget is polled every `check_interval` comparisons; on exhaustion the
/// scores gathered so far are returned with `aborted` set.
pub fn fuzzy_scores(
    index: &InvertedIndex,
    terms: &[String],
    max_distance: usize,
    budget: &SearchBudget,
    check_interval: usize,
) -> FuzzyOutcome {
    let mut outcome = FuzzyOutcome::default();
    let interval = check_interval.max(1);
    let unique: BTreeSet<&String> = terms.iter().collect();
    let mut compared = 0usize;

    'outer: for query in unique {
        let query_len = query.chars().count();
        for (term, entry) in index.terms() {
            if compared % interval == 0 && budget.is_exhausted() {
                outcome.aborted = true;
                break 'outer;
            }
            compared += 1;

            if term.chars().count().abs_diff(query_len) > max_distance {
                continue;
            }
            let distance = edit_distance(query, term);
            if distance > max_distance {
                continue;
            }
            let weight = if max_distance == 0 { 1.0 } else { 1.0 - distance as f64 / max_distance as f64 };
            outcome.matched_terms.insert(term.clone());
            for id in &entry.postings {
                let tf = f64::from(index.term_frequency(id, term));
                *outcome.scores.entry(id.clone()).or_insert(0.0) += weight * tf;
            }
        }
    }
    outcome
}

/// Optimal string alignment distance: insertions, deletions, substitutions and
/// adjacent transpositions each cost one.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut before: Vec<usize> = vec![0; n + 1];
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                curr[j] = curr[j].min(before[j - 2] + 1);
            }
        }
        std::mem::swap(&mut before, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Descending score, ties broken by ascending document id.
pub fn sort_scored(scores: HashMap<DocId, f64>) -> Vec<(DocId, f64)> {
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
