use crate::tokenizer::Tokenizer;
use std::collections::HashSet;

pub const ELLIPSIS: &str = "…";
pub const EM_OPEN: &str = "<em>";
pub const EM_CLOSE: &str = "</em>";

/// Picks the densest fixed-size window of query-term hits from a document.
#[derive(Debug, Clone)]
pub struct Highlighter {
    tokenizer: Tokenizer,
    window: usize,
}

impl Highlighter {
    pub fn new(tokenizer: Tokenizer, window: usize) -> Self {
        Self { tokenizer, window: window.max(1) }
    }

    /// Empty when no content is available.
    ///
    /// The window spans `window` index tokens; the snippet shows the original
    /// words they came from, with words whose term is a query term wrapped in
    /// emphasis markers.
    pub fn snippet(&self, content: Option<&str>, query_terms: &HashSet<String>) -> String {
        let Some(content) = content else {
            return String::new();
        };
        let words: Vec<&str> = content.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }

        // (word index, is hit) for every word that survives tokenization
        let tokens: Vec<(usize, bool)> = words
            .iter()
            .enumerate()
            .filter_map(|(i, w)| self.tokenizer.normalize_word(w).map(|t| (i, query_terms.contains(&t))))
            .collect();

        let (first_word, last_word) = if tokens.is_empty() {
            (0, words.len().min(self.window) - 1)
        } else {
            let start = best_window(&tokens, self.window);
            let end = (start + self.window).min(tokens.len()) - 1;
            (tokens[start].0, tokens[end].0)
        };

        let hits: HashSet<usize> = tokens.iter().filter(|(_, hit)| *hit).map(|(i, _)| *i).collect();
        let body: Vec<String> = (first_word..=last_word)
            .map(|i| {
                if hits.contains(&i) {
                    format!("{EM_OPEN}{}{EM_CLOSE}", words[i])
                } else {
                    words[i].to_string()
                }
            })
            .collect();

        format!("{ELLIPSIS}{}{ELLIPSIS}", body.join(" "))
    }
}

/// Start of the first window with the most hits.
fn best_window(tokens: &[(usize, bool)], window: usize) -> usize {
    let width = window.min(tokens.len());
    let mut count = tokens[..width].iter().filter(|(_, hit)| *hit).count();
    let (mut best, mut best_count) = (0, count);
    for start in 1..=(tokens.len() - width) {
        if tokens[start - 1].1 {
            count -= 1;
        }
        if tokens[start + width - 1].1 {
            count += 1;
        }
        if count > best_count {
            best = start;
            best_count = count;
        }
    }
    best
}
