use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer as Snowball};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// Shortest token kept, in characters.
pub const MIN_TOKEN_CHARS: usize = 3;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid regex");
    static ref SUFFIX: Regex =
        Regex::new(r"^(.+?)(?:ing|ed|es|s|ly|tion|ment|ness|ful|less)$").expect("valid regex");
    static ref SNOWBALL: Snowball = Snowball::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        // Punctuation is stripped before lookup, so contractions appear without apostrophes.
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","arent","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cant","cannot","could","couldnt",
            "did","didnt","do","does","doesnt","doing","dont","down","during",
            "each","few","for","from","further",
            "had","hadnt","has","hasnt","have","havent","having","he","hed","hell",
            "hes","her","here","heres","hers","herself","him","himself","his","how","hows",
            "i","id","ill","im","ive","if","in","into","is","isnt","it","its","itself",
            "lets","me","more","most","mustnt","my","myself",
            "no","nor","not","of","off","on","once","only",
            "or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","shed","shell","shes","should","shouldnt","so","some","such",
            "than","that","thats","the","their","theirs","them","themselves","then","there","theres",
            "these","they","theyd","theyll","theyre","theyve","this","those","through","to","too",
            "under","until","up","very",
            "was","wasnt","we","wed","well","were","weve","werent","what","whats","when","whens",
            "where","wheres","which","while","who","whos","whom","why","whys","with","wont","would","wouldnt",
            "you","youd","youll","youre","youve","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Reduces a normalized token to its index term.
///
/// Implementations must be pure: the same input always yields the same output.
pub trait Stemmer: Send + Sync {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str>;
}

/// Strips one trailing `ing|ed|es|s|ly|tion|ment|ness|ful|less`, keeping the
/// shortest non-empty stem. A heuristic, not a linguistic stemmer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuffixStripper;

impl Stemmer for SuffixStripper {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> {
        match SUFFIX.captures(token).and_then(|c| c.get(1)) {
            Some(stem) => Cow::Borrowed(stem.as_str()),
            None => Cow::Borrowed(token),
        }
    }
}

/// Porter2 English stemmer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnowballStemmer;

impl Stemmer for SnowballStemmer {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> {
        SNOWBALL.stem(token)
    }
}

/// Text to term pipeline shared by indexing, querying and highlighting.
#[derive(Clone)]
pub struct Tokenizer {
    stemmer: Arc<dyn Stemmer>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(Arc::new(SuffixStripper))
    }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer").finish_non_exhaustive()
    }
}

impl Tokenizer {
    pub fn new(stemmer: Arc<dyn Stemmer>) -> Self {
        Self { stemmer }
    }

    /// NFKC + lowercase, strip everything but letters/digits/whitespace, split,
    /// drop short tokens and stopwords, then stem.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text);
        normalized
            .split_whitespace()
            .filter_map(|token| self.term(token))
            .collect()
    }

    /// Maps one raw word to its term, or `None` if the pipeline discards it.
    pub fn normalize_word(&self, word: &str) -> Option<String> {
        let normalized = normalize(word);
        let mut terms = normalized.split_whitespace().filter_map(|t| self.term(t));
        terms.next()
    }

    fn term(&self, token: &str) -> Option<String> {
        if token.chars().count() < MIN_TOKEN_CHARS || is_stopword(token) {
            return None;
        }
        Some(self.stemmer.stem(token).into_owned())
    }
}

fn normalize(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    NON_WORD.replace_all(&lowered, "").into_owned()
}

/// Tokenize with the default suffix-stripping pipeline.
pub fn tokenize(text: &str) -> Vec<String> {
    Tokenizer::default().tokenize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Testing, the tester's tests!");
        assert_eq!(t, vec!["test", "tester", "test"]);
    }

    #[test]
    fn suffix_stripper_takes_one_suffix() {
        let s = SuffixStripper;
        assert_eq!(s.stem("walking"), "walk");
        assert_eq!(s.stem("business"), "busi");
        assert_eq!(s.stem("useless"), "use");
        assert_eq!(s.stem("file"), "file");
        // A bare suffix is never stripped to nothing.
        assert_eq!(s.stem("less"), "les");
    }

    #[test]
    fn short_tokens_and_stopwords_dropped() {
        assert!(tokenize("an ox is by me").is_empty());
        assert!(tokenize("their would").is_empty());
    }

    #[test]
    fn snowball_is_swappable() {
        let t = Tokenizer::new(Arc::new(SnowballStemmer));
        assert_eq!(t.tokenize("running runners"), vec!["run", "runner"]);
    }

    #[test]
    fn normalize_word_handles_punctuation() {
        let t = Tokenizer::default();
        assert_eq!(t.normalize_word("Files,"), Some("fil".to_string()));
        assert_eq!(t.normalize_word("the"), None);
    }
}
