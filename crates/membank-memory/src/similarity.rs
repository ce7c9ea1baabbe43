//! Tokenizer and Jaccard similarity.
//!
//! Every search, pattern match and consolidation pass in this crate reduces
//! text to a set of tokens with [`tokenize`] and compares sets with
//! [`jaccard`]. No stemming, no synonyms: `"caches"` and `"cache"` are
//! different tokens.

use std::collections::{BTreeSet, HashMap};

/// Tokens at or below this many characters are dropped.
const MIN_TOKEN_CHARS: usize = 3;

/// Stopwords removed after lowercasing. Only words longer than
/// [`MIN_TOKEN_CHARS`] need to be listed.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "because", "been", "before", "being",
    "below", "between", "both", "cannot", "could", "does", "doing", "done", "down", "during",
    "each", "else", "even", "every", "from", "further", "have", "having", "here", "into", "just",
    "like", "make", "more", "most", "much", "must", "need", "needs", "once", "only", "other",
    "ought", "over", "please", "same", "shall", "should", "some", "such", "than", "that", "their",
    "theirs", "them", "then", "there", "these", "they", "this", "those", "through", "under",
    "until", "upon", "using", "very", "want", "were", "what", "when", "where", "which", "while",
    "will", "with", "within", "without", "would", "your", "yours", "yourself",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Split text into tokens, keeping duplicates and document order.
///
/// Lowercases, turns every non-alphanumeric character into a separator, and
/// drops tokens of three characters or fewer as well as stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// The distinct tokens of `text`.
pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// `|A ∩ B| / |A ∪ B|`, or 0 when either set is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Jaccard similarity of two free-text strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    jaccard(&token_set(a), &token_set(b))
}

/// The `limit` most frequent tokens of `text`; ties keep first-occurrence order.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        let entry = counts.entry(token.as_str()).or_insert((0, pos));
        entry.0 += 1;
    }
    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _, _)| token.to_string())
        .collect()
}

/// Lowercase and collapse whitespace. Used to build cache keys.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
