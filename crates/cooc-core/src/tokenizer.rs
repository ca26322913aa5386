use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::token::Token;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());
static FORMATTING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n\t\r]").unwrap());
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"[!"#$%&'()*+,./:;<=>?@\[\\\]^_`{|}~]"##).unwrap());

/// Strip markup tags and punctuation, then lowercase.
/// Hyphens survive, so `type-2` stays a single word.
pub fn normalize(text: &str) -> String {
    let text = TAG.replace_all(text, "");
    let text = FORMATTING.replace_all(&text, " ");
    let text = PUNCTUATION.replace_all(&text, " ");
    text.to_lowercase()
}

/// Normalize a phrase and collapse its whitespace so it compares equal to
/// the space-joined words of a token span.
pub fn normalize_phrase(text: &str) -> String {
    normalize(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A field after indexing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexedField {
    /// Words that survived stop-word removal, with their original positions.
    pub tokens: Vec<Token>,
    /// Every word seen, stop words included. Feeds the corpus total.
    pub word_count: usize,
}

/// Normalize `text` into positioned tokens, dropping stop words but keeping
/// their positions so the gaps remain visible.
pub fn index_field(text: &str, stop_words: &HashSet<String>) -> IndexedField {
    let normalized = normalize(text);
    let mut word_count = 0;
    let tokens = normalized
        .split_whitespace()
        .enumerate()
        .inspect(|_| word_count += 1)
        .filter(|(_, word)| !stop_words.contains(*word))
        .map(|(position, word)| Token::new(word, position))
        .collect();
    IndexedField { tokens, word_count }
}

/// Parse a newline-separated word list (targets, stop words).
/// Each line is normalized; blank lines are ignored.
pub fn parse_word_list(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(normalize_phrase)
        .filter(|line| !line.is_empty())
        .collect()
}
