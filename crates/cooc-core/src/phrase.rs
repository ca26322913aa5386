//! Phrase segmentation and synonym/target substitution.

use crate::token::Token;
use crate::vocabulary::Vocabulary;

/// Split a field into maximal runs of consecutive positions. A gap means a
/// stop word was removed there, which ends the phrase.
pub fn unseparated_phrases(tokens: &[Token]) -> impl Iterator<Item = &[Token]> {
    tokens.chunk_by(|a, b| b.position == a.position + 1)
}

/// Greedy left-to-right rewrite of a phrase.
///
/// From each left boundary, spans are tried longest first. The first span
/// that is a synonym (rewritten to its canonical target) or a target (kept
/// as is) wins and the scan stops; a synonym beats a target of the same
/// length. Unmatched words pass through alone. Each output token takes the
/// position of the first word of its span.
pub fn substitute(phrase: &[Token], vocabulary: &Vocabulary) -> Vec<Token> {
    let mut spans = Vec::with_capacity(phrase.len());
    let mut left = 0;
    while left < phrase.len() {
        let longest = (phrase.len() - left).min(vocabulary.max_span().max(1));
        let (word, len) = (1..=longest)
            .rev()
            .find_map(|len| {
                let segment = join_words(&phrase[left..left + len]);
                if let Some(canonical) = vocabulary.canonical(&segment) {
                    Some((canonical.to_string(), len))
                } else if vocabulary.is_target(&segment) {
                    Some((segment, len))
                } else {
                    None
                }
            })
            .unwrap_or_else(|| (phrase[left].word.clone(), 1));
        spans.push(Token::new(word, phrase[left].position));
        left += len;
    }
    spans
}

fn join_words(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.word.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
