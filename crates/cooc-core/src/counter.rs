//! Windowed co-occurrence counting over indexed fields.

use std::collections::HashMap;

use crate::pair::PairKey;
use crate::phrase::{substitute, unseparated_phrases};
use crate::token::{IndexedDocument, Token};
use crate::vocabulary::Vocabulary;
use crate::window::{ActiveTargets, RecentWords, Window};

/// In-memory counts accumulated between aggregator flushes.
#[derive(Clone, Debug, Default)]
pub struct CountTables {
    pub word_counts: HashMap<String, u64>,
    pub cooccurrences: HashMap<PairKey, u64>,
}

impl CountTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_word(&mut self, word: &str) {
        *self.word_counts.entry(word.to_string()).or_insert(0) += 1;
    }

    /// Count one co-occurrence of `target` with `word`. A word never
    /// co-occurs with itself, and an existing entry under the reversed
    /// orientation is incremented rather than duplicated.
    pub fn add_cooccurrence(&mut self, target: &str, word: &str) {
        if target == word {
            return;
        }
        let key = PairKey::new(target, word);
        if let Some(count) = self.cooccurrences.get_mut(&key) {
            *count += 1;
        } else if let Some(count) = self.cooccurrences.get_mut(&key.reversed()) {
            *count += 1;
        } else {
            self.cooccurrences.insert(key, 1);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.word_counts.is_empty() && self.cooccurrences.is_empty()
    }

    pub fn clear(&mut self) {
        self.word_counts.clear();
        self.cooccurrences.clear();
    }

    pub fn total_words(&self) -> u64 {
        self.word_counts.values().sum()
    }
}

/// Streams indexed fields into a [`CountTables`]. Carries its window as
/// explicit configuration; nothing is shared between counters.
#[derive(Clone, Debug)]
pub struct CooccurrenceCounter<'v> {
    vocabulary: &'v Vocabulary,
    window: Window,
}

impl<'v> CooccurrenceCounter<'v> {
    pub fn new(vocabulary: &'v Vocabulary, window: Window) -> Self {
        Self { vocabulary, window }
    }

    /// Count every field of a document independently.
    pub fn count_document(&self, document: &IndexedDocument, tables: &mut CountTables) {
        for field in document.fields() {
            self.count_field(field, tables);
        }
    }

    /// Count one field. Windows never reach across a removed stop word.
    pub fn count_field(&self, tokens: &[Token], tables: &mut CountTables) {
        for phrase in unseparated_phrases(tokens) {
            let spans = substitute(phrase, self.vocabulary);
            self.count_phrase(spans, tables);
        }
    }

    fn count_phrase(&self, spans: Vec<Token>, tables: &mut CountTables) {
        let mut recent = RecentWords::new(self.window);
        let mut active = ActiveTargets::new(self.window);

        for span in spans {
            tables.add_word(&span.word);
            for target in active.in_reach(span.position) {
                tables.add_cooccurrence(target, &span.word);
            }
            if self.vocabulary.is_target(&span.word) {
                // Words before the target are invisible to the forward scan.
                recent.prune(span.position);
                for earlier in recent.iter() {
                    tables.add_cooccurrence(&span.word, &earlier.word);
                }
                active.place(&span);
            }
            recent.push(span);
        }
    }
}
