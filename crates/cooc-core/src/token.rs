use serde::{Deserialize, Serialize};

/// A normalized word and its position within a field.
///
/// Positions count every word of the field, stop words included, so a gap
/// between two consecutive tokens marks a removed stop word.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub word: String,
    pub position: usize,
}

impl Token {
    pub fn new(word: impl Into<String>, position: usize) -> Self {
        Self {
            word: word.into(),
            position,
        }
    }
}

/// One indexed document: up to three independently windowed fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<Token>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heading: Vec<Token>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Token>,
}

impl IndexedDocument {
    /// Non-empty fields in title, heading, body order.
    pub fn fields(&self) -> impl Iterator<Item = &[Token]> {
        [&self.title, &self.heading, &self.body]
            .into_iter()
            .map(Vec::as_slice)
            .filter(|field| !field.is_empty())
    }

    /// Number of tokens kept after stop-word removal, across all fields.
    pub fn token_count(&self) -> usize {
        self.fields().map(<[Token]>::len).sum()
    }
}
