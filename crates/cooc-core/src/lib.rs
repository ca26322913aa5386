//! Co-occurrence relatedness engine.
//!
//! Counts windowed co-occurrences between a fixed set of target terms and
//! every other word, converts the counts to pointwise mutual information,
//! and derives pairwise relation metrics between targets that share
//! context words.
//!
//! Zero I/O: callers hand in token streams and lookups; persistence lives
//! in `cooc-store`.

pub mod constants;
pub mod counter;
pub mod error;
pub mod features;
pub mod pair;
pub mod phrase;
pub mod pmi;
pub mod relation;
pub mod token;
pub mod tokenizer;
pub mod truth;
pub mod vocabulary;
pub mod window;

pub use constants::{DEFAULT_SYNC_FREQUENCY, MISSING_MARKER, PAIR_SEPARATOR};
pub use counter::{CooccurrenceCounter, CountTables};
pub use error::{CoreError, Result};
pub use features::{FeatureRow, FeatureSchema};
pub use pair::PairKey;
pub use phrase::{substitute, unseparated_phrases};
pub use pmi::{PmiCalculator, pmi};
pub use relation::{RelationFinder, RelationMetrics, context_similarity, pmi_gap};
pub use token::{IndexedDocument, Token};
pub use tokenizer::{IndexedField, index_field, normalize, normalize_phrase, parse_word_list};
pub use truth::TruthFunction;
pub use vocabulary::{Vocabulary, parse_synonyms};
pub use window::Window;
