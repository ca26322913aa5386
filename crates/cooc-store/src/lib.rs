//! Persistence and orchestration for `cooc-core`: SQLite key/value stores,
//! the document index, the incremental aggregator and the cached
//! experiment runner.

pub mod aggregator;
pub mod config;
pub mod corpus;
pub mod error;
pub mod experiment;
pub mod index;
pub mod kv;
pub mod schema;
pub mod state;
pub mod tasks;

pub use aggregator::{Aggregator, FlushStats};
pub use config::{CorpusSpec, CountOptions, IndexOptions, RunParameters};
pub use corpus::{CorpusKind, RawDocument};
pub use error::{Result, StoreError};
pub use experiment::{ExperimentPaths, Experimenter, PlannedTask, RunReport};
pub use index::{DocumentIndex, IndexSummary, Indexer};
pub use kv::KvStore;
pub use state::{CorpusDescriptor, ExperimentState, Param, StateStore, TaskKind, TaskRecord};
