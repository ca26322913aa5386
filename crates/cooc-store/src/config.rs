//! Run and indexing parameters, loadable from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use cooc_core::{DEFAULT_SYNC_FREQUENCY, TruthFunction, Window};
use serde::{Deserialize, Serialize};

use crate::corpus::CorpusKind;
use crate::error::{Result, StoreError};

fn default_sync_frequency() -> usize {
    DEFAULT_SYNC_FREQUENCY
}

/// How one corpus is read and indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    #[serde(default)]
    pub kind: CorpusKind,
    #[serde(default)]
    pub stop_file: Option<PathBuf>,
    #[serde(default = "default_sync_frequency")]
    pub sync_frequency: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            kind: CorpusKind::default(),
            stop_file: None,
            sync_frequency: DEFAULT_SYNC_FREQUENCY,
        }
    }
}

/// A corpus directory and its indexing options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSpec {
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: IndexOptions,
}

/// Counting stage settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountOptions {
    pub window: Window,
    /// Documents between aggregator flushes.
    pub flush_interval: usize,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            window: Window::default(),
            flush_interval: DEFAULT_SYNC_FREQUENCY,
        }
    }
}

/// A full pipeline request.
///
/// ```toml
/// targets = "targets.txt"
/// synonyms = "synonyms.txt"
/// window = 50
/// pmi_threshold = 2
/// relation_threshold = 1
/// truth_store = "truth.db"
/// truth_function = "3_way_mild"
///
/// [[corpora]]
/// path = "corpora/pubmed"
/// kind = "jsonl"
/// stop_file = "stop.txt"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunParameters {
    #[serde(default)]
    pub corpora: Vec<CorpusSpec>,
    pub targets: PathBuf,
    #[serde(default)]
    pub synonyms: Option<PathBuf>,
    #[serde(default)]
    pub window: Window,
    #[serde(default)]
    pub pmi_threshold: u64,
    #[serde(default)]
    pub relation_threshold: u64,
    #[serde(default)]
    pub truth_store: Option<PathBuf>,
    #[serde(default)]
    pub truth_function: Option<TruthFunction>,
    #[serde(default = "default_sync_frequency")]
    pub flush_interval: usize,
}

impl RunParameters {
    pub fn new(targets: impl Into<PathBuf>) -> Self {
        Self {
            corpora: Vec::new(),
            targets: targets.into(),
            synonyms: None,
            window: Window::default(),
            pmi_threshold: 0,
            relation_threshold: 0,
            truth_store: None,
            truth_function: None,
            flush_interval: DEFAULT_SYNC_FREQUENCY,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(format!("invalid run config: {e}")))
    }

    /// Load a TOML file. Relative paths inside it resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut params = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            params.resolve_relative_to(base);
        }
        Ok(params)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.targets);
        self.synonyms.iter_mut().for_each(resolve);
        self.truth_store.iter_mut().for_each(resolve);
        for corpus in &mut self.corpora {
            resolve(&mut corpus.path);
            corpus.options.stop_file.iter_mut().for_each(resolve);
        }
    }

    pub fn count_options(&self) -> CountOptions {
        CountOptions {
            window: self.window,
            flush_interval: self.flush_interval,
        }
    }

    /// Check parameter combinations that cannot be caught by types alone.
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval == 0 {
            return Err(StoreError::Config("flush interval must be at least 1".into()));
        }
        if self.truth_function.is_some() && self.truth_store.is_none() {
            return Err(StoreError::Config(
                "a truth function needs a truth store".into(),
            ));
        }
        if self.truth_store.is_some() && self.truth_function.is_none() {
            return Err(StoreError::Config(
                "a truth store needs a truth function".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml() {
        let params = RunParameters::from_toml("targets = \"t.txt\"").unwrap();
        assert_eq!(params.targets, PathBuf::from("t.txt"));
        assert_eq!(params.window, Window::Unbounded);
        assert_eq!(params.pmi_threshold, 0);
        assert_eq!(params.flush_interval, DEFAULT_SYNC_FREQUENCY);
        assert!(params.corpora.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let params = RunParameters::from_toml(
            r#"
            targets = "t.txt"
            synonyms = "s.txt"
            window = 3
            pmi_threshold = 2
            relation_threshold = 1
            truth_store = "truth.db"
            truth_function = "5_way"

            [[corpora]]
            path = "pubmed"
            kind = "jsonl"
            stop_file = "stop.txt"
            "#,
        )
        .unwrap();
        assert_eq!(params.window, Window::Bounded(3));
        assert_eq!(params.truth_function, Some(TruthFunction::FiveWay));
        assert_eq!(params.corpora[0].options.kind, CorpusKind::Jsonl);
        assert_eq!(
            params.corpora[0].options.sync_frequency,
            DEFAULT_SYNC_FREQUENCY
        );
        params.validate().unwrap();
    }

    #[test]
    fn test_inf_window() {
        let params = RunParameters::from_toml("targets = \"t\"\nwindow = \"inf\"").unwrap();
        assert_eq!(params.window, Window::Unbounded);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        for toml in [
            "targets = \"t\"\nwindow = 0",
            "targets = \"t\"\ntruth_function = \"7_way\"",
            "targets = \"t\"\ncolour = \"red\"",
            "window = 3",
        ] {
            assert!(
                matches!(RunParameters::from_toml(toml), Err(StoreError::Config(_))),
                "{toml}"
            );
        }
    }

    #[test]
    fn test_truth_options_must_pair() {
        let mut params = RunParameters::new("t.txt");
        params.truth_function = Some(TruthFunction::TwoWayMild);
        assert!(params.validate().is_err());
        params.truth_store = Some(PathBuf::from("truth.db"));
        params.validate().unwrap();
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            "targets = \"t.txt\"\n[[corpora]]\npath = \"/abs/corpus\"\n",
        )
        .unwrap();
        let params = RunParameters::load(&path).unwrap();
        assert_eq!(params.targets, dir.path().join("t.txt"));
        assert_eq!(params.corpora[0].path, PathBuf::from("/abs/corpus"));
    }
}
