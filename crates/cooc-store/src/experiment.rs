//! Experiment directory: resolves a run into its task chain, computes every
//! artifact path from the parameters and executes only the tasks whose
//! record is not already complete.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use cooc_core::{Vocabulary, parse_word_list};

use crate::config::{IndexOptions, RunParameters};
use crate::corpus;
use crate::error::{Result, StoreError};
use crate::index::{DocumentIndex, IndexSummary, Indexer};
use crate::kv::KvStore;
use crate::state::{
    CorpusDescriptor, ExperimentState, Param, StateStore, TaskKind, TaskRecord,
};
use crate::tasks::{self, Truth};

pub const RESULTS_DIR: &str = "experiment_results";
pub const FEATURES_DIR: &str = "features";

/// Deterministic artifact locations for one set of run parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExperimentPaths {
    pub word_counts: PathBuf,
    pub cooccurrences: PathBuf,
    pub pmis: PathBuf,
    pub relations: PathBuf,
    pub features: PathBuf,
}

impl ExperimentPaths {
    pub fn resolve(dir: &Path, params: &RunParameters) -> Result<Self> {
        let vocabulary = format!(
            "{}_{}",
            file_identity(&params.targets)?,
            optional_identity(params.synonyms.as_deref())?
        );
        let cooccurrence_dir = dir
            .join(RESULTS_DIR)
            .join(&vocabulary)
            .join(format!("{}_cooccurrence_window", params.window));
        let pmi_dir = cooccurrence_dir.join(format!("{}_pmi_threshold", params.pmi_threshold));
        let relation_dir =
            pmi_dir.join(format!("{}_relation_threshold", params.relation_threshold));
        let truth = match params.truth_function {
            Some(function) => format!(
                "{}_{function}",
                optional_identity(params.truth_store.as_deref())?
            ),
            None => "none".to_string(),
        };
        let features = dir
            .join(FEATURES_DIR)
            .join(&vocabulary)
            .join(truth)
            .join(format!(
                "{}_{}_{}_features.arff",
                params.window, params.pmi_threshold, params.relation_threshold
            ));

        Ok(Self {
            word_counts: cooccurrence_dir.join("word_count.db"),
            cooccurrences: cooccurrence_dir.join("cooccurrences.db"),
            pmis: pmi_dir.join("pmis.db"),
            relations: relation_dir.join("relations.db"),
            features,
        })
    }
}

/// File name used to identify an input file in paths and task records.
fn file_identity(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Config(format!("{} has no file name", path.display())))
}

fn optional_identity(path: Option<&Path>) -> Result<String> {
    path.map_or(Ok("none".to_string()), file_identity)
}

/// A task scheduled by [`Experimenter::plan`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedTask {
    pub record: TaskRecord,
    pub complete: bool,
}

/// Which tasks one call to [`Experimenter::run`] executed or skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub executed: Vec<TaskRecord>,
    pub skipped: Vec<TaskRecord>,
    pub features: PathBuf,
}

/// One experiment directory and its durable state. Assumes a single
/// writer: concurrent runs against the same directory are not supported.
pub struct Experimenter {
    dir: PathBuf,
    index: DocumentIndex,
    store: StateStore,
    state: ExperimentState,
}

impl Experimenter {
    /// Create a fresh experiment in an absent or empty directory, or load
    /// the one already there. Anything else is refused.
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        if dir.exists() {
            if !dir.is_dir() {
                return Err(StoreError::Config(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            let empty = fs::read_dir(dir)?.next().is_none();
            if !empty && !StateStore::exists_in(dir) {
                return Err(StoreError::Config(format!(
                    "{} is not empty and holds no experiment state",
                    dir.display()
                )));
            }
        } else {
            fs::create_dir_all(dir)?;
        }

        let store = StateStore::open(dir)?;
        let state = store.load()?;
        let index = DocumentIndex::new(dir);
        index.recover(|name| state.indexed.contains_key(name))?;
        tracing::info!(
            "opened experiment {} ({} completed tasks, {} corpora)",
            dir.display(),
            state.completed.len(),
            state.indexed.len()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            index,
            store,
            state,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> &ExperimentState {
        &self.state
    }

    /// Index a corpus unless one with the same name already is. Returns
    /// `None` for a repeat.
    pub fn index(&mut self, corpus: &Path, options: &IndexOptions) -> Result<Option<IndexSummary>> {
        let name = corpus::corpus_name(corpus)?;
        if self.state.indexed.contains_key(&name) {
            tracing::info!("corpus '{name}' is already indexed, skipping");
            return Ok(None);
        }
        let stop_words = match &options.stop_file {
            Some(path) => parse_word_list(&read_input(path, "stop word file")?),
            None => Default::default(),
        };

        tracing::info!("indexing corpus '{name}' from {}", corpus.display());
        self.index.begin_pass(&name)?;
        let summary = match self.index_pass(corpus, options, stop_words) {
            Ok(summary) => summary,
            Err(e) => {
                self.index.recover(|_| false)?;
                return Err(e);
            }
        };

        let descriptor = CorpusDescriptor {
            kind: options.kind,
            stop_file: options.stop_file.clone(),
        };
        let mut state = self.state.clone();
        state.completed.insert(index_record(&name, &descriptor));
        state.indexed.insert(name.clone(), descriptor);
        if let Err(e) = self.store.save(&state) {
            self.index.recover(|_| false)?;
            return Err(e);
        }
        self.index.commit_pass()?;
        self.state = state;

        tracing::info!(
            "indexed '{name}': {} documents, {} words, total word count {}",
            summary.documents,
            summary.words,
            summary.total_words
        );
        Ok(Some(summary))
    }

    fn index_pass(
        &self,
        corpus: &Path,
        options: &IndexOptions,
        stop_words: HashSet<String>,
    ) -> Result<IndexSummary> {
        let mut indexer = Indexer::new(&self.index, stop_words, options.sync_frequency)?;
        for doc in corpus::read_documents(corpus, options.kind)? {
            indexer.add(&doc?)?;
        }
        indexer.finish()
    }

    /// The ordered task chain for `params`, each marked complete or not:
    /// one index task per requested corpus, then the four computation
    /// stages. Downstream contexts name every corpus the index will hold
    /// once the index tasks have run.
    pub fn plan(&self, params: &RunParameters) -> Result<Vec<PlannedTask>> {
        let mut records = Vec::new();
        let mut corpora: BTreeSet<String> = self.state.indexed.keys().cloned().collect();
        for spec in &params.corpora {
            let name = corpus::corpus_name(&spec.path)?;
            let descriptor = match self.state.indexed.get(&name) {
                Some(existing) => existing.clone(),
                None => CorpusDescriptor {
                    kind: spec.options.kind,
                    stop_file: spec.options.stop_file.clone(),
                },
            };
            records.push(index_record(&name, &descriptor));
            corpora.insert(name);
        }

        let cooccurrence = TaskRecord::new(
            TaskKind::Cooccurrence,
            vec![
                Param::text(file_identity(&params.targets)?),
                Param::optional(params.synonyms.as_deref().map(file_identity).transpose()?),
                Param::text(params.window),
            ],
            corpora.into_iter().map(Param::Text).collect(),
        );
        let pmi = TaskRecord::new(
            TaskKind::Pmi,
            vec![Param::Int(params.pmi_threshold)],
            cooccurrence.downstream_context(),
        );
        let relation = TaskRecord::new(
            TaskKind::Relation,
            vec![Param::Int(params.relation_threshold)],
            pmi.downstream_context(),
        );
        let feature = TaskRecord::new(
            TaskKind::Feature,
            vec![
                Param::optional(params.truth_store.as_deref().map(file_identity).transpose()?),
                Param::optional(params.truth_function),
            ],
            relation.downstream_context(),
        );
        records.extend([cooccurrence, pmi, relation, feature]);

        Ok(records
            .into_iter()
            .map(|record| PlannedTask {
                complete: self.state.is_complete(&record),
                record,
            })
            .collect())
    }

    /// Run the full chain for `params`, skipping completed tasks. Each
    /// executed task is recorded durably before the next one starts.
    pub fn run(&mut self, params: &RunParameters) -> Result<RunReport> {
        params.validate()?;
        if !params.targets.is_file() {
            return Err(StoreError::Config(format!(
                "target file {} does not exist",
                params.targets.display()
            )));
        }
        if self.state.indexed.is_empty() && params.corpora.is_empty() {
            return Err(StoreError::Config(
                "no corpus has been indexed in this experiment".into(),
            ));
        }

        let paths = ExperimentPaths::resolve(&self.dir, params)?;
        let mut report = RunReport {
            features: paths.features.clone(),
            ..Default::default()
        };
        for task in self.plan(params)? {
            if task.complete {
                tracing::info!("skipping completed task {}", task.record);
                report.skipped.push(task.record);
                continue;
            }
            tracing::info!("executing task {}", task.record);
            self.execute(&task.record, params, &paths)?;
            self.store.record_task(&task.record)?;
            self.state.completed.insert(task.record.clone());
            report.executed.push(task.record);
        }
        Ok(report)
    }

    fn execute(
        &mut self,
        record: &TaskRecord,
        params: &RunParameters,
        paths: &ExperimentPaths,
    ) -> Result<()> {
        match record.kind {
            TaskKind::Index => {
                let name = record.args.first().map(Param::to_string);
                let spec = params
                    .corpora
                    .iter()
                    .find(|spec| corpus::corpus_name(&spec.path).ok() == name)
                    .ok_or_else(|| {
                        StoreError::InvalidData(format!("no corpus matches task {record}"))
                    })?;
                self.index(&spec.path, &spec.options)?;
                Ok(())
            }
            TaskKind::Cooccurrence => {
                let targets = read_input(&params.targets, "target file")?;
                let synonyms = params
                    .synonyms
                    .as_deref()
                    .map(|path| read_input(path, "synonym file"))
                    .transpose()?;
                let vocabulary = Vocabulary::parse(&targets, synonyms.as_deref())?;
                create_parent(&paths.word_counts)?;
                let words = KvStore::open(&paths.word_counts)?;
                let cooccurrences = KvStore::open(&paths.cooccurrences)?;
                tasks::count_cooccurrences(
                    &self.index,
                    &vocabulary,
                    params.count_options(),
                    &words,
                    &cooccurrences,
                )?;
                Ok(())
            }
            TaskKind::Pmi => {
                let words = KvStore::open_existing(&paths.word_counts, "word count store")?;
                let cooccurrences =
                    KvStore::open_existing(&paths.cooccurrences, "co-occurrence store")?;
                create_parent(&paths.pmis)?;
                let pmis = KvStore::open(&paths.pmis)?;
                tasks::calculate_pmis(
                    &words,
                    &cooccurrences,
                    self.index.total_word_count()?,
                    params.pmi_threshold,
                    &pmis,
                )?;
                Ok(())
            }
            TaskKind::Relation => {
                let pmis = KvStore::open_existing(&paths.pmis, "PMI store")?;
                create_parent(&paths.relations)?;
                let relations = KvStore::open(&paths.relations)?;
                tasks::calculate_relations(&pmis, params.relation_threshold, &relations)?;
                Ok(())
            }
            TaskKind::Feature => {
                let relations = KvStore::open_existing(&paths.relations, "relation store")?;
                let pmis = KvStore::open_existing(&paths.pmis, "PMI store")?;
                let cooccurrences =
                    KvStore::open_existing(&paths.cooccurrences, "co-occurrence store")?;
                let truth_store = match &params.truth_store {
                    Some(path) => Some(KvStore::open_read_only(path, "truth store")?),
                    None => None,
                };
                let truth = match (&truth_store, params.truth_function) {
                    (Some(store), Some(function)) => Some(Truth { store, function }),
                    _ => None,
                };
                tasks::write_features(&relations, &pmis, &cooccurrences, truth, &paths.features)?;
                Ok(())
            }
        }
    }

    /// Completed task records, in pipeline order.
    pub fn show_performed_experiments(&self) -> Vec<&TaskRecord> {
        let mut records: Vec<_> = self.state.completed.iter().collect();
        records.sort();
        records
    }

    /// Indexed corpora and how each was indexed, by name.
    pub fn show_index(&self) -> Vec<(&str, &CorpusDescriptor)> {
        self.state
            .indexed
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
            .collect()
    }
}

fn index_record(name: &str, descriptor: &CorpusDescriptor) -> TaskRecord {
    TaskRecord::new(
        TaskKind::Index,
        vec![
            Param::text(name),
            Param::text(descriptor.kind),
            Param::optional(descriptor.stop_file.as_ref().map(|p| p.display())),
        ],
        Vec::new(),
    )
}

fn read_input(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        StoreError::Config(format!("cannot read {what} {}: {e}", path.display()))
    })
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusKind;
    use cooc_core::Window;
    use tempfile::TempDir;

    #[test]
    fn test_create_in_absent_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("exp");
        let exp = Experimenter::open_or_create(&dir).unwrap();
        assert!(dir.join("experiment.db").is_file());
        assert!(exp.show_performed_experiments().is_empty());
    }

    #[test]
    fn test_refuses_file_path() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("exp");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            Experimenter::open_or_create(&file),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_refuses_foreign_directory() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("notes.txt"), "x").unwrap();
        assert!(matches!(
            Experimenter::open_or_create(root.path()),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_paths_are_deterministic() {
        let root = TempDir::new().unwrap();
        let mut params = RunParameters::new("lists/targets.txt");
        params.window = Window::Bounded(3);
        params.pmi_threshold = 2;
        let a = ExperimentPaths::resolve(root.path(), &params).unwrap();
        let b = ExperimentPaths::resolve(root.path(), &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.pmis,
            root.path()
                .join("experiment_results/targets.txt_none/3_cooccurrence_window/2_pmi_threshold/pmis.db")
        );
        assert_eq!(
            a.features,
            root.path().join("features/targets.txt_none/none/3_2_0_features.arff")
        );

        params.window = Window::Unbounded;
        let c = ExperimentPaths::resolve(root.path(), &params).unwrap();
        assert!(c.word_counts.to_string_lossy().contains("inf_cooccurrence_window"));
    }

    #[test]
    fn test_inputs_differing_in_extension_get_separate_paths() {
        let root = TempDir::new().unwrap();
        let txt = ExperimentPaths::resolve(root.path(), &RunParameters::new("targets.txt")).unwrap();
        let csv = ExperimentPaths::resolve(root.path(), &RunParameters::new("targets.csv")).unwrap();
        assert_ne!(txt.word_counts, csv.word_counts);
        assert_ne!(txt.features, csv.features);

        let exp = Experimenter::open_or_create(&root.path().join("exp")).unwrap();
        let txt_plan = exp.plan(&RunParameters::new("targets.txt")).unwrap();
        let csv_plan = exp.plan(&RunParameters::new("targets.csv")).unwrap();
        assert_ne!(txt_plan[0].record, csv_plan[0].record);
    }

    #[test]
    fn test_plan_context_chains_upstream_args() {
        let root = TempDir::new().unwrap();
        let exp = Experimenter::open_or_create(root.path()).unwrap();
        let mut params = RunParameters::new("targets.txt");
        params.window = Window::Bounded(3);
        params.pmi_threshold = 1;
        let plan = exp.plan(&params).unwrap();
        let kinds: Vec<_> = plan.iter().map(|t| t.record.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TaskKind::Cooccurrence,
                TaskKind::Pmi,
                TaskKind::Relation,
                TaskKind::Feature
            ]
        );
        let relation = &plan[2].record;
        assert!(relation.context.contains(&Param::text("3")));
        assert!(relation.context.contains(&Param::Int(1)));
        assert!(plan.iter().all(|t| !t.complete));

        params.pmi_threshold = 2;
        let changed = exp.plan(&params).unwrap();
        assert_eq!(changed[0].record, plan[0].record);
        assert_ne!(changed[2].record, plan[2].record);
    }

    #[test]
    fn test_run_without_corpus_is_config_error() {
        let root = TempDir::new().unwrap();
        let targets = root.path().join("targets.txt");
        fs::write(&targets, "diabetes\n").unwrap();
        let mut exp = Experimenter::open_or_create(&root.path().join("exp")).unwrap();
        assert!(matches!(
            exp.run(&RunParameters::new(&targets)),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_index_is_idempotent_per_name() {
        let root = TempDir::new().unwrap();
        let corpus = root.path().join("pubmed");
        fs::create_dir(&corpus).unwrap();
        fs::write(corpus.join("a.txt"), "Title\nsome body words").unwrap();
        let mut exp = Experimenter::open_or_create(&root.path().join("exp")).unwrap();

        let options = IndexOptions {
            kind: CorpusKind::Text,
            ..Default::default()
        };
        let first = exp.index(&corpus, &options).unwrap().unwrap();
        assert_eq!(first.documents, 1);
        assert_eq!(first.total_words, 4);
        assert!(exp.index(&corpus, &options).unwrap().is_none());
        assert_eq!(exp.show_index().len(), 1);
        assert_eq!(exp.show_performed_experiments()[0].kind, TaskKind::Index);
    }
}
