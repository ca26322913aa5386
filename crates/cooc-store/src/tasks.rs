//! The four computation stages that run over stored artifacts. Each stage
//! reads its inputs from disk and rewrites its output from scratch, so a
//! retried stage never adds onto a partial earlier attempt.

use std::fs;
use std::path::Path;

use cooc_core::{
    CooccurrenceCounter, CountTables, FeatureRow, FeatureSchema, PairKey, PmiCalculator,
    RelationFinder, RelationMetrics, TruthFunction, Vocabulary,
};

use crate::aggregator::Aggregator;
use crate::config::CountOptions;
use crate::error::{Result, StoreError};
use crate::index::DocumentIndex;
use crate::kv::{self, KvStore};

/// Outcome of a counting pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountSummary {
    pub documents: usize,
    pub flushes: usize,
}

/// Stream the document index through a counter, flushing into `words` and
/// `cooccurrences` every `flush_interval` documents and once at the end.
pub fn count_cooccurrences(
    index: &DocumentIndex,
    vocabulary: &Vocabulary,
    options: CountOptions,
    words: &KvStore,
    cooccurrences: &KvStore,
) -> Result<CountSummary> {
    if options.flush_interval == 0 {
        return Err(StoreError::Config("flush interval must be at least 1".into()));
    }
    words.truncate()?;
    cooccurrences.truncate()?;

    let counter = CooccurrenceCounter::new(vocabulary, options.window);
    let mut aggregator = Aggregator::new(words, cooccurrences);
    let mut tables = CountTables::new();
    let mut documents = 0;

    for doc in index.documents()? {
        counter.count_document(&doc?, &mut tables);
        documents += 1;
        if documents % options.flush_interval == 0 {
            aggregator.flush(&mut tables)?;
        }
    }
    aggregator.flush(&mut tables)?;

    tracing::info!(
        "counted {documents} documents with window {} ({} flushes)",
        options.window,
        aggregator.flushes()
    );
    Ok(CountSummary {
        documents,
        flushes: aggregator.flushes(),
    })
}

/// Score every co-occurrence record above `threshold` and write the PMI
/// table. Returns the number of pairs written.
pub fn calculate_pmis(
    words: &KvStore,
    cooccurrences: &KvStore,
    total_words: u64,
    threshold: u64,
    out: &KvStore,
) -> Result<usize> {
    let calculator = PmiCalculator::new(threshold, total_words);
    let written = out.transaction(|tx| {
        kv::clear_on(tx)?;
        let mut written = 0;
        cooccurrences.for_each_entry(|key, value| {
            let pair = PairKey::decode(&key)?;
            let count = kv::parse_count(&key, &value)?;
            if let Some(pmi) = calculator.score(&pair, count, |word| words.get_count(word))? {
                kv::put_on(tx, &key, &pmi.to_string())?;
                written += 1;
            }
            Ok(())
        })?;
        Ok(written)
    })?;
    tracing::info!("wrote {written} PMI values (threshold {threshold}, N = {total_words})");
    Ok(written)
}

/// Derive relation metrics for target pairs sharing more than
/// `min_shared_words` context words. Returns the number of pairs written.
pub fn calculate_relations(pmis: &KvStore, min_shared_words: u64, out: &KvStore) -> Result<usize> {
    let mut finder = RelationFinder::new(min_shared_words);
    for (key, value) in pmis.entries()? {
        let pair = PairKey::decode(&key)?;
        finder.add_pmi(pair, kv::parse_float(&key, &value)?);
    }
    let relations = finder
        .finish()
        .into_iter()
        .map(|(pair, metrics)| (pair.encode(), metrics.encode()));
    let written = out.replace_all(relations)?;
    tracing::info!("wrote {written} target relations (more than {min_shared_words} shared words)");
    Ok(written)
}

/// Ground-truth labels for the feature table.
pub struct Truth<'t> {
    pub store: &'t KvStore,
    pub function: TruthFunction,
}

/// Join relations with PMI, raw counts and optional truth labels into one
/// attribute-relation file at `out`. Returns the number of rows.
pub fn write_features(
    relations: &KvStore,
    pmis: &KvStore,
    cooccurrences: &KvStore,
    truth: Option<Truth<'_>>,
    out: &Path,
) -> Result<usize> {
    let mut rows = Vec::new();
    for (key, value) in relations.entries()? {
        let pair = PairKey::decode(&key)?;
        let metrics = RelationMetrics::decode(&value).ok_or_else(|| {
            StoreError::InvalidData(format!("relation {key} has malformed metrics '{value}'"))
        })?;
        let keys = pair.orientations().map(|p| p.encode());

        let pmi = pmis
            .get_any(&keys)?
            .map(|v| kv::parse_float(&key, &v))
            .transpose()?;
        let cooccurred = cooccurrences
            .get_any(&keys)?
            .map(|v| kv::parse_count(&key, &v))
            .transpose()?
            .unwrap_or(0);
        let label = match &truth {
            Some(truth) => Some(
                truth
                    .store
                    .get_any(&keys)?
                    .map(|v| kv::parse_float(&key, &v))
                    .transpose()?
                    .map(|score| truth.function.classify(score)),
            ),
            None => None,
        };
        rows.push(FeatureRow {
            pair,
            metrics,
            pmi,
            cooccurrences: cooccurred,
            truth: label,
        });
    }
    rows.sort_by(|a, b| a.pair.cmp(&b.pair));

    let schema = FeatureSchema::new(truth.as_ref().map(|t| t.function));
    let mut content = schema.header();
    for row in &rows {
        content.push_str(&schema.render_row(row));
    }
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out, content)?;
    tracing::info!("wrote {} feature rows to {}", rows.len(), out.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cooc_core::{IndexedDocument, Token, Window};
    use tempfile::TempDir;

    fn doc(words: &[&str]) -> IndexedDocument {
        IndexedDocument {
            source: "test".into(),
            body: words
                .iter()
                .enumerate()
                .map(|(i, w)| Token::new(*w, i))
                .collect(),
            ..Default::default()
        }
    }

    fn store(entries: &[(&str, &str)]) -> KvStore {
        let store = KvStore::open_in_memory().unwrap();
        for (k, v) in entries {
            store.put(k, v).unwrap();
        }
        store
    }

    #[test]
    fn test_count_flushes_periodically_and_truncates() {
        let dir = TempDir::new().unwrap();
        let index = DocumentIndex::new(dir.path());
        index
            .append(&[
                doc(&["diabetes", "risk"]),
                doc(&["diabetes", "risk"]),
                doc(&["diabetes", "risk"]),
            ])
            .unwrap();
        let vocab = Vocabulary::parse("diabetes", None).unwrap();
        let words = store(&[("stale", "99")]);
        let cooc = KvStore::open_in_memory().unwrap();
        let options = CountOptions {
            window: Window::Bounded(3),
            flush_interval: 2,
        };

        let summary = count_cooccurrences(&index, &vocab, options, &words, &cooc).unwrap();
        assert_eq!(summary, CountSummary { documents: 3, flushes: 2 });
        assert!(words.get("stale").unwrap().is_none());
        assert_eq!(words.get_count("risk").unwrap(), Some(3));
        assert_eq!(cooc.get_count("diabetes,risk").unwrap(), Some(3));

        // A rerun starts from zero instead of stacking on the first pass.
        count_cooccurrences(&index, &vocab, options, &words, &cooc).unwrap();
        assert_eq!(cooc.get_count("diabetes,risk").unwrap(), Some(3));
    }

    #[test]
    fn test_pmi_threshold_is_strict() {
        let words = store(&[("diabetes", "2"), ("risk", "2"), ("obesity", "1")]);
        let cooc = store(&[("diabetes,risk", "2"), ("diabetes,obesity", "1")]);
        let out = store(&[("old,entry", "1.0")]);

        let written = calculate_pmis(&words, &cooc, 8, 1, &out).unwrap();
        assert_eq!(written, 1);
        assert!(out.get("old,entry").unwrap().is_none());
        assert!(out.get("diabetes,obesity").unwrap().is_none());
        // log2(2/8) - log2(2/8) - log2(2/8) = 2
        assert_relative_eq!(out.get_float("diabetes,risk").unwrap().unwrap(), 2.0);
    }

    #[test]
    fn test_pmi_missing_word_count_aborts() {
        let words = store(&[("diabetes", "2")]);
        let cooc = store(&[("diabetes,risk", "2")]);
        let out = KvStore::open_in_memory().unwrap();
        let err = calculate_pmis(&words, &cooc, 8, 0, &out).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(cooc_core::CoreError::Consistency(_))
        ));
        assert!(out.is_empty().unwrap());
    }

    #[test]
    fn test_failed_pmi_pass_keeps_previous_output() {
        let words = store(&[("diabetes", "2"), ("obesity", "2")]);
        let cooc = store(&[("diabetes,obesity", "2"), ("diabetes,risk", "2")]);
        let out = store(&[("old,entry", "1.5")]);
        assert!(calculate_pmis(&words, &cooc, 8, 0, &out).is_err());
        assert_eq!(out.len().unwrap(), 1);
        assert_eq!(out.get_float("old,entry").unwrap(), Some(1.5));
    }

    #[test]
    fn test_relations_from_shared_word() {
        let pmis = store(&[("diabetes,risk", "2"), ("depression,risk", "1")]);
        let out = KvStore::open_in_memory().unwrap();
        assert_eq!(calculate_relations(&pmis, 0, &out).unwrap(), 1);
        let (key, value) = out.entries().unwrap().remove(0);
        assert!(key == "diabetes,depression" || key == "depression,diabetes");
        let metrics = RelationMetrics::decode(&value).unwrap();
        assert_relative_eq!(metrics.context_similarity, 0.5);
        assert_relative_eq!(metrics.pmi_gap, 1.0);

        assert_eq!(calculate_relations(&pmis, 1, &out).unwrap(), 0);
        assert!(out.is_empty().unwrap());
    }

    #[test]
    fn test_features_with_missing_values() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/features.arff");
        let relations = store(&[("depression,diabetes", "0.5,1")]);
        let pmis = KvStore::open_in_memory().unwrap();
        let cooc = KvStore::open_in_memory().unwrap();

        let rows = write_features(&relations, &pmis, &cooc, None, &out).unwrap();
        assert_eq!(rows, 1);
        let content = fs::read_to_string(&out).unwrap();
        assert!(content.ends_with("@DATA\n0.5,1,?,0,'depression-diabetes'\n"));
    }

    #[test]
    fn test_features_probe_both_orientations_and_label() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("features.arff");
        let relations = store(&[("depression,diabetes", "0.5,1")]);
        let pmis = store(&[("diabetes,depression", "1.5")]);
        let cooc = store(&[("diabetes,depression", "4")]);
        let truth = store(&[("diabetes,depression", "0.2")]);

        write_features(
            &relations,
            &pmis,
            &cooc,
            Some(Truth {
                store: &truth,
                function: TruthFunction::FiveWay,
            }),
            &out,
        )
        .unwrap();
        let content = fs::read_to_string(&out).unwrap();
        assert!(content.contains("@ATTRIBUTE 'truth value'"));
        assert!(content.ends_with("0.5,1,1.5,4,'depression-diabetes',MILD_POS\n"));
    }

    #[test]
    fn test_features_unknown_truth_is_missing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("features.arff");
        let relations = store(&[("a,b", "1,0")]);
        let empty = KvStore::open_in_memory().unwrap();
        write_features(
            &relations,
            &empty,
            &empty,
            Some(Truth {
                store: &empty,
                function: TruthFunction::TwoWayMild,
            }),
            &out,
        )
        .unwrap();
        let content = fs::read_to_string(&out).unwrap();
        assert!(content.ends_with("1,0,?,0,'a-b',?\n"));
    }
}
