//! Cumulative document index: one JSON document per line plus the running
//! total word count.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use cooc_core::{IndexedDocument, index_field};

use crate::corpus::RawDocument;
use crate::error::{Result, StoreError};

pub const INDEX_FILE: &str = "index.jsonl";
pub const TOTAL_WORD_COUNT_FILE: &str = "total_word_count.txt";
pub const CHECKPOINT_FILE: &str = "index.checkpoint";

/// The index files of one experiment directory.
#[derive(Clone, Debug)]
pub struct DocumentIndex {
    documents: PathBuf,
    total: PathBuf,
    checkpoint: PathBuf,
}

impl DocumentIndex {
    pub fn new(dir: &Path) -> Self {
        Self {
            documents: dir.join(INDEX_FILE),
            total: dir.join(TOTAL_WORD_COUNT_FILE),
            checkpoint: dir.join(CHECKPOINT_FILE),
        }
    }

    pub fn append(&self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.documents)?;
        let mut writer = BufWriter::new(file);
        for doc in documents {
            serde_json::to_writer(&mut writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Stream every indexed document. An absent index yields nothing.
    pub fn documents(&self) -> Result<Box<dyn Iterator<Item = Result<IndexedDocument>>>> {
        if !self.documents.is_file() {
            return Ok(Box::new(std::iter::empty()));
        }
        let reader = BufReader::new(File::open(&self.documents)?);
        Ok(Box::new(reader.lines().filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(serde_json::from_str(&line).map_err(StoreError::from)),
            Err(e) => Some(Err(e.into())),
        })))
    }

    /// Total word count over everything indexed so far; zero before the
    /// first sync.
    pub fn total_word_count(&self) -> Result<u64> {
        if !self.total.is_file() {
            return Ok(0);
        }
        let content = fs::read_to_string(&self.total)?;
        content.trim().parse().map_err(|e| {
            StoreError::InvalidData(format!(
                "{} holds '{}': {e}",
                self.total.display(),
                content.trim()
            ))
        })
    }

    /// Replace the persisted total. Written to a sibling file and renamed
    /// so a crash never leaves a torn value.
    pub fn write_total_word_count(&self, total: u64) -> Result<()> {
        let tmp = self.total.with_extension("txt.tmp");
        fs::write(&tmp, total.to_string())?;
        fs::rename(&tmp, &self.total)?;
        Ok(())
    }

    /// Remember the current end of the index before the pass for corpus
    /// `name` starts appending.
    pub fn begin_pass(&self, name: &str) -> Result<()> {
        let length = match fs::metadata(&self.documents) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let total = self.total_word_count()?;
        fs::write(&self.checkpoint, format!("{length} {total} {name}"))?;
        Ok(())
    }

    pub fn commit_pass(&self) -> Result<()> {
        fs::remove_file(&self.checkpoint)?;
        Ok(())
    }

    /// Settle a pass left open by a crash or error. If `recorded` says its
    /// corpus made it into the experiment state the pass is committed;
    /// otherwise the index is cut back to its recorded length and the total
    /// restored. Returns whether anything was rolled back.
    pub fn recover(&self, recorded: impl Fn(&str) -> bool) -> Result<bool> {
        if !self.checkpoint.is_file() {
            return Ok(false);
        }
        let content = fs::read_to_string(&self.checkpoint)?;
        let invalid = || {
            StoreError::InvalidData(format!(
                "{} holds '{}'",
                self.checkpoint.display(),
                content.trim()
            ))
        };
        let mut parts = content.trim().splitn(3, ' ');
        let length: u64 = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        let total: u64 = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        let name = parts.next().ok_or_else(invalid)?;

        if recorded(name) {
            self.commit_pass()?;
            return Ok(false);
        }
        if self.documents.is_file() {
            OpenOptions::new()
                .write(true)
                .open(&self.documents)?
                .set_len(length)?;
        }
        self.write_total_word_count(total)?;
        self.commit_pass()?;
        tracing::warn!(
            "rolled back interrupted indexing of '{name}' to {length} bytes, total word count {total}"
        );
        Ok(true)
    }
}

/// What one indexing pass added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub documents: usize,
    pub words: u64,
    pub total_words: u64,
    pub syncs: usize,
}

/// Normalizes raw documents and appends them to a [`DocumentIndex`] in
/// batches of `sync_frequency`.
pub struct Indexer<'i> {
    index: &'i DocumentIndex,
    stop_words: HashSet<String>,
    sync_frequency: usize,
    buffer: Vec<IndexedDocument>,
    total_words: u64,
    summary: IndexSummary,
}

impl<'i> Indexer<'i> {
    /// Resumes from the total already persisted in `index`.
    pub fn new(
        index: &'i DocumentIndex,
        stop_words: HashSet<String>,
        sync_frequency: usize,
    ) -> Result<Self> {
        if sync_frequency == 0 {
            return Err(StoreError::Config(
                "sync frequency must be at least 1".into(),
            ));
        }
        let total_words = index.total_word_count()?;
        Ok(Self {
            index,
            stop_words,
            sync_frequency,
            buffer: Vec::with_capacity(sync_frequency.min(1024)),
            total_words,
            summary: IndexSummary::default(),
        })
    }

    pub fn add(&mut self, raw: &RawDocument) -> Result<()> {
        let title = index_field(&raw.title, &self.stop_words);
        let heading = index_field(&raw.heading, &self.stop_words);
        let body = index_field(&raw.body, &self.stop_words);
        let words = (title.word_count + heading.word_count + body.word_count) as u64;

        self.total_words += words;
        self.summary.words += words;
        self.summary.documents += 1;
        self.buffer.push(IndexedDocument {
            source: raw.source.clone(),
            title: title.tokens,
            heading: heading.tokens,
            body: body.tokens,
        });
        if self.buffer.len() >= self.sync_frequency {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.index.append(&self.buffer)?;
        self.index.write_total_word_count(self.total_words)?;
        tracing::debug!(
            "synced {} documents, total word count {}",
            self.buffer.len(),
            self.total_words
        );
        self.buffer.clear();
        self.summary.syncs += 1;
        Ok(())
    }

    /// Sync whatever is buffered and report.
    pub fn finish(mut self) -> Result<IndexSummary> {
        self.sync()?;
        self.summary.total_words = self.total_words;
        Ok(self.summary)
    }
}
