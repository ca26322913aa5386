//! Readers that turn a corpus directory into raw documents.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Result, StoreError};

/// On-disk layout of a corpus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    /// `.txt` files: first non-empty line is the title, the rest is body.
    #[default]
    Text,
    /// `.jsonl` files of `{"source", "title", "heading", "body"}` records.
    Jsonl,
}

impl CorpusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusKind::Text => "text",
            CorpusKind::Jsonl => "jsonl",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            CorpusKind::Text => "txt",
            CorpusKind::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorpusKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(CorpusKind::Text),
            "jsonl" => Ok(CorpusKind::Jsonl),
            other => Err(StoreError::Config(format!(
                "unknown corpus kind '{other}' (expected text or jsonl)"
            ))),
        }
    }
}

/// A document before normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub body: String,
}

/// Identity of a corpus: the final component of its directory path.
pub fn corpus_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            StoreError::Config(format!("corpus path {} has no final component", path.display()))
        })
}

/// Documents of every matching file under `root`, files in name order.
pub fn read_documents(
    root: &Path,
    kind: CorpusKind,
) -> Result<impl Iterator<Item = Result<RawDocument>>> {
    if !root.is_dir() {
        return Err(StoreError::Config(format!(
            "corpus {} is not a directory",
            root.display()
        )));
    }
    let files = corpus_files(root, kind)?;
    let root = root.to_path_buf();
    Ok(files
        .into_iter()
        .flat_map(move |path| match load_file(&root, &path, kind) {
            Ok(docs) => docs.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        }))
}

fn corpus_files(root: &Path, kind: CorpusKind) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(kind.extension())
        {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn load_file(root: &Path, path: &Path, kind: CorpusKind) -> Result<Vec<RawDocument>> {
    let content = fs::read_to_string(path)?;
    let source = path
        .strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string();
    match kind {
        CorpusKind::Text => Ok(parse_text(&source, &content).into_iter().collect()),
        CorpusKind::Jsonl => parse_jsonl(&source, &content),
    }
}

fn parse_text(source: &str, content: &str) -> Option<RawDocument> {
    let mut lines = content.lines().skip_while(|line| line.trim().is_empty());
    let title = lines.next()?.trim().to_string();
    let body = lines.collect::<Vec<_>>().join("\n");
    Some(RawDocument {
        source: source.to_string(),
        title,
        heading: String::new(),
        body,
    })
}

fn parse_jsonl(source: &str, content: &str) -> Result<Vec<RawDocument>> {
    let mut docs = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut doc: RawDocument = serde_json::from_str(line).map_err(|e| {
            StoreError::InvalidData(format!("{source} line {}: {e}", i + 1))
        })?;
        if doc.source.is_empty() {
            doc.source = format!("{source}:{}", i + 1);
        }
        docs.push(doc);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_kind_parse() {
        assert_eq!("jsonl".parse::<CorpusKind>().unwrap(), CorpusKind::Jsonl);
        assert!(matches!(
            "xml".parse::<CorpusKind>(),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_corpus_name() {
        assert_eq!(corpus_name(Path::new("/data/pubmed")).unwrap(), "pubmed");
        assert!(corpus_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_parse_text_title_and_body() {
        let doc = parse_text("a.txt", "\n\nTitle line\nfirst\nsecond\n").unwrap();
        assert_eq!(doc.title, "Title line");
        assert_eq!(doc.body, "first\nsecond");
        assert!(parse_text("empty.txt", "\n  \n").is_none());
    }

    #[test]
    fn test_read_text_corpus_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), "B\nbody b").unwrap();
        fs::write(dir.path().join("sub/a.txt"), "A\nbody a").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs: Vec<_> = read_documents(dir.path(), CorpusKind::Text)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "B");
        assert_eq!(docs[1].title, "A");
    }

    #[test]
    fn test_read_jsonl_corpus() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("docs.jsonl"),
            "{\"source\":\"pmid-1\",\"title\":\"T\",\"body\":\"B\"}\n\n{\"body\":\"only body\"}\n",
        )
        .unwrap();
        let docs: Vec<_> = read_documents(dir.path(), CorpusKind::Jsonl)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "pmid-1");
        assert_eq!(docs[1].source, "docs.jsonl:3");
        assert_eq!(docs[1].heading, "");
    }

    #[test]
    fn test_bad_jsonl_line_reports_position() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("docs.jsonl"), "{\"body\": 1}\n").unwrap();
        let err = read_documents(dir.path(), CorpusKind::Jsonl)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(err.to_string().contains("docs.jsonl line 1"));
    }

    #[test]
    fn test_missing_corpus_is_config_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_documents(&dir.path().join("nope"), CorpusKind::Text),
            Err(StoreError::Config(_))
        ));
    }
}
