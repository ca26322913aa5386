//! Durable experiment state: completed task records and indexed corpora.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::corpus::CorpusKind;
use crate::error::{Result, StoreError};
use crate::schema;

pub const STATE_FILE: &str = "experiment.db";

/// Pipeline stages, in dependency order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Index,
    Cooccurrence,
    Pmi,
    Relation,
    Feature,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Index => "index",
            TaskKind::Cooccurrence => "cooccurrence",
            TaskKind::Pmi => "pmi",
            TaskKind::Relation => "relation",
            TaskKind::Feature => "feature",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "index" => Ok(TaskKind::Index),
            "cooccurrence" => Ok(TaskKind::Cooccurrence),
            "pmi" => Ok(TaskKind::Pmi),
            "relation" => Ok(TaskKind::Relation),
            "feature" => Ok(TaskKind::Feature),
            other => Err(StoreError::Config(format!("invalid task kind '{other}'"))),
        }
    }
}

/// One task argument or context value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Int(u64),
    Text(String),
    Absent,
}

impl Param {
    pub fn text(value: impl fmt::Display) -> Self {
        Param::Text(value.to_string())
    }

    pub fn optional<T: fmt::Display>(value: Option<T>) -> Self {
        value.map_or(Param::Absent, Param::text)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(n) => write!(f, "{n}"),
            Param::Text(s) => write!(f, "{s}"),
            Param::Absent => f.write_str("-"),
        }
    }
}

/// Cache key. Two records are the same task iff kind, args and context
/// are all equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskRecord {
    pub kind: TaskKind,
    pub args: Vec<Param>,
    pub context: Vec<Param>,
}

impl TaskRecord {
    pub fn new(kind: TaskKind, args: Vec<Param>, context: Vec<Param>) -> Self {
        Self {
            kind,
            args,
            context,
        }
    }

    /// Context handed to the next stage: this task's context followed by
    /// its own args.
    pub fn downstream_context(&self) -> Vec<Param> {
        self.context.iter().chain(&self.args).cloned().collect()
    }
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |params: &[Param]| {
            params
                .iter()
                .map(Param::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "{} args=({}) context=({})",
            self.kind,
            join(&self.args),
            join(&self.context)
        )
    }
}

/// How a corpus was indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusDescriptor {
    pub kind: CorpusKind,
    pub stop_file: Option<PathBuf>,
}

/// Everything an experiment directory remembers between processes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentState {
    pub completed: HashSet<TaskRecord>,
    pub indexed: BTreeMap<String, CorpusDescriptor>,
}

impl ExperimentState {
    pub fn is_complete(&self, record: &TaskRecord) -> bool {
        self.completed.contains(record)
    }

    /// Indexed corpus names in sorted order.
    pub fn corpus_names(&self) -> Vec<String> {
        self.indexed.keys().cloned().collect()
    }
}

/// Load/save of [`ExperimentState`] over `experiment.db`. Every write is
/// committed before returning.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let conn = Connection::open(dir.join(STATE_FILE))?;
        schema::initialize_experiment(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize_experiment(&conn)?;
        Ok(Self { conn })
    }

    /// Whether `dir` holds a state file written by this crate.
    pub fn exists_in(dir: &Path) -> bool {
        let path = dir.join(STATE_FILE);
        if !path.is_file() {
            return false;
        }
        Connection::open(&path)
            .map(|conn| schema::is_recognized(&conn))
            .unwrap_or(false)
    }

    pub fn load(&self) -> Result<ExperimentState> {
        let mut state = ExperimentState::default();

        let mut stmt = self
            .conn
            .prepare("SELECT kind, args, context FROM completed_tasks")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (kind, args, context) = row?;
            state.completed.insert(TaskRecord {
                kind: kind.parse()?,
                args: serde_json::from_str(&args)?,
                context: serde_json::from_str(&context)?,
            });
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, kind, stop_file FROM indexed_corpora")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        for row in rows {
            let (name, kind, stop_file) = row?;
            state.indexed.insert(
                name,
                CorpusDescriptor {
                    kind: kind.parse()?,
                    stop_file: stop_file.map(PathBuf::from),
                },
            );
        }
        Ok(state)
    }

    /// Replace the stored state with `state`.
    pub fn save(&self, state: &ExperimentState) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("DELETE FROM completed_tasks; DELETE FROM indexed_corpora;")?;
        for record in &state.completed {
            insert_task(&tx, record)?;
        }
        for (name, descriptor) in &state.indexed {
            insert_corpus(&tx, name, descriptor)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn record_task(&self, record: &TaskRecord) -> Result<()> {
        insert_task(&self.conn, record)
    }
}

fn insert_task(conn: &Connection, record: &TaskRecord) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO completed_tasks (kind, args, context) VALUES (?1, ?2, ?3)",
        params![
            record.kind.as_str(),
            serde_json::to_string(&record.args)?,
            serde_json::to_string(&record.context)?,
        ],
    )?;
    Ok(())
}

fn insert_corpus(conn: &Connection, name: &str, descriptor: &CorpusDescriptor) -> Result<()> {
    let stop_file = descriptor
        .stop_file
        .as_ref()
        .map(|path| path.display().to_string());
    conn.execute(
        "INSERT OR REPLACE INTO indexed_corpora (name, kind, stop_file) VALUES (?1, ?2, ?3)",
        params![name, descriptor.kind.as_str(), stop_file],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cooc_core::Window;
    use tempfile::TempDir;

    fn cooccurrence_record(window: Window) -> TaskRecord {
        TaskRecord::new(
            TaskKind::Cooccurrence,
            vec![
                Param::text("targets.txt"),
                Param::Absent,
                Param::text(window),
            ],
            vec![Param::text("pubmed")],
        )
    }

    #[test]
    fn test_record_equality_is_structural() {
        let a = cooccurrence_record(Window::Bounded(3));
        let b = cooccurrence_record(Window::Bounded(3));
        let c = cooccurrence_record(Window::Bounded(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_downstream_context_chains() {
        let record = cooccurrence_record(Window::Unbounded);
        let context = record.downstream_context();
        assert_eq!(context[0], Param::text("pubmed"));
        assert_eq!(context.last(), Some(&Param::text("inf")));
        assert_eq!(context.len(), 4);
    }

    #[test]
    fn test_task_kind_parse() {
        assert_eq!("pmi".parse::<TaskKind>().unwrap(), TaskKind::Pmi);
        assert!(matches!(
            "sort".parse::<TaskKind>(),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_param_json_shape() {
        let params = vec![Param::Int(5), Param::text("x"), Param::Absent];
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, "[5,\"x\",null]");
        let back: Vec<Param> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let record = cooccurrence_record(Window::Bounded(3));
        {
            let store = StateStore::open(dir.path()).unwrap();
            let mut state = ExperimentState::default();
            state.indexed.insert(
                "pubmed".to_string(),
                CorpusDescriptor {
                    kind: CorpusKind::Jsonl,
                    stop_file: Some(PathBuf::from("stop.txt")),
                },
            );
            store.save(&state).unwrap();
            store.record_task(&record).unwrap();
        }
        assert!(StateStore::exists_in(dir.path()));

        let state = StateStore::open(dir.path()).unwrap().load().unwrap();
        assert!(state.is_complete(&record));
        assert_eq!(state.corpus_names(), vec!["pubmed"]);
        assert_eq!(state.indexed["pubmed"].kind, CorpusKind::Jsonl);
    }

    #[test]
    fn test_record_task_twice_keeps_one_row() {
        let store = StateStore::open_in_memory().unwrap();
        let record = cooccurrence_record(Window::Bounded(3));
        store.record_task(&record).unwrap();
        store.record_task(&record).unwrap();
        assert_eq!(store.load().unwrap().completed.len(), 1);
    }

    #[test]
    fn test_save_replaces() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .record_task(&cooccurrence_record(Window::Bounded(9)))
            .unwrap();
        let mut state = ExperimentState::default();
        state.completed.insert(cooccurrence_record(Window::Bounded(3)));
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_foreign_database_not_recognized() {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join(STATE_FILE)).unwrap();
        conn.execute_batch("CREATE TABLE other (x INTEGER);").unwrap();
        drop(conn);
        assert!(!StateStore::exists_in(dir.path()));
        assert!(!StateStore::exists_in(&dir.path().join("absent")));
    }
}
