use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};

use crate::error::{Result, StoreError};
use crate::schema;

/// String key/value file. Counts and scores are stored as decimal text.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize_kv(&conn)?;
        Ok(Self { conn })
    }

    /// Open a store an earlier stage must already have written.
    pub fn open_existing(path: &Path, what: &str) -> Result<Self> {
        if !path.is_file() {
            return Err(StoreError::InvalidData(format!(
                "the {what} must already exist at {} - was an earlier stage skipped?",
                path.display()
            )));
        }
        Self::open(path)
    }

    /// Open a store supplied by the user without writing to it. The file
    /// must be an SQLite database with a `kv` table.
    pub fn open_read_only(path: &Path, what: &str) -> Result<Self> {
        if !path.is_file() {
            return Err(StoreError::Config(format!(
                "{what} {} does not exist",
                path.display()
            )));
        }
        let unusable =
            |reason: String| StoreError::Config(format!("{what} {} {reason}", path.display()));
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| unusable(format!("cannot be opened: {e}")))?;
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| unusable(format!("is not a key/value store: {e}")))?;
        if tables == 0 {
            return Err(unusable("has no kv table".into()));
        }
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize_kv(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        put_on(&self.conn, key, value)
    }

    /// Value of the first key present among `keys`.
    pub fn get_any(&self, keys: &[String]) -> Result<Option<String>> {
        for key in keys {
            if let Some(value) = self.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn get_count(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)?.map(|v| parse_count(key, &v)).transpose()
    }

    pub fn get_float(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)?.map(|v| parse_float(key, &v)).transpose()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM kv ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(rows)
    }

    /// Visit entries in insertion order without collecting them.
    pub fn for_each_entry(&self, mut f: impl FnMut(String, String) -> Result<()>) -> Result<()> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM kv ORDER BY rowid")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            f(row.get(0)?, row.get(1)?)?;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry, leaving an empty store.
    pub fn truncate(&self) -> Result<()> {
        clear_on(&self.conn)
    }

    /// Run `f` inside one transaction; nothing is written unless it succeeds.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Replace the whole contents with `entries` in one transaction.
    pub fn replace_all<I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.transaction(|tx| {
            clear_on(tx)?;
            let mut written = 0;
            for (key, value) in entries {
                put_on(tx, &key, &value)?;
                written += 1;
            }
            Ok(written)
        })
    }
}

pub(crate) fn get_on(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub(crate) fn clear_on(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM kv", [])?;
    Ok(())
}

pub(crate) fn put_on(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

pub(crate) fn parse_count(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("count for '{key}' is '{value}': {e}")))
}

pub(crate) fn parse_float(key: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("value for '{key}' is '{value}': {e}")))
}
