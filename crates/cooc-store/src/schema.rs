use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Marks a database as written by this crate.
pub const APPLICATION_KEY: &str = "application";
pub const APPLICATION_NAME: &str = "cooc";

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        [APPLICATION_KEY, APPLICATION_NAME],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Key/value table holding counts, PMI values or relation metrics as text.
pub fn initialize_kv(conn: &Connection) -> Result<()> {
    configure(conn)?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Completed task records and indexed corpora of one experiment directory.
pub fn initialize_experiment(conn: &Connection) -> Result<()> {
    configure(conn)?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS completed_tasks (
            kind    TEXT NOT NULL,
            args    TEXT NOT NULL,
            context TEXT NOT NULL,
            PRIMARY KEY (kind, args, context)
        );

        CREATE TABLE IF NOT EXISTS indexed_corpora (
            name      TEXT PRIMARY KEY,
            kind      TEXT NOT NULL,
            stop_file TEXT
        );
        ",
    )?;
    Ok(())
}

/// Whether an existing database carries this crate's marker.
pub fn is_recognized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [APPLICATION_KEY],
        |row| row.get::<_, String>(0),
    )
    .map(|name| name == APPLICATION_NAME)
    .unwrap_or(false)
}
