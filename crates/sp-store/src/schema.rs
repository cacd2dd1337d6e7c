use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // Checkpoint every ~400KB instead of the default ~4MB
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS topics (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            parent_id        TEXT REFERENCES topics(id),
            name             TEXT NOT NULL,
            evidence         REAL NOT NULL DEFAULT 0,
            last_updated_at  TEXT NOT NULL,
            pos_latent       INTEGER NOT NULL DEFAULT 100,
            pos_discovered   INTEGER NOT NULL DEFAULT 0,
            pos_engaged      INTEGER NOT NULL DEFAULT 0,
            pos_saturated    INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS events (
            id             TEXT PRIMARY KEY,
            topic_id       TEXT NOT NULL REFERENCES topics(id),
            base_weight    REAL NOT NULL,
            relevance      REAL NOT NULL,
            reading_depth  REAL NOT NULL DEFAULT 1.0,
            source_url     TEXT,
            word_count     INTEGER NOT NULL DEFAULT 0,
            occurred_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL,
            taken_at       TEXT NOT NULL,
            snapshot_type  TEXT NOT NULL,
            payload        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_topics_user ON topics(user_id);
        CREATE INDEX IF NOT EXISTS idx_topics_parent ON topics(parent_id);
        CREATE INDEX IF NOT EXISTS idx_events_topic_time ON events(topic_id, occurred_at);
        CREATE INDEX IF NOT EXISTS idx_snapshots_user_time ON snapshots(user_id, taken_at);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    tracing::debug!(version = SCHEMA_VERSION, "schema initialized");
    Ok(())
}

/// Version recorded in `metadata`, if any.
pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|v| {
            v.parse::<i64>()
                .map_err(|e| StoreError::InvalidData(format!("invalid schema_version '{v}': {e}")))
        })
        .transpose()
}
