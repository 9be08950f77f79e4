//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the snapcrawl database.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per persisted run
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    start_url TEXT NOT NULL,
    requested_link_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- One row per attempted target, failed captures included
CREATE TABLE IF NOT EXISTS artifacts (
    run_id TEXT NOT NULL REFERENCES runs(id),
    position INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    source_url TEXT NOT NULL,
    status TEXT NOT NULL,
    failure_kind TEXT,
    failure_message TEXT,
    PRIMARY KEY (run_id, position)
);

CREATE INDEX IF NOT EXISTS idx_artifacts_run ON artifacts(run_id);
"#;

/// Creates all tables and indexes if they do not exist yet
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
