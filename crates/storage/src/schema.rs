use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection, config: &StoreConfig) -> Result<(), StorageError> {
    conn.busy_timeout(config.busy_timeout())?;
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = {};
        PRAGMA synchronous = {};
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
    ",
        config.journal_mode.pragma_value(),
        config.synchronous.pragma_value(),
    ))?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Names interpolated into DDL must be plain lowercase identifiers.
pub fn check_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

pub fn unique_index_name(collection: &str, field_key: &str) -> String {
    format!("uniq_{collection}__{field_key}")
}

pub fn unique_index_sql(collection: &str, field_key: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON fields (value) \
         WHERE collection = '{collection}' AND field_key = '{field_key}'",
        unique_index_name(collection, field_key),
    )
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS documents (
    rowid INTEGER PRIMARY KEY,
    doc_id BLOB NOT NULL UNIQUE CHECK (length(doc_id) = 16),
    collection TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection, rowid);

CREATE TABLE IF NOT EXISTS fields (
    doc_id BLOB NOT NULL REFERENCES documents (doc_id) CHECK (length(doc_id) = 16),
    collection TEXT NOT NULL,
    field_key TEXT NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (doc_id, field_key)
);
CREATE INDEX IF NOT EXISTS idx_fields_match ON fields (collection, field_key, value);

CREATE TABLE IF NOT EXISTS unique_indexes (
    collection TEXT NOT NULL,
    field_key TEXT NOT NULL,
    PRIMARY KEY (collection, field_key)
);
";
