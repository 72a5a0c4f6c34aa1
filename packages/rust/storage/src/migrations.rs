//! SQL migration definitions for the persisted index database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Version of the newest migration.
pub(crate) fn latest_version() -> u32 {
    all_migrations().iter().map(|m| m.version).max().unwrap_or(0)
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: index_meta, chunks",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row describing the indexed document
CREATE TABLE IF NOT EXISTS index_meta (
    document_id     INTEGER PRIMARY KEY,
    source_url      TEXT NOT NULL,
    content_hash    TEXT,
    embedding_model TEXT NOT NULL,
    dimensions      INTEGER NOT NULL,
    chunk_count     INTEGER NOT NULL,
    created_at      TEXT NOT NULL
);

-- Chunks in split order with their little-endian f32 embeddings
CREATE TABLE IF NOT EXISTS chunks (
    position  INTEGER PRIMARY KEY,
    page      INTEGER NOT NULL,
    text      TEXT NOT NULL,
    embedding BLOB NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
