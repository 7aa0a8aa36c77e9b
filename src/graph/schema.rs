use rusqlite::Connection;

use crate::errors::{ResultExt, StoreResult};

/// Scalar predicates live as one JSON object per node; uid edges and the
/// equality index are kept beside it.
pub fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS graph_nodes (
            uid  INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            from_uid  INTEGER NOT NULL REFERENCES graph_nodes(uid) ON DELETE CASCADE,
            predicate TEXT NOT NULL,
            to_uid    INTEGER NOT NULL REFERENCES graph_nodes(uid) ON DELETE CASCADE,
            PRIMARY KEY (from_uid, predicate, to_uid)
        );
        CREATE TABLE IF NOT EXISTS graph_index (
            uid   INTEGER NOT NULL REFERENCES graph_nodes(uid) ON DELETE CASCADE,
            key   TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (uid, key)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_uid, predicate);
        CREATE INDEX IF NOT EXISTS idx_edges_predicate ON graph_edges(predicate);
        CREATE INDEX IF NOT EXISTS idx_index_key_value ON graph_index(key, value);
        "#,
    )
    .context("creating graph schema")
}
