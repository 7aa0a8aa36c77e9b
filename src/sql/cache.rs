use ahash::AHashSet;
use parking_lot::Mutex;
use rusqlite::{CachedStatement, Connection};

use crate::errors::{ResultExt, StoreResult};

const INITIAL_CAPACITY: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Positional,
    Named,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub positional: usize,
    pub named: usize,
}

#[derive(Default)]
struct Tables {
    positional: AHashSet<String>,
    named: AHashSet<String>,
    hits: u64,
    misses: u64,
    capacity: usize,
}

impl Tables {
    fn table(&mut self, kind: StatementKind) -> &mut AHashSet<String> {
        match kind {
            StatementKind::Positional => &mut self.positional,
            StatementKind::Named => &mut self.named,
        }
    }
}

/// Prepared statements keyed by their final text.
///
/// The statements themselves live in the connection's own cache; this type
/// tracks which texts have been prepared and keeps that cache large enough
/// that nothing it tracks is ever evicted.
pub struct StatementCache {
    inner: Mutex<Tables>,
}

impl StatementCache {
    pub fn new(conn: &Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(INITIAL_CAPACITY);
        Self {
            inner: Mutex::new(Tables {
                capacity: INITIAL_CAPACITY,
                ..Tables::default()
            }),
        }
    }

    pub fn prepare<'c>(
        &self,
        conn: &'c Connection,
        sql: &str,
        kind: StatementKind,
    ) -> StoreResult<CachedStatement<'c>> {
        let stmt = conn
            .prepare_cached(sql)
            .context(format!("preparing statement `{}`", first_line(sql)))?;
        self.record(conn, sql, kind);
        Ok(stmt)
    }

    /// Counts a use of `sql`, for statements prepared outside [`prepare`].
    ///
    /// [`prepare`]: StatementCache::prepare
    pub fn record(&self, conn: &Connection, sql: &str, kind: StatementKind) {
        let mut tables = self.inner.lock();
        if tables.table(kind).contains(sql) {
            tables.hits += 1;
            return;
        }
        tables.table(kind).insert(sql.to_string());
        tables.misses += 1;
        let tracked = tables.positional.len() + tables.named.len();
        if tracked >= tables.capacity {
            tables.capacity *= 2;
            conn.set_prepared_statement_cache_capacity(tables.capacity);
        }
    }

    pub fn contains(&self, sql: &str, kind: StatementKind) -> bool {
        self.inner.lock().table(kind).contains(sql)
    }

    pub fn stats(&self) -> CacheStats {
        let tables = self.inner.lock();
        CacheStats {
            hits: tables.hits,
            misses: tables.misses,
            positional: tables.positional.len(),
            named: tables.named.len(),
        }
    }
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default()
}
