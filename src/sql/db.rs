//! Connection handle shared by every SQL repository.
//!
//! Owns the single connection, the statement cache and the driver's dialect
//! helper. Opening a database checks the stored schema version, bootstraps
//! missing tables and runs any pending upgrade before the handle is usable.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, error, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, Statement, params, types::Value};

use crate::errors::{ResultExt, StoreError, StoreResult};

use super::{
    cache::{CacheStats, StatementCache, StatementKind},
    dialect::{Helper, HelperRegistry, Predicate},
};

/// Schema version this build reads and writes.
pub const DB_VERSION: u32 = 4;

/// Named arguments, keys including their leading `:`.
pub type Args = Vec<(String, Value)>;

pub struct Db {
    driver: String,
    registry: Arc<HelperRegistry>,
    conn: Mutex<Connection>,
    cache: StatementCache,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("driver", &self.driver).finish_non_exhaustive()
    }
}

impl Db {
    pub fn open(registry: Arc<HelperRegistry>, driver: &str, connect: &str) -> StoreResult<Self> {
        let helper = Arc::clone(registry.helper(driver)?);
        let started_at = Instant::now();
        info!("event=db_open module=sql.db status=start driver={driver}");

        let mut conn = match open_connection(connect) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=sql.db status=error driver={} duration_ms={} error_code=db_open_failed error={}",
                    driver,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        if let Err(err) = init(&mut conn, helper.as_ref()) {
            error!(
                "event=db_open module=sql.db status=error driver={} duration_ms={} error_code=db_init_failed error={}",
                driver,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
        info!(
            "event=db_open module=sql.db status=ok driver={} version={} duration_ms={}",
            driver,
            DB_VERSION,
            started_at.elapsed().as_millis()
        );

        let cache = StatementCache::new(&conn);
        Ok(Self {
            driver: driver.to_string(),
            registry,
            conn: Mutex::new(conn),
            cache,
        })
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn helper(&self) -> StoreResult<Arc<dyn Helper>> {
        self.registry.helper(&self.driver).map(Arc::clone)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn version(&self) -> StoreResult<Option<u32>> {
        stored_version(&self.conn.lock())
    }

    pub fn where_multiple_ors(
        &self,
        column: &str,
        prefix: &str,
        values: &[i64],
        equal: bool,
    ) -> StoreResult<Predicate> {
        self.registry
            .where_multiple_ors(&self.driver, column, prefix, values, equal)
    }

    /// Runs `f` against the connection without a transaction.
    pub fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Session<'_>) -> StoreResult<T>,
    {
        let conn = self.conn.lock();
        f(&Session {
            db: self,
            conn: &conn,
        })
    }

    /// Runs `f` inside a transaction that commits only when `f` succeeds.
    /// An error, early return or panic drops the transaction, rolling it back.
    pub fn with_tx<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Session<'_>) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("creating transaction")?;
        let out = f(&Session { db: self, conn: &tx })?;
        tx.commit().context("committing transaction")?;
        Ok(out)
    }
}

/// Statement access scoped to one connection borrow, or to one open
/// transaction when obtained through [`Db::with_tx`].
pub struct Session<'a> {
    db: &'a Db,
    conn: &'a Connection,
}

impl<'a> Session<'a> {
    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn with_stmt<T, F>(&self, sql: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Statement<'_>) -> StoreResult<T>,
    {
        let mut stmt = self
            .db
            .cache
            .prepare(self.conn, sql, StatementKind::Positional)?;
        f(&mut stmt)
    }

    pub fn with_named_stmt<T, F>(&self, sql: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Statement<'_>) -> StoreResult<T>,
    {
        let mut stmt = self.db.cache.prepare(self.conn, sql, StatementKind::Named)?;
        f(&mut stmt)
    }

    pub fn execute(&self, sql: &str, args: &[(String, Value)]) -> StoreResult<usize> {
        self.with_named_stmt(sql, |stmt| {
            bind_named(stmt, args).context("binding arguments")?;
            stmt.raw_execute().context("executing statement")
        })
    }

    pub fn query<T, F>(&self, sql: &str, args: &[(String, Value)], mut decode: F) -> StoreResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_named_stmt(sql, |stmt| {
            bind_named(stmt, args).context("binding arguments")?;
            let mut rows = stmt.raw_query();
            let mut out = Vec::new();
            while let Some(row) = rows.next().context("reading row")? {
                out.push(decode(row).context("decoding row")?);
            }
            Ok(out)
        })
    }

    pub fn query_one<T, F>(
        &self,
        sql: &str,
        args: &[(String, Value)],
        decode: F,
    ) -> StoreResult<Option<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.query(sql, args, decode)?.into_iter().next())
    }

    /// Inserts through the driver's helper and returns the generated id.
    pub fn create_with_id(&self, sql: &str, args: &[(String, Value)]) -> StoreResult<i64> {
        let id = self
            .db
            .registry
            .create_with_id(&self.db.driver, self.conn, sql, args)?;
        self.db.cache.record(self.conn, sql, StatementKind::Named);
        Ok(id)
    }

    pub fn where_multiple_ors(
        &self,
        column: &str,
        prefix: &str,
        values: &[i64],
        equal: bool,
    ) -> StoreResult<Predicate> {
        self.db.where_multiple_ors(column, prefix, values, equal)
    }
}

/// Binds the arguments the statement references; others are skipped.
pub(crate) fn bind_named(stmt: &mut Statement<'_>, args: &[(String, Value)]) -> rusqlite::Result<()> {
    for (name, value) in args {
        if let Some(idx) = stmt.parameter_index(name)? {
            stmt.raw_bind_parameter(idx, value)?;
        }
    }
    Ok(())
}

pub(crate) fn open_connection(connect: &str) -> StoreResult<Connection> {
    let connect = connect.trim();
    if connect.is_empty() || connect == ":memory:" {
        return Connection::open_in_memory().context("opening in-memory database");
    }
    if let Some(path) = file_uri_path(connect) {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|err| {
                StoreError::configuration(format!(
                    "creating db directory {}: {err}",
                    dir.display()
                ))
            })?;
        }
    }
    let conn = Connection::open(connect).context(format!("opening database {connect}"))?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("setting busy timeout")?;
    Ok(conn)
}

/// Filesystem path named by a `file:` URI, if any.
fn file_uri_path(connect: &str) -> Option<PathBuf> {
    let rest = connect.strip_prefix("file:")?;
    let rest = rest.split('?').next().unwrap_or_default();
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    if rest.is_empty() || rest == ":memory:" {
        return None;
    }
    Some(PathBuf::from(rest))
}

fn init(conn: &mut Connection, helper: &dyn Helper) -> StoreResult<()> {
    let stored = stored_version(conn)?;
    if let Some(found) = stored {
        if found > DB_VERSION {
            return Err(StoreError::SchemaVersion {
                found,
                expected: DB_VERSION,
            });
        }
    }

    for sql in helper.init_sql() {
        conn.execute_batch(sql)
            .context(format!("executing init statement `{}`", sql.trim()))?;
    }

    let tx = conn.transaction().context("creating init transaction")?;
    if let Some(found) = stored.filter(|found| *found < DB_VERSION) {
        info!(
            "event=db_upgrade module=sql.db status=start from={} to={}",
            found, DB_VERSION
        );
        helper.upgrade(&tx, found, DB_VERSION)?;
        info!("event=db_upgrade module=sql.db status=ok version={DB_VERSION}");
    }
    tx.execute("DELETE FROM readeef", [])
        .context("clearing readeef utility table")?;
    tx.execute(
        "INSERT INTO readeef(db_version) VALUES(?1)",
        params![DB_VERSION],
    )
    .context("initializing readeef utility table")?;
    tx.commit().context("committing init transaction")?;
    debug!("event=db_init module=sql.db status=ok version={DB_VERSION}");
    Ok(())
}

/// Version recorded in the utility table. `None` when the table or its row
/// is missing, which counts as current.
fn stored_version(conn: &Connection) -> StoreResult<Option<u32>> {
    let exists: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'readeef'",
            [],
            |row| row.get(0),
        )
        .context("looking up readeef utility table")?;
    if exists == 0 {
        return Ok(None);
    }
    conn.query_row("SELECT db_version FROM readeef", [], |row| row.get(0))
        .optional()
        .context("getting the current db_version")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uris_resolve_to_paths() {
        assert_eq!(
            file_uri_path("file:data/readeef.db?cache=shared"),
            Some(PathBuf::from("data/readeef.db"))
        );
        assert_eq!(
            file_uri_path("file:///tmp/readeef.db"),
            Some(PathBuf::from("/tmp/readeef.db"))
        );
        assert_eq!(file_uri_path("file::memory:"), None);
        assert_eq!(file_uri_path("/tmp/readeef.db"), None);
    }

    #[test]
    fn bind_skips_unreferenced_arguments() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a + 1").unwrap();
        let args = vec![
            (":a".to_string(), Value::Integer(41)),
            (":unused".to_string(), Value::Integer(0)),
        ];
        bind_named(&mut stmt, &args).unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 42);
    }

    #[test]
    fn fresh_database_is_stamped_with_current_version() {
        let db = Db::open(
            Arc::new(HelperRegistry::with_builtin()),
            "sqlite3",
            ":memory:",
        )
        .unwrap();
        assert_eq!(db.version().unwrap(), Some(DB_VERSION));
    }
}
