//! Per-driver behaviour that plain SQL cannot express portably.

use std::{fmt, sync::Arc};

use ahash::AHashMap;
use rusqlite::{Connection, types::Value};

use crate::errors::{StoreError, StoreResult};

use super::{db::Args, sqlite::SqliteHelper};

/// Lists at least this long are handed to the dialect helper instead of
/// being expanded into an OR chain.
pub const MULTIPLE_ORS_THRESHOLD: usize = 20;

/// A WHERE fragment and the named arguments it references.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub args: Args,
}

impl Predicate {
    pub fn new<T: Into<String>>(sql: T) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<T: Into<String>>(mut self, name: T, value: Value) -> Self {
        self.args.push((name.into(), value));
        self
    }
}

pub trait Helper: Send + Sync {
    /// Bootstrap statements, run in order on every open.
    fn init_sql(&self) -> &[&'static str];

    /// Executes an insert and returns the generated row id.
    fn create_with_id(
        &self,
        conn: &Connection,
        sql: &str,
        args: &[(String, Value)],
    ) -> StoreResult<i64>;

    /// Membership test for lists too long for an OR chain.
    fn where_multiple_ors(
        &self,
        column: &str,
        prefix: &str,
        values: &[i64],
        equal: bool,
    ) -> StoreResult<Predicate>;

    /// Migrates a database from `from` up to `to`. Runs inside a transaction.
    fn upgrade(&self, conn: &Connection, from: u32, to: u32) -> StoreResult<()>;
}

/// `(column = :prefix0 OR column = :prefix1 ...)`, or the negated conjunction
/// when `equal` is false.
pub fn or_chain(column: &str, prefix: &str, values: &[i64], equal: bool) -> Predicate {
    let (sign, joiner) = if equal { ("=", " OR ") } else { ("!=", " AND ") };
    let mut parts = Vec::with_capacity(values.len());
    let mut args = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        parts.push(format!("{column} {sign} :{prefix}{i}"));
        args.push((format!(":{prefix}{i}"), Value::Integer(*value)));
    }
    Predicate {
        sql: format!("({})", parts.join(joiner)),
        args,
    }
}

/// Maps driver names onto their helpers. Built once at startup and shared
/// read-only afterwards.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: AHashMap<String, Arc<dyn Helper>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every helper this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SqliteHelper::DRIVER, Arc::new(SqliteHelper));
        registry
    }

    /// Registers a helper, returning the one it replaced.
    pub fn register<T: Into<String>>(
        &mut self,
        driver: T,
        helper: Arc<dyn Helper>,
    ) -> Option<Arc<dyn Helper>> {
        self.helpers.insert(driver.into(), helper)
    }

    pub fn helper(&self, driver: &str) -> StoreResult<&Arc<dyn Helper>> {
        self.helpers.get(driver).ok_or_else(|| {
            StoreError::configuration(format!("no helper registered for driver `{driver}`"))
        })
    }

    pub fn drivers(&self) -> Vec<&str> {
        let mut drivers: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        drivers.sort_unstable();
        drivers
    }

    pub fn create_with_id(
        &self,
        driver: &str,
        conn: &Connection,
        sql: &str,
        args: &[(String, Value)],
    ) -> StoreResult<i64> {
        self.helper(driver)?.create_with_id(conn, sql, args)
    }

    pub fn where_multiple_ors(
        &self,
        driver: &str,
        column: &str,
        prefix: &str,
        values: &[i64],
        equal: bool,
    ) -> StoreResult<Predicate> {
        let helper = self.helper(driver)?;
        where_multiple_ors(helper.as_ref(), column, prefix, values, equal)
    }
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}

/// Short lists become an OR chain with one bound parameter per value;
/// longer ones use the helper's strategy.
pub fn where_multiple_ors(
    helper: &dyn Helper,
    column: &str,
    prefix: &str,
    values: &[i64],
    equal: bool,
) -> StoreResult<Predicate> {
    if values.len() < MULTIPLE_ORS_THRESHOLD {
        return Ok(or_chain(column, prefix, values, equal));
    }
    helper.where_multiple_ors(column, prefix, values, equal)
}
