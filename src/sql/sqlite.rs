use log::info;
use rusqlite::{Connection, types::Value};

use crate::errors::{ResultExt, StoreError, StoreResult};

use super::{
    db::bind_named,
    dialect::{Helper, Predicate},
};

const INIT_SQL: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    r#"
CREATE TABLE IF NOT EXISTS readeef (
    db_version INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS users (
    login        TEXT PRIMARY KEY,
    first_name   TEXT NOT NULL DEFAULT '',
    last_name    TEXT NOT NULL DEFAULT '',
    email        TEXT NOT NULL DEFAULT '',
    admin        INTEGER NOT NULL DEFAULT 0,
    active       INTEGER NOT NULL DEFAULT 1,
    profile_data TEXT NOT NULL DEFAULT '{}',
    hash_type    TEXT NOT NULL DEFAULT '',
    salt         BLOB,
    hash         BLOB,
    md5_api      BLOB
)"#,
    "CREATE INDEX IF NOT EXISTS idx_users_md5_api ON users(md5_api)",
    r#"
CREATE TABLE IF NOT EXISTS feeds (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    link            TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL DEFAULT '',
    description     TEXT NOT NULL DEFAULT '',
    site_link       TEXT NOT NULL DEFAULT '',
    hub_link        TEXT NOT NULL DEFAULT '',
    update_error    TEXT NOT NULL DEFAULT '',
    subscribe_error TEXT NOT NULL DEFAULT ''
)"#,
    r#"
CREATE TABLE IF NOT EXISTS users_feeds (
    user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
    feed_id    INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    PRIMARY KEY (user_login, feed_id)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS users_feeds_tags (
    user_login TEXT NOT NULL,
    feed_id    INTEGER NOT NULL,
    tag        TEXT NOT NULL,
    PRIMARY KEY (user_login, feed_id, tag),
    FOREIGN KEY (user_login, feed_id) REFERENCES users_feeds(user_login, feed_id) ON DELETE CASCADE
)"#,
    r#"
CREATE TABLE IF NOT EXISTS articles (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id     INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    link        TEXT NOT NULL,
    guid        TEXT,
    title       TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    date        INTEGER, -- nanoseconds since the epoch
    UNIQUE (feed_id, link)
)"#,
    "CREATE INDEX IF NOT EXISTS idx_articles_date ON articles(date)",
    r#"
CREATE TABLE IF NOT EXISTS users_articles_unread (
    user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_login, article_id)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS users_articles_favorite (
    user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_login, article_id)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS articles_thumbnails (
    article_id INTEGER PRIMARY KEY REFERENCES articles(id) ON DELETE CASCADE,
    thumbnail  TEXT NOT NULL DEFAULT '',
    link       TEXT NOT NULL DEFAULT '',
    mime_type  TEXT NOT NULL DEFAULT '',
    processed  INTEGER NOT NULL DEFAULT 0
)"#,
    r#"
CREATE TABLE IF NOT EXISTS articles_scores (
    article_id INTEGER PRIMARY KEY REFERENCES articles(id) ON DELETE CASCADE,
    score      INTEGER NOT NULL DEFAULT 0,
    score1     INTEGER NOT NULL DEFAULT 0,
    score2     INTEGER NOT NULL DEFAULT 0,
    score3     INTEGER NOT NULL DEFAULT 0,
    score4     INTEGER NOT NULL DEFAULT 0,
    score5     INTEGER NOT NULL DEFAULT 0
)"#,
    r#"
CREATE TABLE IF NOT EXISTS articles_extracts (
    article_id INTEGER PRIMARY KEY REFERENCES articles(id) ON DELETE CASCADE,
    title      TEXT NOT NULL DEFAULT '',
    content    TEXT NOT NULL DEFAULT '',
    top_image  TEXT NOT NULL DEFAULT '',
    language   TEXT NOT NULL DEFAULT ''
)"#,
    r#"
CREATE TABLE IF NOT EXISTS hubbub_subscriptions (
    feed_id              INTEGER PRIMARY KEY REFERENCES feeds(id) ON DELETE CASCADE,
    link                 TEXT NOT NULL,
    lease_duration       INTEGER NOT NULL DEFAULT 0,
    verification_time    INTEGER, -- nanoseconds since the epoch
    subscription_failure INTEGER NOT NULL DEFAULT 0
)"#,
];

/// Incremental steps; entry `i` migrates version `i + 1` to `i + 2`.
const UPGRADES: &[&str] = &[
    "ALTER TABLE hubbub_subscriptions ADD COLUMN subscription_failure INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE articles_extracts ADD COLUMN language TEXT NOT NULL DEFAULT ''",
    r#"
UPDATE articles SET date = date * 1000000000 WHERE date IS NOT NULL;
UPDATE hubbub_subscriptions SET verification_time = verification_time * 1000000000
    WHERE verification_time IS NOT NULL;
"#,
];

/// Dialect helper for the bundled SQLite driver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteHelper;

impl SqliteHelper {
    pub const DRIVER: &'static str = "sqlite3";
}

impl Helper for SqliteHelper {
    fn init_sql(&self) -> &[&'static str] {
        INIT_SQL
    }

    fn create_with_id(
        &self,
        conn: &Connection,
        sql: &str,
        args: &[(String, Value)],
    ) -> StoreResult<i64> {
        let mut stmt = conn.prepare_cached(sql).context("preparing insert")?;
        bind_named(&mut stmt, args).context("binding insert arguments")?;
        stmt.raw_execute().context("executing insert")?;
        Ok(conn.last_insert_rowid())
    }

    fn where_multiple_ors(
        &self,
        column: &str,
        prefix: &str,
        values: &[i64],
        equal: bool,
    ) -> StoreResult<Predicate> {
        let list = serde_json::to_string(values).context("encoding id list")?;
        let op = if equal { "IN" } else { "NOT IN" };
        Ok(
            Predicate::new(format!("{column} {op} (SELECT value FROM json_each(:{prefix}))"))
                .arg(format!(":{prefix}"), Value::Text(list)),
        )
    }

    fn upgrade(&self, conn: &Connection, from: u32, to: u32) -> StoreResult<()> {
        for version in from..to {
            let step = version
                .checked_sub(1)
                .and_then(|idx| UPGRADES.get(idx as usize))
                .ok_or_else(|| {
                    StoreError::configuration(format!(
                        "no sqlite upgrade step from version {version}"
                    ))
                })?;
            info!(
                "event=db_upgrade module=sql.sqlite status=start from={} to={}",
                version,
                version + 1
            );
            conn.execute_batch(step)
                .context(format!("upgrading sqlite schema from version {version}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_sql_bootstraps_an_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        for sql in SqliteHelper.init_sql() {
            conn.execute_batch(sql).unwrap();
        }
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 12);
    }

    #[test]
    fn large_lists_bind_a_single_json_array() {
        let values: Vec<i64> = (1..=25).collect();
        let pred = SqliteHelper
            .where_multiple_ors("a.feed_id", "feed_id", &values, true)
            .unwrap();
        assert_eq!(
            pred.sql,
            "a.feed_id IN (SELECT value FROM json_each(:feed_id))"
        );
        assert_eq!(pred.args[0].0, ":feed_id");
    }

    #[test]
    fn unknown_upgrade_step_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteHelper.upgrade(&conn, 7, 8).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }
}
