use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{Row, params, types::Value};

use crate::{
    content::{Article, ArticleId, FeedId, Login, User},
    errors::{ResultExt, StoreResult},
    options::{QueryKind, QueryOptions, StateChange},
    repo::ArticleRepo,
};

use super::{
    compose::{ComposedQuery, compose},
    db::Db,
    templates,
};

pub struct SqlArticleRepo {
    db: Arc<Db>,
}

impl SqlArticleRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    fn compose(
        &self,
        kind: QueryKind,
        login: Option<&Login>,
        opts: &QueryOptions,
    ) -> StoreResult<ComposedQuery> {
        let helper = self.db.helper()?;
        compose(kind, login, opts, helper.as_ref())
    }

    fn list(&self, login: Option<&Login>, opts: &QueryOptions) -> StoreResult<Vec<Article>> {
        let query = self.compose(QueryKind::Articles { user: login.is_some() }, login, opts)?;
        let with_score = opts.needs_scores();
        self.db.with_conn(|s| {
            s.query(&query.sql, &query.args, |row| {
                article_from_row(row, with_score)
            })
        })
    }
}

/// Times are stored as nanoseconds since the epoch.
pub(crate) fn stored_time(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.map(DateTime::from_timestamp_nanos)
}

/// Column value for a validated time.
pub(crate) fn time_value(time: Option<DateTime<Utc>>) -> Value {
    time.and_then(|time| time.timestamp_nanos_opt())
        .map_or(Value::Null, Value::Integer)
}

/// Comparison bound for a filter time; out-of-range times saturate.
pub(crate) fn time_bound(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt()
        .unwrap_or(if time.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

fn article_from_row(row: &Row<'_>, with_score: bool) -> rusqlite::Result<Article> {
    Ok(Article {
        feed_id: FeedId(row.get(0)?),
        id: ArticleId(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        link: row.get(4)?,
        date: stored_time(row.get(5)?),
        guid: row.get(6)?,
        read: row.get(7)?,
        favorite: row.get(8)?,
        thumbnail: row.get(9)?,
        thumbnail_link: row.get(10)?,
        score: if with_score { Some(row.get(11)?) } else { None },
    })
}

impl ArticleRepo for SqlArticleRepo {
    fn articles(&self, user: &User, opts: &QueryOptions) -> StoreResult<Vec<Article>> {
        user.validate()?;
        debug!(
            "event=articles_list module=sql.article status=start login={} limit={} offset={}",
            user.login, opts.limit, opts.offset
        );
        self.list(Some(&user.login), opts)
            .context(format!("getting articles of user {user}"))
    }

    fn all(&self, opts: &QueryOptions) -> StoreResult<Vec<Article>> {
        debug!(
            "event=articles_list module=sql.article status=start login=- limit={} offset={}",
            opts.limit, opts.offset
        );
        self.list(None, opts).context("getting articles")
    }

    fn ids(&self, user: &User, opts: &QueryOptions) -> StoreResult<Vec<ArticleId>> {
        user.validate()?;
        debug!("event=article_ids module=sql.article status=start login={}", user.login);
        let query = self.compose(QueryKind::ArticleIds, Some(&user.login), opts)?;
        self.db
            .with_conn(|s| {
                s.query(&query.sql, &query.args, |row| row.get(0).map(ArticleId))
            })
            .context(format!("getting article ids of user {user}"))
    }

    fn count(&self, user: &User, opts: &QueryOptions) -> StoreResult<i64> {
        user.validate()?;
        debug!("event=article_count module=sql.article status=start login={}", user.login);
        let query = self.compose(QueryKind::Count, Some(&user.login), opts)?;
        let count = self
            .db
            .with_conn(|s| s.query_one(&query.sql, &query.args, |row| row.get(0)))
            .context(format!("getting article count of user {user}"))?;
        Ok(count.unwrap_or(0))
    }

    fn update_state(
        &self,
        user: &User,
        change: StateChange,
        opts: &QueryOptions,
    ) -> StoreResult<()> {
        user.validate()?;
        let query = self.compose(QueryKind::State(change), Some(&user.login), opts)?;
        info!(
            "event=article_state module=sql.article status=start login={} change={:?}",
            user.login, change
        );
        let affected = self
            .db
            .with_tx(|s| s.execute(&query.sql, &query.args))
            .context(format!("updating {change:?} state of user {user}"))?;
        debug!(
            "event=article_state module=sql.article status=ok login={} affected={}",
            user.login, affected
        );
        Ok(())
    }

    fn remove_stale_unread(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        info!("event=article_stale_unread module=sql.article status=start before={before}");
        let removed = self
            .db
            .with_tx(|s| {
                s.with_stmt(templates::DELETE_STALE_UNREAD, |stmt| {
                    stmt.execute(params![time_bound(before)])
                        .context("executing stale unread delete stmt")
                })
            })
            .context("removing stale unread markers")?;
        info!("event=article_stale_unread module=sql.article status=ok removed={removed}");
        Ok(removed)
    }
}
