use std::sync::Arc;

use ahash::AHashSet;
use log::{debug, info};
use rusqlite::{OptionalExtension, Row, params, types::Value};

use crate::{
    content::{Article, ArticleId, Feed, FeedId, Tag, User, validate_link},
    errors::{ResultExt, StoreError, StoreResult},
    repo::FeedRepo,
};

use super::{
    article::time_value,
    db::{Args, Db, Session},
    templates,
    user::user_from_row,
};

pub struct SqlFeedRepo {
    db: Arc<Db>,
}

impl SqlFeedRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: FeedId(row.get(0)?),
        link: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        site_link: row.get(4)?,
        hub_link: row.get(5)?,
        update_error: row.get(6)?,
        subscribe_error: row.get(7)?,
    })
}

fn feed_args(feed: &Feed) -> Args {
    vec![
        (":link".into(), Value::Text(feed.link.clone())),
        (":title".into(), Value::Text(feed.title.clone())),
        (":description".into(), Value::Text(feed.description.clone())),
        (":site_link".into(), Value::Text(feed.site_link.clone())),
        (":hub_link".into(), Value::Text(feed.hub_link.clone())),
        (":update_error".into(), Value::Text(feed.update_error.clone())),
        (":subscribe_error".into(), Value::Text(feed.subscribe_error.clone())),
    ]
}

fn article_args(article: &Article) -> Args {
    vec![
        (":feed_id".into(), Value::Integer(article.feed_id.0)),
        (":link".into(), Value::Text(article.link.clone())),
        (
            ":guid".into(),
            article.guid.clone().map_or(Value::Null, Value::Text),
        ),
        (":title".into(), Value::Text(article.title.clone())),
        (":description".into(), Value::Text(article.description.clone())),
        (
            ":date".into(),
            time_value(article.date),
        ),
    ]
}

fn membership_args(feed: &Feed, user: &User) -> Args {
    vec![
        (":user_login".into(), Value::Text(user.login.as_str().into())),
        (":feed_id".into(), Value::Integer(feed.id.0)),
    ]
}

fn query_feeds(s: &Session<'_>, sql: &str, key: &str) -> StoreResult<Vec<Feed>> {
    s.with_stmt(sql, |stmt| {
        stmt.query_map(params![key], feed_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .context("executing feed query stmt")
    })
}

impl FeedRepo for SqlFeedRepo {
    fn get(&self, id: FeedId) -> StoreResult<Feed> {
        if !id.is_set() {
            return Err(StoreError::validation("feed id is not set"));
        }
        debug!("event=feed_get module=sql.feed status=start id={id}");
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::GET_FEED, |stmt| {
                    stmt.query_row(params![id.0], feed_from_row)
                        .optional()
                        .context("executing feed get stmt")
                })
            })
            .context(format!("getting feed {id}"))?
            .ok_or_else(|| StoreError::not_found(format!("feed {id}")))
    }

    fn find_by_link(&self, link: &str) -> StoreResult<Feed> {
        validate_link("feed", link)?;
        debug!("event=feed_find_by_link module=sql.feed status=start link={link}");
        self.db
            .with_conn(|s| query_feeds(s, templates::GET_FEED_BY_LINK, link))
            .context(format!("getting feed by link {link}"))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(format!("feed {link}")))
    }

    fn for_user(&self, user: &User) -> StoreResult<Vec<Feed>> {
        user.validate()?;
        debug!("event=feed_for_user module=sql.feed status=start login={}", user.login);
        self.db
            .with_conn(|s| query_feeds(s, templates::USER_FEEDS, user.login.as_str()))
            .context(format!("getting feeds of user {user}"))
    }

    fn all(&self) -> StoreResult<Vec<Feed>> {
        debug!("event=feed_all module=sql.feed status=start");
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::ALL_FEEDS, |stmt| {
                    stmt.query_map([], feed_from_row)
                        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                        .context("executing feed all stmt")
                })
            })
            .context("getting all feeds")
    }

    fn update(&self, feed: &Feed) -> StoreResult<FeedId> {
        feed.validate()?;
        info!("event=feed_update module=sql.feed status=start link={}", feed.link);
        let args = feed_args(feed);
        self.db
            .with_tx(|s| {
                if s.execute(templates::UPDATE_FEED, &args)? == 0 {
                    return s.create_with_id(templates::CREATE_FEED, &args).map(FeedId);
                }
                s.with_stmt(templates::FEED_ID_BY_LINK, |stmt| {
                    stmt.query_row(params![feed.link], |row| row.get(0))
                        .map(FeedId)
                        .context("executing feed id lookup stmt")
                })
            })
            .context(format!("updating feed {}", feed.link))
    }

    fn delete(&self, feed: &Feed) -> StoreResult<()> {
        feed.validate_stored()?;
        info!("event=feed_delete module=sql.feed status=start id={}", feed.id);
        self.db
            .with_tx(|s| {
                s.with_stmt(templates::DELETE_FEED, |stmt| {
                    stmt.execute(params![feed.id.0])
                        .context("executing feed delete stmt")
                })
            })
            .context(format!("deleting feed {feed}"))?;
        Ok(())
    }

    fn attach_to(&self, feed: &Feed, user: &User) -> StoreResult<()> {
        feed.validate_stored()?;
        user.validate()?;
        info!(
            "event=feed_attach module=sql.feed status=start id={} login={}",
            feed.id, user.login
        );
        let args = membership_args(feed, user);
        self.db
            .with_tx(|s| s.execute(templates::ATTACH_FEED, &args))
            .context(format!("attaching feed {feed} to user {user}"))?;
        Ok(())
    }

    fn detach_from(&self, feed: &Feed, user: &User) -> StoreResult<()> {
        feed.validate_stored()?;
        user.validate()?;
        info!(
            "event=feed_detach module=sql.feed status=start id={} login={}",
            feed.id, user.login
        );
        self.db
            .with_tx(|s| {
                s.with_stmt(templates::DETACH_FEED, |stmt| {
                    stmt.execute(params![user.login.as_str(), feed.id.0])
                        .context("executing feed detach stmt")
                })
            })
            .context(format!("detaching feed {feed} from user {user}"))?;
        Ok(())
    }

    fn users(&self, feed: &Feed) -> StoreResult<Vec<User>> {
        feed.validate_stored()?;
        debug!("event=feed_users module=sql.feed status=start id={}", feed.id);
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::FEED_USERS, |stmt| {
                    stmt.query_map(params![feed.id.0], user_from_row)
                        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                        .context("executing feed users stmt")
                })
            })
            .context(format!("getting users of feed {feed}"))
    }

    fn add_articles(&self, feed: &Feed, articles: &[Article]) -> StoreResult<Vec<Article>> {
        feed.validate_stored()?;
        let mut pending = Vec::with_capacity(articles.len());
        for article in articles {
            let mut article = article.clone();
            article.feed_id = feed.id;
            article.validate()?;
            pending.push(article);
        }
        info!(
            "event=feed_add_articles module=sql.feed status=start id={} candidates={}",
            feed.id,
            pending.len()
        );

        let added = self
            .db
            .with_tx(|s| {
                let mut known: AHashSet<String> = s.with_stmt(templates::FEED_ARTICLE_LINKS, |stmt| {
                    stmt.query_map(params![feed.id.0], |row| row.get(0))
                        .and_then(|rows| rows.collect::<rusqlite::Result<AHashSet<String>>>())
                        .context("executing feed article links stmt")
                })?;

                let mut added = Vec::new();
                for mut article in pending {
                    if !known.insert(article.link.clone()) {
                        continue;
                    }
                    let id = s.create_with_id(templates::CREATE_FEED_ARTICLE, &article_args(&article))?;
                    article.id = ArticleId(id);
                    s.execute(
                        templates::CREATE_SUBSCRIBER_UNREAD,
                        &[
                            (":article_id".into(), Value::Integer(id)),
                            (":feed_id".into(), Value::Integer(feed.id.0)),
                        ],
                    )?;
                    added.push(article);
                }
                Ok(added)
            })
            .context(format!("adding articles to feed {feed}"))?;

        info!(
            "event=feed_add_articles module=sql.feed status=ok id={} added={}",
            feed.id,
            added.len()
        );
        Ok(added)
    }

    fn set_user_tags(&self, feed: &Feed, user: &User, tags: &[Tag]) -> StoreResult<()> {
        feed.validate_stored()?;
        user.validate()?;
        for tag in tags {
            tag.validate()?;
        }
        info!(
            "event=feed_set_tags module=sql.feed status=start id={} login={} tags={}",
            feed.id,
            user.login,
            tags.len()
        );
        self.db
            .with_tx(|s| {
                let subscribed: i64 = s.with_stmt(templates::USER_FEED_EXISTS, |stmt| {
                    stmt.query_row(params![user.login.as_str(), feed.id.0], |row| row.get(0))
                        .context("executing feed membership stmt")
                })?;
                if subscribed == 0 {
                    return Err(StoreError::not_found(format!(
                        "feed {feed} for user {user}"
                    )));
                }
                s.with_stmt(templates::DELETE_USER_FEED_TAGS, |stmt| {
                    stmt.execute(params![user.login.as_str(), feed.id.0])
                        .context("executing tag delete stmt")
                })?;
                let mut args = membership_args(feed, user);
                args.push((":tag".into(), Value::Null));
                for tag in tags {
                    args[2].1 = Value::Text(tag.as_str().into());
                    s.execute(templates::CREATE_USER_FEED_TAG, &args)?;
                }
                Ok(())
            })
            .context(format!("setting tags of feed {feed} for user {user}"))
    }

    fn user_tags(&self, feed: &Feed, user: &User) -> StoreResult<Vec<Tag>> {
        feed.validate_stored()?;
        user.validate()?;
        debug!(
            "event=feed_user_tags module=sql.feed status=start id={} login={}",
            feed.id, user.login
        );
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::USER_FEED_TAGS, |stmt| {
                    stmt.query_map(params![user.login.as_str(), feed.id.0], |row| {
                        row.get::<_, String>(0).map(Tag::new)
                    })
                    .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                    .context("executing user tags stmt")
                })
            })
            .context(format!("getting tags of feed {feed} for user {user}"))
    }
}
