//! Article listings over the graph store.
//!
//! The store has no query planner, so option filtering, ordering and paging
//! run in memory over the nodes reachable from the user (or over every
//! article for userless listings). The rules match the composed SQL: the
//! same validation, NULL dates sorting first ascending, and the score join
//! acting as an inner join whenever scores are selected or bounded.

use std::{cmp::Ordering, sync::Arc};

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    content::{Article, ArticleId, FeedId, User},
    errors::{ResultExt, StoreResult},
    options::{QueryKind, QueryOptions, Scope, SortField, SortOrder, StateChange},
    repo::ArticleRepo,
};

use super::{
    UidRef,
    query::{Field, GraphQuery, fields, vars},
    store::{GraphStore, Mutation, Txn},
    uid::Uid,
    user::user_uid,
};

const ARTICLE_FIELDS: &[&str] = &[
    "uid",
    "article.link",
    "article.title",
    "article.description",
    "article.date",
    "article.guid",
    "thumbnail.thumbnail",
    "thumbnail.link",
    "scores.score",
];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct ArticleNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    #[serde(rename = "article.link")]
    pub link: String,
    #[serde(rename = "article.title", default)]
    pub title: String,
    #[serde(rename = "article.description", default)]
    pub description: String,
    #[serde(rename = "article.date", default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "article.guid", default)]
    pub guid: Option<String>,
    #[serde(rename = "article.feed", default)]
    pub feed: Vec<UidRef>,
    #[serde(rename = "thumbnail.thumbnail", default, skip_serializing)]
    pub thumbnail: String,
    #[serde(rename = "thumbnail.link", default, skip_serializing)]
    pub thumbnail_link: String,
    #[serde(rename = "scores.score", default, skip_serializing)]
    pub score: Option<i64>,
}

impl ArticleNode {
    pub(crate) fn from_article(article: &Article, feed: Uid) -> Self {
        Self {
            uid: None,
            link: article.link.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            date: article.date,
            guid: article.guid.clone(),
            feed: vec![UidRef { uid: feed }],
            ..Self::default()
        }
    }

    fn into_article(self, feed_id: FeedId) -> Article {
        Article {
            id: ArticleId(self.uid.map_or(0, Uid::as_i64)),
            feed_id,
            title: self.title,
            description: self.description,
            link: self.link,
            date: self.date,
            guid: self.guid,
            thumbnail: self.thumbnail,
            thumbnail_link: self.thumbnail_link,
            ..Article::default()
        }
    }
}

#[derive(Deserialize)]
struct FeedArticles {
    uid: Uid,
    #[serde(rename = "~article.feed", default)]
    articles: Vec<ArticleNode>,
}

#[derive(Deserialize)]
struct TagFeeds {
    #[serde(rename = "tag.feeds", default)]
    feeds: Vec<UidRef>,
}

#[derive(Deserialize)]
struct UserView {
    #[serde(default)]
    subscribed: Vec<FeedArticles>,
    #[serde(default)]
    unread: Vec<UidRef>,
    #[serde(default)]
    favorite: Vec<UidRef>,
    #[serde(default)]
    tag: Vec<TagFeeds>,
}

#[derive(Deserialize)]
struct DatedRef {
    uid: Uid,
    #[serde(rename = "article.date", default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct UnreadView {
    uid: Uid,
    #[serde(default)]
    unread: Vec<DatedRef>,
}

struct Candidate {
    article: Article,
    unread: bool,
    favorite: bool,
    tagged: bool,
    score: Option<i64>,
}

impl Candidate {
    fn marked(&self, change: StateChange) -> bool {
        match change {
            StateChange::Read(_) => self.unread,
            StateChange::Favorite(_) => self.favorite,
        }
    }
}

fn article_fields() -> Vec<Field> {
    let mut out = fields(ARTICLE_FIELDS);
    out.push(Field::edge("article.feed", fields(&["uid"])));
    out
}

/// Articles visible to `user`, or every article when `user` is `None`.
fn candidates(txn: &Txn<'_>, user: Option<Uid>) -> StoreResult<Vec<Candidate>> {
    let Some(user) = user else {
        let query = GraphQuery::has("article.link").with_fields(article_fields());
        let nodes: Vec<ArticleNode> = txn.query_as(&query, &Default::default())?;
        return Ok(nodes
            .into_iter()
            .map(|node| {
                let feed_id = node
                    .feed
                    .first()
                    .map_or(FeedId(0), |feed| FeedId(feed.uid.as_i64()));
                let score = node.score;
                Candidate {
                    article: node.into_article(feed_id),
                    unread: false,
                    favorite: false,
                    tagged: false,
                    score,
                }
            })
            .collect());
    };

    let query = GraphQuery::uid("$user")
        .edge(
            "subscribed",
            vec![Field::Uid, Field::edge("~article.feed", article_fields())],
        )
        .edge("unread", fields(&["uid"]))
        .edge("favorite", fields(&["uid"]))
        .edge("tag", vec![Field::edge("tag.feeds", fields(&["uid"]))]);
    let views: Vec<UserView> = txn.query_as(&query, &vars([("$user", user.to_string())]))?;
    let Some(view) = views.into_iter().next() else {
        return Ok(Vec::new());
    };

    let unread: AHashSet<Uid> = view.unread.iter().map(|r| r.uid).collect();
    let favorite: AHashSet<Uid> = view.favorite.iter().map(|r| r.uid).collect();
    let tagged: AHashSet<Uid> = view
        .tag
        .iter()
        .flat_map(|tag| tag.feeds.iter().map(|r| r.uid))
        .collect();

    let mut out = Vec::new();
    for feed in view.subscribed {
        let feed_id = FeedId(feed.uid.as_i64());
        let feed_tagged = tagged.contains(&feed.uid);
        for node in feed.articles {
            let uid = node.uid.unwrap_or(Uid(0));
            let score = node.score;
            out.push(Candidate {
                article: node.into_article(feed_id),
                unread: unread.contains(&uid),
                favorite: favorite.contains(&uid),
                tagged: feed_tagged,
                score,
            });
        }
    }
    Ok(out)
}

fn matches(c: &Candidate, opts: &QueryOptions, score_gate: bool) -> bool {
    let a = &c.article;
    let in_scope = match &opts.scope {
        Scope::AllFeeds | Scope::Favorites => true,
        Scope::Feed(id) => a.feed_id == *id,
        Scope::Feeds(ids) => ids.contains(&a.feed_id),
        Scope::Search(ids) => ids.contains(&a.id),
    };
    if !in_scope {
        return false;
    }
    if (opts.unread_only && !c.unread) || (opts.read_only && c.unread) {
        return false;
    }
    if opts.wants_favorites() && !c.favorite {
        return false;
    }
    if opts.untagged_only && c.tagged {
        return false;
    }
    if opts.before_id.is_some_and(|id| a.id >= id) || opts.after_id.is_some_and(|id| a.id <= id) {
        return false;
    }
    if let Some(before) = opts.before_date {
        if a.date.is_some_and(|date| date >= before) {
            return false;
        }
    }
    if let Some(after) = opts.after_date {
        if !a.date.is_some_and(|date| date > after) {
            return false;
        }
    }
    if score_gate {
        let Some(score) = c.score else {
            return false;
        };
        if opts.min_score.is_some_and(|min| score < min)
            || opts.max_score.is_some_and(|max| score > max)
        {
            return false;
        }
    }
    true
}

fn compare(a: &Candidate, b: &Candidate, opts: &QueryOptions, per_user: bool) -> Ordering {
    let directed = |ord: Ordering| match opts.sort_order {
        SortOrder::Ascending => ord,
        SortOrder::Descending => ord.reverse(),
    };
    let mut ord = Ordering::Equal;
    if opts.high_scored_first {
        ord = b.score.cmp(&a.score);
    }
    if per_user && opts.unread_first {
        ord = ord.then(b.unread.cmp(&a.unread));
    }
    if opts.sort_field == SortField::Date {
        // Option orders None first, like SQLite orders NULL.
        ord = ord.then_with(|| directed(a.article.date.cmp(&b.article.date)));
    }
    ord.then_with(|| directed(a.article.id.cmp(&b.article.id)))
}

/// Runs the option pipeline for one query kind.
fn select(
    txn: &Txn<'_>,
    kind: QueryKind,
    user: Option<&User>,
    opts: &QueryOptions,
) -> StoreResult<Vec<Candidate>> {
    opts.validate(kind)?;
    let user_uid = match user {
        Some(user) => match user_uid(txn, &user.login)? {
            Some(uid) => Some(uid),
            None => return Ok(Vec::new()),
        },
        None => None,
    };
    let per_user = user_uid.is_some();
    let ordered = matches!(kind, QueryKind::Articles { .. } | QueryKind::ArticleIds);
    let score_gate = if ordered {
        opts.needs_scores()
    } else {
        opts.min_score.is_some() || opts.max_score.is_some()
    };

    let mut rows: Vec<Candidate> = candidates(txn, user_uid)?
        .into_iter()
        .filter(|c| matches(c, opts, score_gate))
        .collect();
    if !ordered {
        return Ok(rows);
    }
    rows.sort_by(|a, b| compare(a, b, opts, per_user));
    let limit = if opts.limit > 0 {
        opts.limit as usize
    } else {
        usize::MAX
    };
    Ok(rows
        .into_iter()
        .skip(opts.offset as usize)
        .take(limit)
        .collect())
}

fn into_articles(rows: Vec<Candidate>, per_user: bool, with_score: bool) -> Vec<Article> {
    rows.into_iter()
        .map(|c| Article {
            read: per_user && !c.unread,
            favorite: c.favorite,
            score: if with_score { c.score } else { None },
            ..c.article
        })
        .collect()
}

pub struct GraphArticleRepo {
    store: Arc<GraphStore>,
}

impl GraphArticleRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl ArticleRepo for GraphArticleRepo {
    fn articles(&self, user: &User, opts: &QueryOptions) -> StoreResult<Vec<Article>> {
        user.validate()?;
        debug!(
            "event=articles_list module=graph.article status=start login={} limit={} offset={}",
            user.login, opts.limit, opts.offset
        );
        let rows = self
            .store
            .view(|txn| select(txn, QueryKind::Articles { user: true }, Some(user), opts))
            .context(format!("getting articles of user {user}"))?;
        Ok(into_articles(rows, true, opts.needs_scores()))
    }

    fn all(&self, opts: &QueryOptions) -> StoreResult<Vec<Article>> {
        debug!(
            "event=articles_list module=graph.article status=start login=- limit={} offset={}",
            opts.limit, opts.offset
        );
        let rows = self
            .store
            .view(|txn| select(txn, QueryKind::Articles { user: false }, None, opts))
            .context("getting articles")?;
        Ok(into_articles(rows, false, opts.needs_scores()))
    }

    fn ids(&self, user: &User, opts: &QueryOptions) -> StoreResult<Vec<ArticleId>> {
        user.validate()?;
        debug!("event=article_ids module=graph.article status=start login={}", user.login);
        let rows = self
            .store
            .view(|txn| select(txn, QueryKind::ArticleIds, Some(user), opts))
            .context(format!("getting article ids of user {user}"))?;
        Ok(rows.into_iter().map(|c| c.article.id).collect())
    }

    fn count(&self, user: &User, opts: &QueryOptions) -> StoreResult<i64> {
        user.validate()?;
        debug!("event=article_count module=graph.article status=start login={}", user.login);
        let rows = self
            .store
            .view(|txn| select(txn, QueryKind::Count, Some(user), opts))
            .context(format!("getting article count of user {user}"))?;
        Ok(rows.len() as i64)
    }

    fn update_state(
        &self,
        user: &User,
        change: StateChange,
        opts: &QueryOptions,
    ) -> StoreResult<()> {
        user.validate()?;
        info!(
            "event=article_state module=graph.article status=start login={} change={:?}",
            user.login, change
        );
        let affected = self
            .store
            .with_txn(|txn| {
                let rows = select(txn, QueryKind::State(change), Some(user), opts)?;
                let Some(user_uid) = user_uid(txn, &user.login)? else {
                    return Ok(0);
                };
                let (predicate, wanted) = match change {
                    StateChange::Read(read) => ("unread", !read),
                    StateChange::Favorite(favorite) => ("favorite", favorite),
                };
                let refs: Vec<Value> = rows
                    .iter()
                    .filter(|c| c.marked(change) != wanted)
                    .map(|c| json!({ "uid": Uid(c.article.id.0) }))
                    .collect();
                if refs.is_empty() {
                    return Ok(0);
                }
                let affected = refs.len();
                let mut doc = Map::new();
                doc.insert("uid".to_string(), json!(user_uid));
                doc.insert(predicate.to_string(), Value::Array(refs));
                let mutation = if wanted {
                    Mutation::set(Value::Object(doc))
                } else {
                    Mutation::delete(Value::Object(doc))
                };
                txn.mutate(&mutation)?;
                Ok(affected)
            })
            .context(format!("updating {change:?} state of user {user}"))?;
        debug!(
            "event=article_state module=graph.article status=ok login={} affected={}",
            user.login, affected
        );
        Ok(())
    }

    fn remove_stale_unread(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        info!("event=article_stale_unread module=graph.article status=start before={before}");
        let removed = self
            .store
            .with_txn(|txn| {
                let query = GraphQuery::has("unread")
                    .select(&["uid"])
                    .edge("unread", fields(&["uid", "article.date"]));
                let views: Vec<UnreadView> = txn.query_as(&query, &Default::default())?;
                let mut mutation = Mutation::default();
                let mut removed = 0;
                for view in views {
                    let stale: Vec<Value> = view
                        .unread
                        .iter()
                        .filter(|article| article.date.is_some_and(|date| date < before))
                        .map(|article| json!({ "uid": article.uid }))
                        .collect();
                    if stale.is_empty() {
                        continue;
                    }
                    removed += stale.len();
                    mutation.delete.push(json!({ "uid": view.uid, "unread": stale }));
                }
                if !mutation.is_empty() {
                    txn.mutate(&mutation)?;
                }
                Ok(removed)
            })
            .context("removing stale unread markers")?;
        info!("event=article_stale_unread module=graph.article status=ok removed={removed}");
        Ok(removed)
    }
}
