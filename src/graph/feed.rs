use std::sync::Arc;

use ahash::AHashSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    content::{Article, ArticleId, Feed, FeedId, Tag, User, validate_link},
    errors::{ResultExt, StoreError, StoreResult},
    repo::FeedRepo,
};

use super::{
    UidRef,
    article::ArticleNode,
    query::{Field, GraphQuery, Vars, fields, vars},
    store::{GraphStore, Mutation, Txn},
    uid::Uid,
    user::{USER_FIELDS, UserNode, require_user, sorted_users, user_uid},
};

pub(crate) const FEED_FIELDS: &[&str] = &[
    "uid",
    "feed.link",
    "feed.title",
    "feed.description",
    "feed.siteLink",
    "feed.hubLink",
    "feed.updateError",
    "feed.subscribeError",
];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct FeedNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    #[serde(rename = "feed.link")]
    pub link: String,
    #[serde(rename = "feed.title", default)]
    pub title: String,
    #[serde(rename = "feed.description", default)]
    pub description: String,
    #[serde(rename = "feed.siteLink", default)]
    pub site_link: String,
    #[serde(rename = "feed.hubLink", default)]
    pub hub_link: String,
    #[serde(rename = "feed.updateError", default)]
    pub update_error: String,
    #[serde(rename = "feed.subscribeError", default)]
    pub subscribe_error: String,
}

impl FeedNode {
    fn from_feed(feed: &Feed, uid: Option<Uid>) -> Self {
        Self {
            uid,
            link: feed.link.clone(),
            title: feed.title.clone(),
            description: feed.description.clone(),
            site_link: feed.site_link.clone(),
            hub_link: feed.hub_link.clone(),
            update_error: feed.update_error.clone(),
            subscribe_error: feed.subscribe_error.clone(),
        }
    }
}

impl From<FeedNode> for Feed {
    fn from(node: FeedNode) -> Self {
        Feed {
            id: FeedId(node.uid.map_or(0, Uid::as_i64)),
            link: node.link,
            title: node.title,
            description: node.description,
            site_link: node.site_link,
            hub_link: node.hub_link,
            update_error: node.update_error,
            subscribe_error: node.subscribe_error,
        }
    }
}

/// Uid of the feed node, or `None` when the id names no feed.
pub(crate) fn feed_uid(txn: &Txn<'_>, id: FeedId) -> StoreResult<Option<Uid>> {
    let uid = Uid(id.0);
    Ok(txn.node_has(uid, "feed.link")?.then_some(uid))
}

pub(crate) fn require_feed(txn: &Txn<'_>, feed: &Feed) -> StoreResult<Uid> {
    feed_uid(txn, feed.id)?.ok_or_else(|| StoreError::not_found(format!("feed {feed}")))
}

/// Uids found under `predicate` of every returned node.
pub(crate) fn edge_uids(nodes: &[Value], predicate: &str) -> Vec<Uid> {
    nodes
        .iter()
        .filter_map(|node| node.get(predicate).and_then(Value::as_array))
        .flatten()
        .filter_map(|target| target.get("uid").and_then(Value::as_str))
        .filter_map(|uid| uid.parse().ok())
        .collect()
}

#[derive(Deserialize)]
struct Subscribed {
    #[serde(default)]
    subscribed: Vec<FeedNode>,
}

#[derive(Deserialize)]
struct Subscribers {
    #[serde(rename = "~subscribed", default)]
    subscribers: Vec<UserNode>,
}

#[derive(Deserialize)]
struct TagNode {
    uid: Uid,
    #[serde(rename = "tag.value", default)]
    value: String,
    #[serde(rename = "tag.feeds", default)]
    feeds: Vec<UidRef>,
}

#[derive(Deserialize)]
struct UserTags {
    #[serde(default)]
    tag: Vec<TagNode>,
}

fn user_tag_nodes(txn: &Txn<'_>, user: Uid) -> StoreResult<Vec<TagNode>> {
    let query = GraphQuery::uid("$id").edge(
        "tag",
        vec![
            Field::Uid,
            Field::Scalar("tag.value".into()),
            Field::edge("tag.feeds", fields(&["uid"])),
        ],
    );
    let nodes: Vec<UserTags> = txn.query_as(&query, &vars([("$id", user.to_string())]))?;
    Ok(nodes.into_iter().flat_map(|node| node.tag).collect())
}

fn feed_vars(uid: Uid) -> Vars {
    vars([("$feed", uid.to_string())])
}

pub struct GraphFeedRepo {
    store: Arc<GraphStore>,
}

impl GraphFeedRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    fn query_feeds(&self, query: GraphQuery, vars: Vars) -> StoreResult<Vec<Feed>> {
        let nodes: Vec<FeedNode> = self.store.view(|txn| txn.query_as(&query, &vars))?;
        Ok(nodes.into_iter().map(Feed::from).collect())
    }
}

impl FeedRepo for GraphFeedRepo {
    fn get(&self, id: FeedId) -> StoreResult<Feed> {
        if !id.is_set() {
            return Err(StoreError::validation("feed id is not set"));
        }
        debug!("event=feed_get module=graph.feed status=start id={id}");
        let nodes: Vec<FeedNode> = self
            .store
            .view(|txn| {
                let Some(uid) = feed_uid(txn, id)? else {
                    return Ok(Vec::new());
                };
                txn.query_as(&GraphQuery::uid("$feed").select(FEED_FIELDS), &feed_vars(uid))
            })
            .context(format!("getting feed {id}"))?;
        nodes
            .into_iter()
            .next()
            .map(Feed::from)
            .ok_or_else(|| StoreError::not_found(format!("feed {id}")))
    }

    fn find_by_link(&self, link: &str) -> StoreResult<Feed> {
        validate_link("feed", link)?;
        debug!("event=feed_find_by_link module=graph.feed status=start link={link}");
        self.query_feeds(
            GraphQuery::eq("feed.link", "$link").select(FEED_FIELDS),
            vars([("$link", link.to_string())]),
        )
        .context(format!("getting feed by link {link}"))?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::not_found(format!("feed {link}")))
    }

    fn for_user(&self, user: &User) -> StoreResult<Vec<Feed>> {
        user.validate()?;
        debug!("event=feed_for_user module=graph.feed status=start login={}", user.login);
        let nodes: Vec<Subscribed> = self
            .store
            .view(|txn| {
                let Some(uid) = user_uid(txn, &user.login)? else {
                    return Ok(Vec::new());
                };
                txn.query_as(
                    &GraphQuery::uid("$user").edge("subscribed", fields(FEED_FIELDS)),
                    &vars([("$user", uid.to_string())]),
                )
            })
            .context(format!("getting feeds of user {user}"))?;
        Ok(nodes
            .into_iter()
            .flat_map(|node| node.subscribed)
            .map(Feed::from)
            .collect())
    }

    fn all(&self) -> StoreResult<Vec<Feed>> {
        debug!("event=feed_all module=graph.feed status=start");
        self.query_feeds(GraphQuery::has("feed.link").select(FEED_FIELDS), Default::default())
            .context("getting all feeds")
    }

    fn update(&self, feed: &Feed) -> StoreResult<FeedId> {
        feed.validate()?;
        info!("event=feed_update module=graph.feed status=start link={}", feed.link);
        self.store
            .with_txn(|txn| {
                let uid = txn.resolve("feed.link", &feed.link)?;
                let mut doc = serde_json::to_value(FeedNode::from_feed(feed, uid))
                    .context("encoding feed node")?;
                if uid.is_none() {
                    doc["uid"] = json!("_:feed");
                }
                let assigned = txn.mutate(&Mutation::set(doc))?;
                uid.or_else(|| assigned.get("feed").copied())
                    .map(|uid| FeedId(uid.as_i64()))
                    .ok_or_else(|| StoreError::graph("feed node was not assigned a uid"))
            })
            .context(format!("updating feed {}", feed.link))
    }

    fn delete(&self, feed: &Feed) -> StoreResult<()> {
        feed.validate_stored()?;
        info!("event=feed_delete module=graph.feed status=start id={}", feed.id);
        self.store
            .with_txn(|txn| {
                let Some(uid) = feed_uid(txn, feed.id)? else {
                    return Ok(());
                };
                let query = GraphQuery::uid("$feed").edge("~article.feed", fields(&["uid"]));
                let nodes = txn.query(&query, &feed_vars(uid))?;
                let mut mutation = Mutation::default();
                for article in edge_uids(&nodes, "~article.feed") {
                    mutation.delete.push(json!({ "uid": article }));
                }
                mutation.delete.push(json!({ "uid": uid }));
                txn.mutate(&mutation)?;
                Ok(())
            })
            .context(format!("deleting feed {feed}"))
    }

    fn attach_to(&self, feed: &Feed, user: &User) -> StoreResult<()> {
        feed.validate_stored()?;
        user.validate()?;
        info!(
            "event=feed_attach module=graph.feed status=start id={} login={}",
            feed.id, user.login
        );
        self.store
            .with_txn(|txn| {
                let feed_uid = require_feed(txn, feed)?;
                let user_uid = require_user(txn, user)?;
                txn.mutate(&Mutation::set(
                    json!({ "uid": user_uid, "subscribed": { "uid": feed_uid } }),
                ))?;
                Ok(())
            })
            .context(format!("attaching feed {feed} to user {user}"))
    }

    fn detach_from(&self, feed: &Feed, user: &User) -> StoreResult<()> {
        feed.validate_stored()?;
        user.validate()?;
        info!(
            "event=feed_detach module=graph.feed status=start id={} login={}",
            feed.id, user.login
        );
        self.store
            .with_txn(|txn| {
                let (Some(feed_uid), Some(user_uid)) =
                    (feed_uid(txn, feed.id)?, user_uid(txn, &user.login)?)
                else {
                    return Ok(());
                };
                let mut mutation =
                    Mutation::delete(json!({ "uid": user_uid, "subscribed": { "uid": feed_uid } }));
                for tag in user_tag_nodes(txn, user_uid)? {
                    if !tag.feeds.iter().any(|target| target.uid == feed_uid) {
                        continue;
                    }
                    // A tag left without feeds goes with its last edge.
                    if tag.feeds.len() == 1 {
                        mutation.delete.push(json!({ "uid": tag.uid }));
                    } else {
                        mutation
                            .delete
                            .push(json!({ "uid": tag.uid, "tag.feeds": { "uid": feed_uid } }));
                    }
                }
                txn.mutate(&mutation)?;
                Ok(())
            })
            .context(format!("detaching feed {feed} from user {user}"))
    }

    fn users(&self, feed: &Feed) -> StoreResult<Vec<User>> {
        feed.validate_stored()?;
        debug!("event=feed_users module=graph.feed status=start id={}", feed.id);
        let nodes: Vec<Subscribers> = self
            .store
            .view(|txn| {
                let Some(uid) = feed_uid(txn, feed.id)? else {
                    return Ok(Vec::new());
                };
                txn.query_as(
                    &GraphQuery::uid("$feed").edge("~subscribed", fields(USER_FIELDS)),
                    &feed_vars(uid),
                )
            })
            .context(format!("getting users of feed {feed}"))?;
        Ok(sorted_users(
            nodes.into_iter().flat_map(|node| node.subscribers).collect(),
        ))
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
            "event=feed_add_articles module=graph.feed status=start id={} candidates={}",
            feed.id,
            pending.len()
        );

        let added = self
            .store
            .with_txn(|txn| {
                let feed_uid = require_feed(txn, feed)?;
                let query = GraphQuery::uid("$feed")
                    .edge("~article.feed", fields(&["article.link"]))
                    .edge("~subscribed", fields(&["uid"]));
                let nodes = txn.query(&query, &feed_vars(feed_uid))?;
                let mut known: AHashSet<String> = nodes
                    .iter()
                    .filter_map(|node| node.get("~article.feed").and_then(Value::as_array))
                    .flatten()
                    .filter_map(|article| article.get("article.link").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                let subscribers = edge_uids(&nodes, "~subscribed");

                let mut added = Vec::new();
                for mut article in pending {
                    if !known.insert(article.link.clone()) {
                        continue;
                    }
                    let mut doc = serde_json::to_value(ArticleNode::from_article(&article, feed_uid))
                        .context("encoding article node")?;
                    doc["uid"] = json!("_:article");
                    let mut mutation = Mutation::set(doc);
                    for subscriber in &subscribers {
                        mutation
                            .set
                            .push(json!({ "uid": subscriber, "unread": { "uid": "_:article" } }));
                    }
                    let assigned = txn.mutate(&mutation)?;
                    let uid = assigned
                        .get("article")
                        .copied()
                        .ok_or_else(|| StoreError::graph("article node was not assigned a uid"))?;
                    article.id = ArticleId(uid.as_i64());
                    added.push(article);
                }
                Ok(added)
            })
            .context(format!("adding articles to feed {feed}"))?;

        info!(
            "event=feed_add_articles module=graph.feed status=ok id={} added={}",
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
            "event=feed_set_tags module=graph.feed status=start id={} login={} tags={}",
            feed.id,
            user.login,
            tags.len()
        );
        self.store
            .with_txn(|txn| {
                let feed_uid = feed_uid(txn, feed.id)?;
                let user_uid = user_uid(txn, &user.login)?;
                let (Some(feed_uid), Some(user_uid)) = (feed_uid, user_uid) else {
                    return Err(StoreError::not_found(format!("feed {feed} for user {user}")));
                };
                if !txn.has_edge(user_uid, "subscribed", feed_uid)? {
                    return Err(StoreError::not_found(format!("feed {feed} for user {user}")));
                }

                let existing = user_tag_nodes(txn, user_uid)?;
                let wanted: AHashSet<&str> = tags.iter().map(Tag::as_str).collect();
                let mut mutation = Mutation::default();
                for node in &existing {
                    let tagged = node.feeds.iter().any(|target| target.uid == feed_uid);
                    let keep = wanted.contains(node.value.as_str());
                    if tagged && !keep {
                        if node.feeds.len() == 1 {
                            mutation.delete.push(json!({ "uid": node.uid }));
                        } else {
                            mutation
                                .delete
                                .push(json!({ "uid": node.uid, "tag.feeds": { "uid": feed_uid } }));
                        }
                    } else if keep {
                        mutation
                            .set
                            .push(json!({ "uid": node.uid, "tag.feeds": { "uid": feed_uid } }));
                    }
                }

                let mut created = AHashSet::new();
                for tag in tags {
                    let known = existing.iter().any(|node| node.value == tag.as_str());
                    if known || !created.insert(tag.as_str()) {
                        continue;
                    }
                    let blank = format!("_:tag{}", created.len());
                    mutation.set.push(json!({
                        "uid": blank,
                        "tag.value": tag.as_str(),
                        "tag.feeds": { "uid": feed_uid },
                    }));
                    mutation
                        .set
                        .push(json!({ "uid": user_uid, "tag": { "uid": blank } }));
                }
                if !mutation.is_empty() {
                    txn.mutate(&mutation)?;
                }
                Ok(())
            })
            .context(format!("setting tags of feed {feed} for user {user}"))
    }

    fn user_tags(&self, feed: &Feed, user: &User) -> StoreResult<Vec<Tag>> {
        feed.validate_stored()?;
        user.validate()?;
        debug!(
            "event=feed_user_tags module=graph.feed status=start id={} login={}",
            feed.id, user.login
        );
        let nodes: Vec<TagNode> = self
            .store
            .view(|txn| {
                let (Some(feed_uid), Some(user_uid)) =
                    (feed_uid(txn, feed.id)?, user_uid(txn, &user.login)?)
                else {
                    return Ok(Vec::new());
                };
                let nodes = user_tag_nodes(txn, user_uid)?;
                Ok(nodes
                    .into_iter()
                    .filter(|node| node.feeds.iter().any(|target| target.uid == feed_uid))
                    .collect())
            })
            .context(format!("getting tags of feed {feed} for user {user}"))?;
        let mut tags: Vec<Tag> = nodes.into_iter().map(|node| Tag::new(node.value)).collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}
