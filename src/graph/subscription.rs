use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    content::{Feed, FeedId, Subscription},
    errors::{ResultExt, StoreError, StoreResult},
    repo::SubscriptionRepo,
};

use super::{
    feed::feed_uid,
    query::{GraphQuery, vars},
    store::{GraphStore, Mutation},
    uid::Uid,
};

const SUBSCRIPTION_FIELDS: &[&str] = &[
    "uid",
    "hub.link",
    "hub.leaseDuration",
    "hub.verificationTime",
    "hub.failure",
];

/// Lease predicates, stored on the feed node they belong to.
#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionNode {
    uid: Uid,
    #[serde(rename = "hub.link")]
    link: String,
    #[serde(rename = "hub.leaseDuration", default)]
    lease_duration: i64,
    #[serde(rename = "hub.verificationTime", default)]
    verification_time: Option<DateTime<Utc>>,
    #[serde(rename = "hub.failure", default)]
    failure: bool,
}

impl From<SubscriptionNode> for Subscription {
    fn from(node: SubscriptionNode) -> Self {
        Subscription {
            feed_id: FeedId(node.uid.as_i64()),
            link: node.link,
            lease_duration: node.lease_duration,
            verification_time: node.verification_time,
            subscription_failure: node.failure,
        }
    }
}

pub struct GraphSubscriptionRepo {
    store: Arc<GraphStore>,
}

impl GraphSubscriptionRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl SubscriptionRepo for GraphSubscriptionRepo {
    fn get(&self, feed: &Feed) -> StoreResult<Subscription> {
        feed.validate_stored()?;
        debug!("event=subscription_get module=graph.subscription status=start feed={}", feed.id);
        let nodes: Vec<SubscriptionNode> = self
            .store
            .view(|txn| {
                let Some(uid) = feed_uid(txn, feed.id)? else {
                    return Ok(Vec::new());
                };
                if !txn.node_has(uid, "hub.link")? {
                    return Ok(Vec::new());
                }
                txn.query_as(
                    &GraphQuery::uid("$feed").select(SUBSCRIPTION_FIELDS),
                    &vars([("$feed", uid.to_string())]),
                )
            })
            .context(format!("getting subscription for feed {feed}"))?;
        nodes
            .into_iter()
            .next()
            .map(Subscription::from)
            .ok_or_else(|| StoreError::not_found(format!("subscription for feed {feed}")))
    }

    fn all(&self) -> StoreResult<Vec<Subscription>> {
        debug!("event=subscription_all module=graph.subscription status=start");
        let nodes: Vec<SubscriptionNode> = self
            .store
            .view(|txn| {
                txn.query_as(
                    &GraphQuery::has("hub.link").select(SUBSCRIPTION_FIELDS),
                    &Default::default(),
                )
            })
            .context("getting hubbub subscriptions")?;
        Ok(nodes.into_iter().map(Subscription::from).collect())
    }

    fn update(&self, subscription: &Subscription) -> StoreResult<()> {
        subscription.validate()?;
        info!(
            "event=subscription_update module=graph.subscription status=start feed={}",
            subscription.feed_id
        );
        self.store
            .with_txn(|txn| {
                let uid = feed_uid(txn, subscription.feed_id)?.ok_or_else(|| {
                    StoreError::not_found(format!("feed {}", subscription.feed_id))
                })?;
                let node = SubscriptionNode {
                    uid,
                    link: subscription.link.clone(),
                    lease_duration: subscription.lease_duration,
                    verification_time: subscription.verification_time,
                    failure: subscription.subscription_failure,
                };
                let doc = serde_json::to_value(&node).context("encoding subscription node")?;
                txn.mutate(&Mutation::set(doc))?;
                Ok(())
            })
            .context(format!("updating subscription {subscription}"))
    }
}
