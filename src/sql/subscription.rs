use std::sync::Arc;

use log::{debug, info};
use rusqlite::{OptionalExtension, Row, params, types::Value};

use crate::{
    content::{Feed, FeedId, Subscription},
    errors::{ResultExt, StoreError, StoreResult},
    repo::SubscriptionRepo,
};

use super::{
    article::{stored_time, time_value},
    db::{Args, Db},
    templates,
};

pub struct SqlSubscriptionRepo {
    db: Arc<Db>,
}

impl SqlSubscriptionRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        feed_id: FeedId(row.get(0)?),
        link: row.get(1)?,
        lease_duration: row.get(2)?,
        verification_time: stored_time(row.get(3)?),
        subscription_failure: row.get(4)?,
    })
}

fn subscription_args(subscription: &Subscription) -> Args {
    vec![
        (":feed_id".into(), Value::Integer(subscription.feed_id.0)),
        (":link".into(), Value::Text(subscription.link.clone())),
        (
            ":lease_duration".into(),
            Value::Integer(subscription.lease_duration),
        ),
        (
            ":verification_time".into(),
            time_value(subscription.verification_time),
        ),
        (
            ":subscription_failure".into(),
            Value::Integer(i64::from(subscription.subscription_failure)),
        ),
    ]
}

impl SubscriptionRepo for SqlSubscriptionRepo {
    fn get(&self, feed: &Feed) -> StoreResult<Subscription> {
        feed.validate_stored()?;
        debug!("event=subscription_get module=sql.subscription status=start feed={}", feed.id);
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::GET_SUBSCRIPTION, |stmt| {
                    stmt.query_row(params![feed.id.0], subscription_from_row)
                        .optional()
                        .context("executing subscription get stmt")
                })
            })
            .context(format!("getting subscription for feed {feed}"))?
            .ok_or_else(|| StoreError::not_found(format!("subscription for feed {feed}")))
    }

    fn all(&self) -> StoreResult<Vec<Subscription>> {
        debug!("event=subscription_all module=sql.subscription status=start");
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::ALL_SUBSCRIPTIONS, |stmt| {
                    stmt.query_map([], subscription_from_row)
                        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                        .context("executing subscription all stmt")
                })
            })
            .context("getting hubbub subscriptions")
    }

    fn update(&self, subscription: &Subscription) -> StoreResult<()> {
        subscription.validate()?;
        info!(
            "event=subscription_update module=sql.subscription status=start feed={}",
            subscription.feed_id
        );
        let args = subscription_args(subscription);
        self.db
            .with_tx(|s| {
                if s.execute(templates::UPDATE_SUBSCRIPTION, &args)? > 0 {
                    return Ok(());
                }
                s.execute(templates::CREATE_SUBSCRIPTION, &args)?;
                Ok(())
            })
            .map_err(|err| err.missing_parent(format!("feed {}", subscription.feed_id)))
            .context(format!("updating subscription {subscription}"))
    }
}
