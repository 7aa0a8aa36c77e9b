use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

use super::{FeedId, validate_link, validate_time};

/// Push-delivery lease for a feed; at most one per feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub feed_id: FeedId,
    /// Hub the lease was negotiated with.
    pub link: String,
    /// Lease length in seconds.
    pub lease_duration: i64,
    pub verification_time: Option<DateTime<Utc>>,
    pub subscription_failure: bool,
}

impl Subscription {
    pub fn validate(&self) -> StoreResult<()> {
        validate_link("subscription", &self.link)?;
        if !self.feed_id.is_set() {
            return Err(StoreError::validation(format!(
                "subscription {} has no feed",
                self.link
            )));
        }
        validate_time("subscription", self.verification_time)
    }

    /// Lease expiry, when the lease has been verified.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.verification_time
            .map(|verified| verified + chrono::Duration::seconds(self.lease_duration))
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.feed_id, self.link)
    }
}
