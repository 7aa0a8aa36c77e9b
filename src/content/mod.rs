//! Domain entities shared by every backend.
//!
//! Entities carry no storage identity beyond their natural keys; backends
//! that need one (graph uids) wrap them instead of extending them.

mod article;
mod derived;
mod feed;
mod subscription;
mod user;

pub use article::{Article, ArticleId};
pub use derived::{ArticleExtract, ArticleScores, ArticleThumbnail};
pub use feed::{Feed, FeedId, Tag};
pub use subscription::Subscription;
pub use user::{Login, ProfileData, User};

use chrono::{DateTime, Utc};

use crate::errors::{StoreError, StoreResult};

pub(crate) fn validate_link(what: &str, link: &str) -> StoreResult<()> {
    if link.trim().is_empty() {
        return Err(StoreError::validation(format!("{what} has no link")));
    }
    match url::Url::parse(link) {
        Ok(parsed) if parsed.has_host() => Ok(()),
        Ok(_) => Err(StoreError::validation(format!(
            "{what} link `{link}` has no host"
        ))),
        Err(err) => Err(StoreError::validation(format!(
            "{what} link `{link}` is not absolute: {err}"
        ))),
    }
}

/// Stored times must fit in a nanosecond count since the epoch.
pub(crate) fn validate_time(what: &str, time: Option<DateTime<Utc>>) -> StoreResult<()> {
    match time {
        Some(time) if time.timestamp_nanos_opt().is_none() => Err(StoreError::validation(
            format!("{what} time {time} is outside the storable range"),
        )),
        _ => Ok(()),
    }
}
