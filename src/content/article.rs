use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

use super::{FeedId, validate_link, validate_time};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ArticleId(pub i64);

impl ArticleId {
    pub fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ingested article as seen by one user (or by nobody, for userless
/// listings where `read`/`favorite` stay false).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub feed_id: FeedId,
    pub title: String,
    pub description: String,
    pub link: String,
    pub date: Option<DateTime<Utc>>,
    pub guid: Option<String>,
    pub read: bool,
    pub favorite: bool,
    pub thumbnail: String,
    pub thumbnail_link: String,
    pub score: Option<i64>,
}

impl Article {
    pub fn new<T: Into<String>, L: Into<String>>(title: T, link: L) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_link("article", &self.link)?;
        if !self.feed_id.is_set() {
            return Err(StoreError::validation(format!(
                "article {} has no feed",
                self.link
            )));
        }
        validate_time("article", self.date)
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.link)
    }
}
