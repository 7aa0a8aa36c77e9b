use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

use super::validate_link;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FeedId(pub i64);

impl FeedId {
    pub fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    pub link: String,
    pub title: String,
    pub description: String,
    pub site_link: String,
    pub hub_link: String,
    pub update_error: String,
    pub subscribe_error: String,
}

impl Feed {
    pub fn new<T: Into<String>>(link: T) -> Self {
        Self {
            link: link.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_link("feed", &self.link)
    }

    /// Validation for operations that address a stored feed.
    pub(crate) fn validate_stored(&self) -> StoreResult<()> {
        self.validate()?;
        if !self.id.is_set() {
            return Err(StoreError::validation(format!(
                "feed {} has no id",
                self.link
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.link)
    }
}

/// Per-user label attached to a subscribed feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new<T: Into<String>>(value: T) -> Self {
        Tag(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.0.trim().is_empty() {
            return Err(StoreError::validation("tag has no value"));
        }
        Ok(())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
