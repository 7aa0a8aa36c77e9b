//! Declarative description of what an article query fetches or mutates.
//!
//! Every field defaults to "inactive"; any subset may be combined. Option
//! sets that cannot be honoured for a given query kind are rejected by
//! [`QueryOptions::validate`] instead of being silently dropped.

use chrono::{DateTime, Utc};

use crate::{
    content::{ArticleId, FeedId},
    errors::{StoreError, StoreResult},
};

/// Which articles a query ranges over.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    AllFeeds,
    Feed(FeedId),
    Feeds(Vec<FeedId>),
    Favorites,
    /// Article ids produced by an external search provider.
    Search(Vec<ArticleId>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Date,
    Id,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Target of a per-user state mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateChange {
    Read(bool),
    Favorite(bool),
}

/// Logical query the options are compiled into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Articles { user: bool },
    ArticleIds,
    Count,
    State(StateChange),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub scope: Scope,
    /// Zero means unlimited.
    pub limit: u32,
    pub offset: u32,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub unread_first: bool,
    pub high_scored_first: bool,
    pub unread_only: bool,
    pub read_only: bool,
    pub favorite_only: bool,
    pub untagged_only: bool,
    pub before_id: Option<ArticleId>,
    pub after_id: Option<ArticleId>,
    pub before_date: Option<DateTime<Utc>>,
    pub after_date: Option<DateTime<Utc>>,
    pub min_score: Option<i64>,
    pub max_score: Option<i64>,
    pub include_scores: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paging(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn sorting(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    pub fn unread_only(mut self) -> Self {
        self.unread_only = true;
        self
    }

    pub fn favorite_only(mut self) -> Self {
        self.favorite_only = true;
        self
    }

    pub fn untagged_only(mut self) -> Self {
        self.untagged_only = true;
        self
    }

    /// Favorites are requested either as a scope or as a filter.
    pub fn wants_favorites(&self) -> bool {
        self.favorite_only || self.scope == Scope::Favorites
    }

    pub fn filters_unread_state(&self) -> bool {
        self.unread_only || self.read_only
    }

    /// Scores must be joined whenever they are selected or filtered on.
    pub fn needs_scores(&self) -> bool {
        self.include_scores || self.min_score.is_some() || self.max_score.is_some()
    }

    fn uses_user_state(&self) -> bool {
        self.filters_unread_state()
            || self.wants_favorites()
            || self.untagged_only
            || self.unread_first
    }

    pub fn validate(&self, kind: QueryKind) -> StoreResult<()> {
        if self.unread_only && self.read_only {
            return Err(StoreError::invalid_options(
                "unread-only and read-only are mutually exclusive",
            ));
        }
        if let (Some(before), Some(after)) = (self.before_id, self.after_id) {
            if after >= before {
                return Err(StoreError::invalid_options(format!(
                    "after id {after} is not below before id {before}"
                )));
            }
        }
        if let (Some(before), Some(after)) = (self.before_date, self.after_date) {
            if after >= before {
                return Err(StoreError::invalid_options(format!(
                    "after date {after} is not earlier than before date {before}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_score, self.max_score) {
            if min > max {
                return Err(StoreError::invalid_options(format!(
                    "min score {min} exceeds max score {max}"
                )));
            }
        }

        match kind {
            QueryKind::Articles { user } => {
                if !user && self.uses_user_state() {
                    return Err(StoreError::invalid_options(
                        "read, favorite, tag filters and unread-first ordering need a user",
                    ));
                }
                self.validate_score_ordering()
            }
            QueryKind::ArticleIds => self.validate_score_ordering(),
            QueryKind::Count => {
                if self.limit > 0 || self.offset > 0 {
                    return Err(StoreError::invalid_options("count does not support paging"));
                }
                if self.unread_first || self.high_scored_first {
                    return Err(StoreError::invalid_options("count does not support ordering"));
                }
                Ok(())
            }
            QueryKind::State(change) => {
                if self.limit > 0 || self.offset > 0 {
                    return Err(StoreError::invalid_options(format!(
                        "{change:?} does not support paging"
                    )));
                }
                if self.unread_first || self.high_scored_first {
                    return Err(StoreError::invalid_options(format!(
                        "{change:?} does not support ordering"
                    )));
                }
                Ok(())
            }
        }
    }

    fn validate_score_ordering(&self) -> StoreResult<()> {
        if self.high_scored_first && !self.include_scores {
            return Err(StoreError::invalid_options(
                "high-scored-first ordering needs include_scores",
            ));
        }
        Ok(())
    }
}
