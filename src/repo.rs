//! Repository contracts consumed by the API, auth and feed-manager layers.
//! Each backend provides one implementation per trait, bundled in a
//! [`Service`].

use chrono::{DateTime, Utc};

use crate::{
    content::{
        Article, ArticleExtract, ArticleId, ArticleScores, ArticleThumbnail, Feed, FeedId, Login,
        Subscription, Tag, User,
    },
    errors::StoreResult,
    options::{QueryOptions, StateChange},
};

pub trait UserRepo: Send + Sync {
    fn get(&self, login: &Login) -> StoreResult<User>;
    fn all(&self) -> StoreResult<Vec<User>>;
    fn update(&self, user: &User) -> StoreResult<()>;
    /// Deleting a user that does not exist is a no-op.
    fn delete(&self, user: &User) -> StoreResult<()>;
    fn find_by_md5(&self, hash: &[u8]) -> StoreResult<User>;
}

pub trait FeedRepo: Send + Sync {
    fn get(&self, id: FeedId) -> StoreResult<Feed>;
    fn find_by_link(&self, link: &str) -> StoreResult<Feed>;
    fn for_user(&self, user: &User) -> StoreResult<Vec<Feed>>;
    fn all(&self) -> StoreResult<Vec<Feed>>;
    /// Creates or updates the feed keyed by its link and returns its id.
    fn update(&self, feed: &Feed) -> StoreResult<FeedId>;
    fn delete(&self, feed: &Feed) -> StoreResult<()>;
    fn attach_to(&self, feed: &Feed, user: &User) -> StoreResult<()>;
    fn detach_from(&self, feed: &Feed, user: &User) -> StoreResult<()>;
    fn users(&self, feed: &Feed) -> StoreResult<Vec<User>>;
    /// Stores the articles not yet known for the feed and returns them with
    /// their ids. New articles start unread for every current subscriber.
    fn add_articles(&self, feed: &Feed, articles: &[Article]) -> StoreResult<Vec<Article>>;
    fn set_user_tags(&self, feed: &Feed, user: &User, tags: &[Tag]) -> StoreResult<()>;
    fn user_tags(&self, feed: &Feed, user: &User) -> StoreResult<Vec<Tag>>;
}

pub trait ArticleRepo: Send + Sync {
    /// Articles visible to the user, with read/favorite state.
    fn articles(&self, user: &User, opts: &QueryOptions) -> StoreResult<Vec<Article>>;
    /// Articles regardless of any user.
    fn all(&self, opts: &QueryOptions) -> StoreResult<Vec<Article>>;
    fn ids(&self, user: &User, opts: &QueryOptions) -> StoreResult<Vec<ArticleId>>;
    fn count(&self, user: &User, opts: &QueryOptions) -> StoreResult<i64>;
    fn update_state(
        &self,
        user: &User,
        change: StateChange,
        opts: &QueryOptions,
    ) -> StoreResult<()>;
    /// Drops unread markers of articles published before the cutoff.
    fn remove_stale_unread(&self, before: DateTime<Utc>) -> StoreResult<usize>;
}

pub trait SubscriptionRepo: Send + Sync {
    fn get(&self, feed: &Feed) -> StoreResult<Subscription>;
    fn all(&self) -> StoreResult<Vec<Subscription>>;
    fn update(&self, subscription: &Subscription) -> StoreResult<()>;
}

pub trait ThumbnailRepo: Send + Sync {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleThumbnail>;
    fn update(&self, thumbnail: &ArticleThumbnail) -> StoreResult<()>;
}

pub trait ScoresRepo: Send + Sync {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleScores>;
    fn update(&self, scores: &ArticleScores) -> StoreResult<()>;
}

pub trait ExtractRepo: Send + Sync {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleExtract>;
    fn update(&self, extract: &ArticleExtract) -> StoreResult<()>;
}

/// One backend's full set of repositories.
pub trait Service: Send + Sync {
    fn backend_name(&self) -> &'static str;
    fn users(&self) -> &dyn UserRepo;
    fn feeds(&self) -> &dyn FeedRepo;
    fn articles(&self) -> &dyn ArticleRepo;
    fn subscriptions(&self) -> &dyn SubscriptionRepo;
    fn thumbnails(&self) -> &dyn ThumbnailRepo;
    fn scores(&self) -> &dyn ScoresRepo;
    fn extracts(&self) -> &dyn ExtractRepo;
}
