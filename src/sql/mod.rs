//! Relational backend: composed, cached statements over one SQLite
//! connection, with dialect specifics behind [`dialect::Helper`].

pub mod article;
pub mod cache;
pub mod compose;
pub mod db;
pub mod derived;
pub mod dialect;
pub mod feed;
pub mod sqlite;
pub mod subscription;
pub mod templates;
pub mod user;

use std::sync::Arc;

use crate::{
    errors::StoreResult,
    repo::{
        ArticleRepo, ExtractRepo, FeedRepo, ScoresRepo, Service, SubscriptionRepo, ThumbnailRepo,
        UserRepo,
    },
};

pub use article::SqlArticleRepo;
pub use cache::CacheStats;
pub use compose::{ComposedQuery, compose};
pub use db::{DB_VERSION, Db};
pub use derived::{SqlExtractRepo, SqlScoresRepo, SqlThumbnailRepo};
pub use dialect::{Helper, HelperRegistry, Predicate};
pub use feed::SqlFeedRepo;
pub use sqlite::SqliteHelper;
pub use subscription::SqlSubscriptionRepo;
pub use user::SqlUserRepo;

pub struct SqlService {
    db: Arc<Db>,
    users: SqlUserRepo,
    feeds: SqlFeedRepo,
    articles: SqlArticleRepo,
    subscriptions: SqlSubscriptionRepo,
    thumbnails: SqlThumbnailRepo,
    scores: SqlScoresRepo,
    extracts: SqlExtractRepo,
}

impl SqlService {
    pub fn open(registry: Arc<HelperRegistry>, driver: &str, connect: &str) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(Db::open(registry, driver, connect)?)))
    }

    pub fn new(db: Arc<Db>) -> Self {
        Self {
            users: SqlUserRepo::new(Arc::clone(&db)),
            feeds: SqlFeedRepo::new(Arc::clone(&db)),
            articles: SqlArticleRepo::new(Arc::clone(&db)),
            subscriptions: SqlSubscriptionRepo::new(Arc::clone(&db)),
            thumbnails: SqlThumbnailRepo::new(Arc::clone(&db)),
            scores: SqlScoresRepo::new(Arc::clone(&db)),
            extracts: SqlExtractRepo::new(Arc::clone(&db)),
            db,
        }
    }

    pub fn db(&self) -> &Arc<Db> {
        &self.db
    }
}

impl Service for SqlService {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    fn users(&self) -> &dyn UserRepo {
        &self.users
    }

    fn feeds(&self) -> &dyn FeedRepo {
        &self.feeds
    }

    fn articles(&self) -> &dyn ArticleRepo {
        &self.articles
    }

    fn subscriptions(&self) -> &dyn SubscriptionRepo {
        &self.subscriptions
    }

    fn thumbnails(&self) -> &dyn ThumbnailRepo {
        &self.thumbnails
    }

    fn scores(&self) -> &dyn ScoresRepo {
        &self.scores
    }

    fn extracts(&self) -> &dyn ExtractRepo {
        &self.extracts
    }
}
