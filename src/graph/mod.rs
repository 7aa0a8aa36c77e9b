//! Graph backend: the repository contracts over an embedded node/edge
//! store, with identity resolved through unique attributes instead of
//! primary keys.

pub mod article;
pub mod derived;
pub mod feed;
pub mod query;
pub mod schema;
pub mod store;
pub mod subscription;
pub mod uid;
pub mod user;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    errors::StoreResult,
    repo::{
        ArticleRepo, ExtractRepo, FeedRepo, ScoresRepo, Service, SubscriptionRepo, ThumbnailRepo,
        UserRepo,
    },
};

pub use article::GraphArticleRepo;
pub use derived::{GraphExtractRepo, GraphScoresRepo, GraphThumbnailRepo};
pub use feed::GraphFeedRepo;
pub use query::{Field, GraphQuery, RootFunc, Term, Vars};
pub use store::{Assigned, GraphStore, Mutation, Txn};
pub use subscription::GraphSubscriptionRepo;
pub use uid::Uid;
pub use user::GraphUserRepo;

/// `{"uid": ...}` edge reference as it appears in mutations and results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UidRef {
    pub uid: Uid,
}

pub struct GraphService {
    store: Arc<GraphStore>,
    users: GraphUserRepo,
    feeds: GraphFeedRepo,
    articles: GraphArticleRepo,
    subscriptions: GraphSubscriptionRepo,
    thumbnails: GraphThumbnailRepo,
    scores: GraphScoresRepo,
    extracts: GraphExtractRepo,
}

impl GraphService {
    pub fn open(connect: &str) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(GraphStore::open(connect)?)))
    }

    pub fn new(store: Arc<GraphStore>) -> Self {
        Self {
            users: GraphUserRepo::new(Arc::clone(&store)),
            feeds: GraphFeedRepo::new(Arc::clone(&store)),
            articles: GraphArticleRepo::new(Arc::clone(&store)),
            subscriptions: GraphSubscriptionRepo::new(Arc::clone(&store)),
            thumbnails: GraphThumbnailRepo::new(Arc::clone(&store)),
            scores: GraphScoresRepo::new(Arc::clone(&store)),
            extracts: GraphExtractRepo::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }
}

impl Service for GraphService {
    fn backend_name(&self) -> &'static str {
        "graph"
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
