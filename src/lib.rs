//! Persistence core for a multi-user feed reader.
//!
//! Repository contracts live in [`repo`]; [`sql`] implements them with
//! composed, cached SQLite statements and [`graph`] with an embedded
//! node/edge store. [`backend_selector::open_service`] picks one at startup.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod backend_selector;
pub mod bench_utils;
pub mod client;
pub mod content;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod options;
pub mod repo;
pub mod sql;

pub use crate::backend_selector::{BackendKind, StoreConfig, open_service};
pub use crate::content::{
    Article, ArticleExtract, ArticleId, ArticleScores, ArticleThumbnail, Feed, FeedId, Login,
    ProfileData, Subscription, Tag, User,
};
pub use crate::errors::{ErrorKind, StoreError, StoreResult};
pub use crate::options::{QueryKind, QueryOptions, Scope, SortField, SortOrder, StateChange};
pub use crate::repo::{
    ArticleRepo, ExtractRepo, FeedRepo, ScoresRepo, Service, SubscriptionRepo, ThumbnailRepo,
    UserRepo,
};
