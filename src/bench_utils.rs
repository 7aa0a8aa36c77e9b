//! Seeded synthetic feed-reader datasets for benches and tests.

use chrono::{DateTime, Duration};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    content::{Article, ArticleId, ArticleScores, Feed, FeedId, User},
    errors::StoreResult,
    options::{QueryOptions, Scope, StateChange},
    repo::Service,
};

#[derive(Clone, Copy, Debug)]
pub struct DatasetShape {
    pub users: usize,
    pub feeds: usize,
    pub articles_per_feed: usize,
    pub feeds_per_user: usize,
    /// Probability that an article gets a scores record.
    pub scored: f64,
}

impl Default for DatasetShape {
    fn default() -> Self {
        Self {
            users: 4,
            feeds: 8,
            articles_per_feed: 50,
            feeds_per_user: 3,
            scored: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FeedDataset {
    pub users: Vec<User>,
    pub feeds: Vec<Feed>,
    /// Articles per feed, indexed like `feeds`.
    pub articles: Vec<Vec<Article>>,
    /// `(user index, feed index)` subscriptions, deduplicated.
    pub subscriptions: Vec<(usize, usize)>,
    pub seed: u64,
    shape: DatasetShape,
}

impl FeedDataset {
    pub fn article_count(&self) -> usize {
        self.articles.iter().map(Vec::len).sum()
    }

    /// Indexes of the feeds `user` subscribes to.
    pub fn feeds_of(&self, user: usize) -> Vec<usize> {
        self.subscriptions
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, f)| *f)
            .collect()
    }
}

/// Stored ids of a seeded dataset.
#[derive(Clone, Debug, Default)]
pub struct SeededIds {
    pub feeds: Vec<FeedId>,
    pub articles: Vec<ArticleId>,
}

pub fn generate_dataset(shape: DatasetShape, seed: u64) -> FeedDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let epoch = DateTime::from_timestamp(1_600_000_000, 0).unwrap_or_default();

    let users = (0..shape.users)
        .map(|idx| {
            let mut user = User::new(format!("user{idx}"));
            user.email = format!("user{idx}@example.com");
            user.md5_api = format!("api-{idx}").into_bytes();
            user
        })
        .collect();

    let feeds: Vec<Feed> = (0..shape.feeds)
        .map(|idx| {
            let mut feed = Feed::new(format!("https://feed{idx}.example.com/rss"));
            feed.title = format!("Feed {idx}");
            feed
        })
        .collect();

    let articles = (0..shape.feeds)
        .map(|feed| {
            (0..shape.articles_per_feed)
                .map(|idx| {
                    let mut article = Article::new(
                        format!("Article {feed}/{idx}"),
                        format!("https://feed{feed}.example.com/posts/{idx}"),
                    );
                    // A few undated articles exercise NULL ordering.
                    if rng.gen_bool(0.95) {
                        let offset = rng.gen_range(0..86_400_000_i64 * 365);
                        article.date = Some(epoch + Duration::milliseconds(offset));
                    }
                    article.guid = Some(format!("guid-{feed}-{idx}"));
                    article
                })
                .collect()
        })
        .collect();

    let mut subscriptions = Vec::new();
    if shape.feeds > 0 {
        for user in 0..shape.users {
            let mut picked = Vec::new();
            while picked.len() < shape.feeds_per_user.min(shape.feeds) {
                let feed = rng.gen_range(0..shape.feeds);
                if !picked.contains(&feed) {
                    picked.push(feed);
                }
            }
            picked.sort_unstable();
            subscriptions.extend(picked.into_iter().map(|feed| (user, feed)));
        }
    }

    FeedDataset {
        users,
        feeds,
        articles,
        subscriptions,
        seed,
        shape,
    }
}

/// Loads the dataset through the repository contracts: users, feeds and
/// subscriptions first so ingestion marks articles unread, then scores and a
/// seeded share of read and favorite state.
pub fn seed_service(service: &dyn Service, dataset: &FeedDataset) -> StoreResult<SeededIds> {
    let mut rng = StdRng::seed_from_u64(dataset.seed.wrapping_add(1));
    for user in &dataset.users {
        service.users().update(user)?;
    }

    let mut ids = SeededIds::default();
    let mut stored = Vec::with_capacity(dataset.feeds.len());
    for feed in &dataset.feeds {
        let mut feed = feed.clone();
        feed.id = service.feeds().update(&feed)?;
        ids.feeds.push(feed.id);
        stored.push(feed);
    }
    for (user, feed) in &dataset.subscriptions {
        service.feeds().attach_to(&stored[*feed], &dataset.users[*user])?;
    }

    for (feed, articles) in stored.iter().zip(&dataset.articles) {
        for article in service.feeds().add_articles(feed, articles)? {
            if rng.gen_bool(dataset.shape.scored) {
                let scores = ArticleScores {
                    article_id: article.id,
                    score1: rng.gen_range(0..100),
                    score2: rng.gen_range(0..100),
                    ..ArticleScores::default()
                };
                let scores = ArticleScores {
                    score: scores.calculate(),
                    ..scores
                };
                service.scores().update(&scores)?;
            }
            ids.articles.push(article.id);
        }
    }

    for user in &dataset.users {
        let read: Vec<ArticleId> = ids
            .articles
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.3))
            .collect();
        let favorite: Vec<ArticleId> = read
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.2))
            .collect();
        let articles = service.articles();
        articles.update_state(
            user,
            StateChange::Read(true),
            &QueryOptions::new().scope(Scope::Search(read)),
        )?;
        articles.update_state(
            user,
            StateChange::Favorite(true),
            &QueryOptions::new().scope(Scope::Search(favorite)),
        )?;
    }
    Ok(ids)
}
