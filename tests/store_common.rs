#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use feedstore::{
    Article, Feed, Service, User,
    graph::GraphService,
    sql::{HelperRegistry, SqlService},
};

pub fn sql_service() -> SqlService {
    SqlService::open(Arc::new(HelperRegistry::with_builtin()), "sqlite3", ":memory:")
        .expect("sql service")
}

pub fn graph_service() -> GraphService {
    GraphService::open(":memory:").expect("graph service")
}

/// One fresh in-memory service per backend.
pub fn services() -> Vec<Box<dyn Service>> {
    vec![Box::new(sql_service()), Box::new(graph_service())]
}

pub fn store_user(service: &dyn Service, login: &str) -> User {
    let mut user = User::new(login);
    user.email = format!("{login}@example.com");
    service.users().update(&user).expect("store user");
    user
}

pub fn store_feed(service: &dyn Service, link: &str) -> Feed {
    let mut feed = Feed::new(link);
    feed.title = format!("Title of {link}");
    feed.id = service.feeds().update(&feed).expect("store feed");
    feed
}

/// Reference instant with a sub-second part, so stored times must keep
/// full precision.
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 123_456_789).expect("timestamp")
}

/// `count` articles dated one hour apart, oldest first.
pub fn numbered_articles(host: &str, count: usize) -> Vec<Article> {
    (0..count)
        .map(|idx| {
            let mut article = Article::new(
                format!("Post {idx}"),
                format!("https://{host}/posts/{idx}"),
            );
            article.date = Some(epoch() + Duration::hours(idx as i64));
            article
        })
        .collect()
}

pub fn links(articles: &[Article]) -> Vec<String> {
    articles.iter().map(|article| article.link.clone()).collect()
}
