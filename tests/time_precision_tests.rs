mod store_common;

use chrono::Duration;
use feedstore::{Article, QueryOptions, SortField, SortOrder, Subscription};
use store_common::{epoch, services, store_feed, store_user};

fn dated(link: &str, offset_ms: i64) -> Article {
    let mut article = Article::new(link, link);
    article.date = Some(epoch() + Duration::milliseconds(offset_ms));
    article
}

#[test]
fn test_verification_time_keeps_nanoseconds() {
    for service in services() {
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        let subscription = Subscription {
            feed_id: feed.id,
            link: "https://hub.example.com/".into(),
            lease_duration: 600,
            verification_time: Some(epoch()),
            subscription_failure: false,
        };
        service.subscriptions().update(&subscription).expect("update");
        assert_eq!(
            service.subscriptions().get(&feed).expect("get"),
            subscription,
            "backend {}",
            service.backend_name()
        );
    }
}

#[test]
fn test_article_dates_survive_ingestion_and_listing() {
    let mut listed = Vec::new();
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");
        let added = service
            .feeds()
            .add_articles(&feed, &[dated("https://news.example.com/a", 500)])
            .expect("add");
        assert_eq!(added[0].date, Some(epoch() + Duration::milliseconds(500)));

        let articles = service
            .articles()
            .articles(&bob, &QueryOptions::new())
            .expect("list");
        assert_eq!(
            articles[0].date, added[0].date,
            "backend {}",
            service.backend_name()
        );
        listed.push(articles[0].date);
    }
    assert_eq!(listed[0], listed[1]);
}

#[test]
fn test_date_filters_split_a_single_second() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");
        service
            .feeds()
            .add_articles(
                &feed,
                &[
                    dated("https://news.example.com/late", 600),
                    dated("https://news.example.com/early", 200),
                ],
            )
            .expect("add");
        let cutoff = epoch() + Duration::milliseconds(400);

        let mut before = QueryOptions::new();
        before.before_date = Some(cutoff);
        let early = service.articles().articles(&bob, &before).expect("before");
        assert_eq!(
            early.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(),
            vec!["https://news.example.com/early"],
            "backend {}",
            service.backend_name()
        );

        let mut after = QueryOptions::new();
        after.after_date = Some(cutoff);
        assert_eq!(service.articles().count(&bob, &after).expect("after"), 1);

        let ascending = service
            .articles()
            .articles(
                &bob,
                &QueryOptions::new().sorting(SortField::Date, SortOrder::Ascending),
            )
            .expect("sorted");
        assert_eq!(
            ascending.iter().map(|a| a.link.as_str()).collect::<Vec<_>>(),
            vec!["https://news.example.com/early", "https://news.example.com/late"],
            "backend {}",
            service.backend_name()
        );
    }
}

#[test]
fn test_stale_unread_cutoff_honours_sub_second_dates() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");
        service
            .feeds()
            .add_articles(
                &feed,
                &[
                    dated("https://news.example.com/old", 100),
                    dated("https://news.example.com/new", 900),
                ],
            )
            .expect("add");
        let removed = service
            .articles()
            .remove_stale_unread(epoch() + Duration::milliseconds(500))
            .expect("remove");
        assert_eq!(removed, 1, "backend {}", service.backend_name());
        assert_eq!(
            service
                .articles()
                .count(&bob, &QueryOptions::new().unread_only())
                .expect("count"),
            1
        );
    }
}
