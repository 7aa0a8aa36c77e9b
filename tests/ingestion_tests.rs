mod store_common;

use chrono::Duration;
use feedstore::{Article, ErrorKind, FeedId, QueryOptions, Scope, Tag};
use store_common::{epoch, links, numbered_articles, services, store_feed, store_user};

#[test]
fn test_add_articles_skips_known_links() {
    for service in services() {
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        let batch = numbered_articles("news.example.com", 3);
        let added = service.feeds().add_articles(&feed, &batch).expect("first batch");
        assert_eq!(added.len(), 3);
        assert!(added.iter().all(|article| article.id.0 > 0 && article.feed_id == feed.id));

        let mut again = numbered_articles("news.example.com", 4);
        // Duplicates inside one batch collapse too.
        again.push(again[3].clone());
        let added = service.feeds().add_articles(&feed, &again).expect("second batch");
        assert_eq!(links(&added), vec!["https://news.example.com/posts/3"]);

        let all = service.articles().all(&QueryOptions::new()).expect("all");
        assert_eq!(all.len(), 4, "backend {}", service.backend_name());
    }
}

#[test]
fn test_relative_article_links_are_rejected() {
    for service in services() {
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        let err = service
            .feeds()
            .add_articles(&feed, &[Article::new("broken", "/posts/1")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(service.articles().all(&QueryOptions::new()).expect("all").is_empty());
    }
}

#[test]
fn test_new_articles_start_unread_for_current_subscribers_only() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let carol = store_user(service.as_ref(), "carol");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach bob");
        service
            .feeds()
            .add_articles(&feed, &numbered_articles("news.example.com", 5))
            .expect("add");
        service.feeds().attach_to(&feed, &carol).expect("attach carol");

        let unread = QueryOptions::new().unread_only();
        assert_eq!(service.articles().count(&bob, &unread).expect("bob"), 5);
        assert_eq!(service.articles().count(&carol, &unread).expect("carol"), 0);
        let visible = service
            .articles()
            .articles(&carol, &QueryOptions::new())
            .expect("carol listing");
        assert_eq!(visible.len(), 5, "backend {}", service.backend_name());
        assert!(visible.iter().all(|article| article.read));
    }
}

#[test]
fn test_attach_is_idempotent_and_detach_hides_articles() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");
        service.feeds().attach_to(&feed, &bob).expect("attach again");
        assert_eq!(service.feeds().for_user(&bob).expect("feeds").len(), 1);
        assert_eq!(service.feeds().users(&feed).expect("users").len(), 1);

        service
            .feeds()
            .add_articles(&feed, &numbered_articles("news.example.com", 2))
            .expect("add");
        service.feeds().detach_from(&feed, &bob).expect("detach");
        assert!(service.feeds().for_user(&bob).expect("feeds").is_empty());
        assert_eq!(service.articles().count(&bob, &QueryOptions::new()).expect("count"), 0);
    }
}

#[test]
fn test_attach_requires_stored_feed() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let err = service
            .feeds()
            .attach_to(&feedstore::Feed::new("https://news.example.com/rss"), &bob)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "backend {}", service.backend_name());
    }
}

#[test]
fn test_feed_update_is_keyed_by_link() {
    for service in services() {
        let mut feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        feed.title = "Renamed".into();
        feed.update_error = "timeout".into();
        let id = service.feeds().update(&feed).expect("update");
        assert_eq!(id, feed.id);

        let stored = service
            .feeds()
            .find_by_link("https://news.example.com/rss")
            .expect("find");
        assert_eq!(stored, feed);
        assert_eq!(service.feeds().all().expect("all").len(), 1);
        assert!(service.feeds().get(FeedId(9_999)).unwrap_err().is_not_found());
    }
}

#[test]
fn test_user_tags_round_trip() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");

        let tags = vec![Tag::new("tech"), Tag::new("daily"), Tag::new("tech")];
        service.feeds().set_user_tags(&feed, &bob, &tags).expect("set");
        assert_eq!(
            service.feeds().user_tags(&feed, &bob).expect("tags"),
            vec![Tag::new("daily"), Tag::new("tech")],
            "backend {}",
            service.backend_name()
        );

        service
            .feeds()
            .set_user_tags(&feed, &bob, &[Tag::new("weekly")])
            .expect("replace");
        assert_eq!(
            service.feeds().user_tags(&feed, &bob).expect("tags"),
            vec![Tag::new("weekly")]
        );

        service.feeds().set_user_tags(&feed, &bob, &[]).expect("clear");
        assert!(service.feeds().user_tags(&feed, &bob).expect("tags").is_empty());
    }
}

#[test]
fn test_tags_need_a_subscription() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        let err = service
            .feeds()
            .set_user_tags(&feed, &bob, &[Tag::new("tech")])
            .unwrap_err();
        assert!(err.is_not_found(), "backend {}", service.backend_name());
    }
}

#[test]
fn test_untagged_filter_skips_tagged_feeds() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let tagged = store_feed(service.as_ref(), "https://tagged.example.com/rss");
        let plain = store_feed(service.as_ref(), "https://plain.example.com/rss");
        for feed in [&tagged, &plain] {
            service.feeds().attach_to(feed, &bob).expect("attach");
        }
        service
            .feeds()
            .add_articles(&tagged, &numbered_articles("tagged.example.com", 2))
            .expect("add tagged");
        service
            .feeds()
            .add_articles(&plain, &numbered_articles("plain.example.com", 3))
            .expect("add plain");
        service
            .feeds()
            .set_user_tags(&tagged, &bob, &[Tag::new("tech"), Tag::new("news")])
            .expect("tag");

        let untagged = service
            .articles()
            .articles(&bob, &QueryOptions::new().untagged_only())
            .expect("untagged");
        assert_eq!(untagged.len(), 3, "backend {}", service.backend_name());
        assert!(untagged.iter().all(|article| article.feed_id == plain.id));
        assert_eq!(
            service
                .articles()
                .count(&bob, &QueryOptions::new().untagged_only().unread_only())
                .expect("count"),
            3
        );
    }
}

#[test]
fn test_feed_scope_limits_articles() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let first = store_feed(service.as_ref(), "https://first.example.com/rss");
        let second = store_feed(service.as_ref(), "https://second.example.com/rss");
        for (feed, host) in [(&first, "first.example.com"), (&second, "second.example.com")] {
            service.feeds().attach_to(feed, &bob).expect("attach");
            service
                .feeds()
                .add_articles(feed, &numbered_articles(host, 4))
                .expect("add");
        }
        let only_second = QueryOptions::new().scope(Scope::Feed(second.id));
        assert_eq!(service.articles().count(&bob, &only_second).expect("count"), 4);
        let both = QueryOptions::new().scope(Scope::Feeds(vec![first.id, second.id]));
        assert_eq!(service.articles().count(&bob, &both).expect("count"), 8);
        let none = QueryOptions::new().scope(Scope::Feeds(Vec::new()));
        assert_eq!(service.articles().count(&bob, &none).expect("count"), 0);
    }
}

#[test]
fn test_feed_delete_cascades() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        let keep = store_feed(service.as_ref(), "https://keep.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");
        service.feeds().attach_to(&keep, &bob).expect("attach");
        service
            .feeds()
            .set_user_tags(&feed, &bob, &[Tag::new("tech")])
            .expect("tag");
        service
            .feeds()
            .add_articles(&feed, &numbered_articles("news.example.com", 3))
            .expect("add");
        service
            .feeds()
            .add_articles(&keep, &numbered_articles("keep.example.com", 2))
            .expect("add");

        service.feeds().delete(&feed).expect("delete");
        assert!(service.feeds().get(feed.id).unwrap_err().is_not_found());
        assert_eq!(service.feeds().for_user(&bob).expect("feeds"), vec![keep.clone()]);
        let remaining = service.articles().all(&QueryOptions::new()).expect("all");
        assert_eq!(remaining.len(), 2, "backend {}", service.backend_name());
        assert_eq!(
            service
                .articles()
                .count(&bob, &QueryOptions::new().unread_only())
                .expect("count"),
            2
        );
    }
}

#[test]
fn test_remove_stale_unread() {
    for service in services() {
        let bob = store_user(service.as_ref(), "bob");
        let feed = store_feed(service.as_ref(), "https://news.example.com/rss");
        service.feeds().attach_to(&feed, &bob).expect("attach");
        let mut batch = numbered_articles("news.example.com", 6);
        batch[5].date = None;
        service.feeds().add_articles(&feed, &batch).expect("add");

        let cutoff = epoch() + Duration::hours(3);
        let removed = service
            .articles()
            .remove_stale_unread(cutoff)
            .expect("remove stale");
        assert_eq!(removed, 3, "backend {}", service.backend_name());

        let unread = service
            .articles()
            .articles(&bob, &QueryOptions::new().unread_only())
            .expect("unread");
        let mut unread_links = links(&unread);
        unread_links.sort();
        assert_eq!(
            unread_links,
            vec![
                "https://news.example.com/posts/3",
                "https://news.example.com/posts/4",
                "https://news.example.com/posts/5",
            ]
        );
    }
}
