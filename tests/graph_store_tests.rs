mod store_common;

use feedstore::{
    Service, Tag, User,
    graph::{Field, GraphQuery, Mutation, Uid, query::vars},
};
use serde_json::{Value, json};
use store_common::{graph_service, numbered_articles, store_feed, store_user};

#[test]
fn test_profile_data_is_stored_as_json_text() {
    let service = graph_service();
    let mut user = User::new("alice");
    user.profile_data.insert("theme".into(), json!("dark"));
    user.md5_api = vec![1, 2, 3];
    service.users().update(&user).expect("update");

    let nodes = service
        .store()
        .view(|txn| {
            txn.query(
                &GraphQuery::eq("login", "$login").select(&["profileData", "md5api"]),
                &vars([("$login", "alice".to_string())]),
            )
        })
        .expect("query");
    assert_eq!(
        nodes,
        vec![json!({ "profileData": "{\"theme\":\"dark\"}", "md5api": "AQID" })]
    );
}

#[test]
fn test_ingestion_links_articles_to_feed_and_subscribers() {
    let service = graph_service();
    let bob = store_user(&service, "bob");
    let feed = store_feed(&service, "https://news.example.com/rss");
    service.feeds().attach_to(&feed, &bob).expect("attach");
    let added = service
        .feeds()
        .add_articles(&feed, &numbered_articles("news.example.com", 2))
        .expect("add");

    let nodes = service
        .store()
        .view(|txn| {
            txn.query(
                &GraphQuery::eq("login", "$login").edge("unread", vec![Field::Uid]),
                &vars([("$login", "bob".to_string())]),
            )
        })
        .expect("query");
    let unread: Vec<i64> = nodes[0]["unread"]
        .as_array()
        .expect("unread edges")
        .iter()
        .filter_map(|node| node["uid"].as_str())
        .filter_map(|uid| uid.parse::<Uid>().ok())
        .map(Uid::as_i64)
        .collect();
    let ids: Vec<i64> = added.iter().map(|article| article.id.0).collect();
    assert_eq!(unread, ids);
}

#[test]
fn test_user_delete_removes_tag_nodes() {
    let service = graph_service();
    let bob = store_user(&service, "bob");
    let feed = store_feed(&service, "https://news.example.com/rss");
    service.feeds().attach_to(&feed, &bob).expect("attach");
    service
        .feeds()
        .set_user_tags(&feed, &bob, &[Tag::new("tech")])
        .expect("tag");
    let before = service.store().node_count().expect("count");

    service.users().delete(&bob).expect("delete");
    assert_eq!(service.store().node_count().expect("count"), before - 2);
    let tags = service
        .store()
        .view(|txn| txn.query(&GraphQuery::has("tag.value").select(&["uid"]), &Default::default()))
        .expect("query");
    assert!(tags.is_empty());
    assert!(service.feeds().users(&feed).expect("users").is_empty());
}

#[test]
fn test_detach_drops_tags_left_without_feeds() {
    let service = graph_service();
    let bob = store_user(&service, "bob");
    let news = store_feed(&service, "https://news.example.com/rss");
    let blog = store_feed(&service, "https://blog.example.com/rss");
    for feed in [&news, &blog] {
        service.feeds().attach_to(feed, &bob).expect("attach");
    }
    service
        .feeds()
        .set_user_tags(&news, &bob, &[Tag::new("tech"), Tag::new("daily")])
        .expect("tag news");
    service
        .feeds()
        .set_user_tags(&blog, &bob, &[Tag::new("tech")])
        .expect("tag blog");
    let before = service.store().node_count().expect("count");

    service.feeds().detach_from(&news, &bob).expect("detach");
    assert_eq!(service.store().node_count().expect("count"), before - 1);
    let values: Vec<Value> = service
        .store()
        .view(|txn| {
            txn.query(&GraphQuery::has("tag.value").select(&["tag.value"]), &Default::default())
        })
        .expect("query");
    assert_eq!(values, vec![json!({ "tag.value": "tech" })]);
    assert_eq!(
        service.feeds().user_tags(&blog, &bob).expect("tags"),
        vec![Tag::new("tech")]
    );
}

#[test]
fn test_null_removes_a_predicate() {
    let service = graph_service();
    let store = service.store();
    let assigned = store
        .with_txn(|txn| {
            txn.mutate(&Mutation::set(
                json!({ "uid": "_:n", "feed.link": "https://a.example.com/", "feed.title": "A" }),
            ))
        })
        .expect("create");
    let uid = assigned["n"];
    store
        .with_txn(|txn| txn.mutate(&Mutation::set(json!({ "uid": uid, "feed.title": Value::Null }))))
        .expect("clear");
    let nodes = store
        .view(|txn| {
            txn.query(
                &GraphQuery::uid("$id").select(&["feed.link", "feed.title"]),
                &vars([("$id", uid.to_string())]),
            )
        })
        .expect("query");
    assert_eq!(nodes, vec![json!({ "feed.link": "https://a.example.com/" })]);
    let resolved = store
        .view(|txn| txn.resolve("feed.title", "A"))
        .expect("resolve");
    assert_eq!(resolved, None);
}

#[test]
fn test_nested_objects_must_be_references() {
    let service = graph_service();
    let err = service
        .store()
        .with_txn(|txn| {
            txn.mutate(&Mutation::set(
                json!({ "login": "eve", "profile": { "theme": "dark" } }),
            ))
        })
        .unwrap_err();
    assert!(matches!(err, feedstore::StoreError::Graph(_)));
    assert_eq!(service.store().node_count().expect("count"), 0);
}
