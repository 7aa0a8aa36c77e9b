mod store_common;

use chrono::{DateTime, Duration};
use feedstore::{
    QueryOptions, Scope, Service, SortField, SortOrder, User,
    bench_utils::{DatasetShape, FeedDataset, SeededIds, generate_dataset, seed_service},
};
use store_common::{graph_service, links, sql_service};

struct Seeded {
    service: Box<dyn Service>,
    ids: SeededIds,
}

fn seeded_pair(dataset: &FeedDataset) -> (Seeded, Seeded) {
    let sql: Box<dyn Service> = Box::new(sql_service());
    let graph: Box<dyn Service> = Box::new(graph_service());
    let sql_ids = seed_service(sql.as_ref(), dataset).expect("seed sql");
    let graph_ids = seed_service(graph.as_ref(), dataset).expect("seed graph");
    (
        Seeded {
            service: sql,
            ids: sql_ids,
        },
        Seeded {
            service: graph,
            ids: graph_ids,
        },
    )
}

fn dataset() -> FeedDataset {
    generate_dataset(
        DatasetShape {
            users: 3,
            feeds: 5,
            articles_per_feed: 24,
            feeds_per_user: 2,
            scored: 0.5,
        },
        0x5eed,
    )
}

/// Options expressed against one backend's feed ids.
fn option_sets(ids: &SeededIds) -> Vec<QueryOptions> {
    let cutoff = DateTime::from_timestamp(1_600_000_000, 0).expect("timestamp")
        + Duration::days(180);
    let mut sets = vec![
        QueryOptions::new(),
        QueryOptions::new().paging(7, 3),
        QueryOptions::new().unread_only(),
        QueryOptions::new().favorite_only(),
        QueryOptions::new().scope(Scope::Favorites),
        QueryOptions::new().sorting(SortField::Date, SortOrder::Ascending),
        QueryOptions::new().sorting(SortField::Id, SortOrder::Descending),
        QueryOptions::new().scope(Scope::Feed(ids.feeds[1])),
        QueryOptions::new().scope(Scope::Feeds(ids.feeds.clone())),
    ];

    let mut read = QueryOptions::new();
    read.read_only = true;
    sets.push(read);

    let mut unread_first = QueryOptions::new().paging(10, 0);
    unread_first.unread_first = true;
    sets.push(unread_first);

    let mut before = QueryOptions::new();
    before.before_date = Some(cutoff);
    sets.push(before);

    let mut after = QueryOptions::new().sorting(SortField::Date, SortOrder::Ascending);
    after.after_date = Some(cutoff);
    sets.push(after);

    let mut scored = QueryOptions::new();
    scored.include_scores = true;
    scored.high_scored_first = true;
    sets.push(scored);

    let mut bounded = QueryOptions::new();
    bounded.min_score = Some(20);
    bounded.max_score = Some(80);
    sets.push(bounded);

    sets
}

fn listing(seeded: &Seeded, user: &User, opts: &QueryOptions) -> Vec<(String, bool, bool)> {
    seeded
        .service
        .articles()
        .articles(user, opts)
        .expect("articles")
        .into_iter()
        .map(|article| (article.link, article.read, article.favorite))
        .collect()
}

#[test]
fn test_backends_agree_on_listings() {
    let dataset = dataset();
    let (sql, graph) = seeded_pair(&dataset);
    let sql_sets = option_sets(&sql.ids);
    let graph_sets = option_sets(&graph.ids);

    for user in &dataset.users {
        for (sql_opts, graph_opts) in sql_sets.iter().zip(&graph_sets) {
            assert_eq!(
                listing(&sql, user, sql_opts),
                listing(&graph, user, graph_opts),
                "user {} options {:?}",
                user.login,
                sql_opts
            );
        }
    }
}

#[test]
fn test_backends_agree_on_counts() {
    let dataset = dataset();
    let (sql, graph) = seeded_pair(&dataset);
    let sql_sets = option_sets(&sql.ids);
    let graph_sets = option_sets(&graph.ids);

    for user in &dataset.users {
        for (sql_opts, graph_opts) in sql_sets.iter().zip(&graph_sets) {
            if sql_opts.limit > 0 || sql_opts.offset > 0 {
                continue;
            }
            let mut sql_count = sql_opts.clone();
            sql_count.high_scored_first = false;
            let mut graph_count = graph_opts.clone();
            graph_count.high_scored_first = false;
            assert_eq!(
                sql.service.articles().count(user, &sql_count).expect("sql count"),
                graph.service.articles().count(user, &graph_count).expect("graph count"),
                "user {} options {:?}",
                user.login,
                sql_opts
            );
        }
    }
}

#[test]
fn test_backends_agree_on_userless_listing() {
    let dataset = dataset();
    let (sql, graph) = seeded_pair(&dataset);
    let opts = QueryOptions::new()
        .sorting(SortField::Date, SortOrder::Ascending)
        .paging(25, 10);
    let sql_all = sql.service.articles().all(&opts).expect("sql all");
    let graph_all = graph.service.articles().all(&opts).expect("graph all");
    assert_eq!(links(&sql_all), links(&graph_all));
    assert!(sql_all.iter().chain(&graph_all).all(|article| !article.read));
    assert_eq!(
        sql.service.articles().all(&QueryOptions::new()).expect("all").len(),
        dataset.article_count()
    );
}

#[test]
fn test_backends_agree_on_state_updates() {
    let dataset = dataset();
    let (sql, graph) = seeded_pair(&dataset);
    let user = &dataset.users[0];
    for seeded in [&sql, &graph] {
        let scope = Scope::Feeds(seeded.ids.feeds.clone());
        seeded
            .service
            .articles()
            .update_state(
                user,
                feedstore::StateChange::Read(true),
                &QueryOptions::new().scope(scope),
            )
            .expect("mark all read");
    }
    for seeded in [&sql, &graph] {
        let unread = seeded
            .service
            .articles()
            .count(user, &QueryOptions::new().unread_only())
            .expect("count");
        assert_eq!(unread, 0, "backend {}", seeded.service.backend_name());
    }
    let opts = QueryOptions::new().favorite_only();
    assert_eq!(listing(&sql, user, &opts), listing(&graph, user, &opts));
}
