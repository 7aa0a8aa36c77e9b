//! Compiles [`QueryOptions`] into article query text.
//!
//! Composition is a pure function of the query kind, the user, the options
//! and the dialect helper: equal inputs always produce byte-identical text,
//! which is what keeps the statement cache effective. Joins are emitted in a
//! fixed order (membership, unread, favorite, untagged, scores), and so are
//! predicates (scope, unread/read, favorite, untagged, ids, dates, scores).

use rusqlite::types::Value;

use crate::{
    content::Login,
    errors::{StoreError, StoreResult},
    options::{QueryKind, QueryOptions, Scope, SortField, SortOrder, StateChange},
};

use super::{
    article::time_bound,
    db::Args,
    dialect::{Helper, Predicate, where_multiple_ors},
    templates::{self, Fragments},
};

#[derive(Clone, Debug, PartialEq)]
pub struct ComposedQuery {
    pub sql: String,
    pub args: Args,
}

#[derive(Default)]
struct Builder {
    joins: Vec<&'static str>,
    predicates: Vec<String>,
    order: Vec<String>,
    limit: Option<&'static str>,
    args: Args,
}

impl Builder {
    fn arg(&mut self, name: &str, value: Value) {
        self.args.push((name.to_string(), value));
    }

    fn predicate(&mut self, pred: Predicate) {
        self.predicates.push(pred.sql);
        self.args.extend(pred.args);
    }

    fn fragments(&self, columns: &str) -> Fragments {
        Fragments {
            columns: columns.to_string(),
            join: self.joins.join("\n"),
            where_clause: if self.predicates.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", self.predicates.join(" AND "))
            },
            order: if self.order.is_empty() {
                String::new()
            } else {
                format!("ORDER BY {}", self.order.join(", "))
            },
            limit: self.limit.unwrap_or_default().to_string(),
        }
    }
}

pub fn compose(
    kind: QueryKind,
    user: Option<&Login>,
    opts: &QueryOptions,
    helper: &dyn Helper,
) -> StoreResult<ComposedQuery> {
    opts.validate(kind)?;

    let per_user = match kind {
        QueryKind::Articles { user } => user,
        _ => true,
    };
    let mut b = Builder::default();
    if per_user {
        let login = user
            .filter(|login| !login.is_empty())
            .ok_or_else(|| StoreError::invalid_options(format!("{kind:?} needs a user")))?;
        b.arg(":user_login", Value::Text(login.as_str().to_string()));
    }

    let listing = matches!(kind, QueryKind::Articles { .. });
    let ordered = listing || kind == QueryKind::ArticleIds;
    // The per-user listing template already carries these three joins.
    if per_user && kind != (QueryKind::Articles { user: true }) {
        b.joins.push(templates::USER_FEEDS_JOIN);
        if opts.filters_unread_state() || (ordered && opts.unread_first) {
            b.joins.push(templates::UNREAD_JOIN);
        }
        if opts.wants_favorites() {
            b.joins.push(templates::FAVORITE_JOIN);
        }
    }
    if opts.untagged_only {
        b.joins.push(templates::UNTAGGED_JOIN);
    }
    let score_join = if ordered {
        opts.needs_scores()
    } else {
        opts.min_score.is_some() || opts.max_score.is_some()
    };
    if score_join {
        b.joins.push(templates::SCORE_JOIN);
    }

    scope_predicate(&mut b, &opts.scope, helper)?;
    if opts.unread_only {
        b.predicate(Predicate::new("au.article_id IS NOT NULL"));
    } else if opts.read_only {
        b.predicate(Predicate::new("au.article_id IS NULL"));
    }
    if opts.wants_favorites() {
        b.predicate(Predicate::new("af.article_id IS NOT NULL"));
    }
    if opts.untagged_only {
        b.predicate(Predicate::new("uft.feed_id IS NULL"));
    }
    if let Some(id) = opts.before_id {
        b.predicate(Predicate::new("a.id < :before_id").arg(":before_id", Value::Integer(id.0)));
    }
    if let Some(id) = opts.after_id {
        b.predicate(Predicate::new("a.id > :after_id").arg(":after_id", Value::Integer(id.0)));
    }
    if let Some(date) = opts.before_date {
        b.predicate(
            Predicate::new("(a.date IS NULL OR a.date < :before_date)")
                .arg(":before_date", Value::Integer(time_bound(date))),
        );
    }
    if let Some(date) = opts.after_date {
        b.predicate(
            Predicate::new("a.date > :after_date")
                .arg(":after_date", Value::Integer(time_bound(date))),
        );
    }
    if let Some(score) = opts.min_score {
        b.predicate(Predicate::new("asco.score >= :min_score").arg(":min_score", Value::Integer(score)));
    }
    if let Some(score) = opts.max_score {
        b.predicate(Predicate::new("asco.score <= :max_score").arg(":max_score", Value::Integer(score)));
    }

    if ordered {
        order(&mut b, opts, per_user);
        paging(&mut b, opts);
    }

    let columns = if listing && opts.needs_scores() {
        templates::SCORE_COLUMN
    } else {
        ""
    };
    let f = b.fragments(columns);
    let sql = match kind {
        QueryKind::Articles { user: true } => templates::user_articles(&f),
        QueryKind::Articles { user: false } => templates::userless_articles(&f),
        QueryKind::ArticleIds => templates::article_ids(&f),
        QueryKind::Count => templates::article_count(&f),
        QueryKind::State(StateChange::Read(true)) => {
            templates::state_delete(templates::UNREAD_TABLE, &f)
        }
        QueryKind::State(StateChange::Read(false)) => {
            templates::state_insert(templates::UNREAD_TABLE, &f)
        }
        QueryKind::State(StateChange::Favorite(true)) => {
            templates::state_insert(templates::FAVORITE_TABLE, &f)
        }
        QueryKind::State(StateChange::Favorite(false)) => {
            templates::state_delete(templates::FAVORITE_TABLE, &f)
        }
    };
    Ok(ComposedQuery { sql, args: b.args })
}

fn scope_predicate(b: &mut Builder, scope: &Scope, helper: &dyn Helper) -> StoreResult<()> {
    match scope {
        Scope::AllFeeds | Scope::Favorites => {}
        Scope::Feed(id) => {
            b.predicate(Predicate::new("a.feed_id = :feed_id").arg(":feed_id", Value::Integer(id.0)))
        }
        Scope::Feeds(ids) if ids.is_empty() => b.predicate(Predicate::new("1 = 0")),
        Scope::Feeds(ids) => {
            let values: Vec<i64> = ids.iter().map(|id| id.0).collect();
            b.predicate(where_multiple_ors(helper, "a.feed_id", "feed_id", &values, true)?);
        }
        Scope::Search(ids) if ids.is_empty() => b.predicate(Predicate::new("1 = 0")),
        Scope::Search(ids) => {
            let values: Vec<i64> = ids.iter().map(|id| id.0).collect();
            b.predicate(where_multiple_ors(helper, "a.id", "article_id", &values, true)?);
        }
    }
    Ok(())
}

fn order(b: &mut Builder, opts: &QueryOptions, per_user: bool) {
    let dir = match opts.sort_order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };
    if opts.high_scored_first {
        b.order.push("asco.score DESC".to_string());
    }
    if per_user && opts.unread_first {
        // Unread rows evaluate to 0 and sort first.
        b.order.push(format!("{} ASC", templates::READ_COLUMN));
    }
    if opts.sort_field == SortField::Date {
        b.order.push(format!("a.date {dir}"));
    }
    b.order.push(format!("a.id {dir}"));
}

fn paging(b: &mut Builder, opts: &QueryOptions) {
    if opts.limit > 0 {
        b.limit = Some("LIMIT :limit OFFSET :offset");
        b.arg(":limit", Value::Integer(i64::from(opts.limit)));
        b.arg(":offset", Value::Integer(i64::from(opts.offset)));
    } else if opts.offset > 0 {
        b.limit = Some("LIMIT -1 OFFSET :offset");
        b.arg(":offset", Value::Integer(i64::from(opts.offset)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{ArticleId, FeedId},
        sql::sqlite::SqliteHelper,
    };

    fn login() -> Login {
        Login::new("bob")
    }

    fn compose_user(kind: QueryKind, opts: &QueryOptions) -> ComposedQuery {
        compose(kind, Some(&login()), opts, &SqliteHelper).unwrap()
    }

    fn referenced(query: &ComposedQuery) -> bool {
        query.args.iter().all(|(name, _)| query.sql.contains(name.as_str()))
    }

    #[test]
    fn identical_options_compose_identical_text() {
        let opts = QueryOptions::new().unread_only().paging(10, 0);
        let first = compose_user(QueryKind::Articles { user: true }, &opts);
        let second = compose_user(QueryKind::Articles { user: true }, &opts.clone());
        assert_eq!(first, second);
        assert!(first.sql.contains("au.article_id IS NOT NULL"));
        assert!(first.sql.ends_with("LIMIT :limit OFFSET :offset"));
        assert!(referenced(&first));
    }

    #[test]
    fn inactive_options_add_no_fragments() {
        let query = compose_user(QueryKind::Count, &QueryOptions::default());
        assert_eq!(
            query.sql,
            format!("SELECT count(a.id)\nFROM articles a\n{}", templates::USER_FEEDS_JOIN)
        );
        assert_eq!(query.args.len(), 1);
    }

    #[test]
    fn joins_follow_fixed_order() {
        let mut opts = QueryOptions::new().unread_only().favorite_only().untagged_only();
        opts.min_score = Some(3);
        let query = compose_user(QueryKind::Count, &opts);
        let positions: Vec<usize> = [
            templates::USER_FEEDS_JOIN,
            templates::UNREAD_JOIN,
            templates::FAVORITE_JOIN,
            templates::UNTAGGED_JOIN,
            templates::SCORE_JOIN,
        ]
        .iter()
        .map(|join| query.sql.find(join).expect("join present"))
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!query.sql.contains("ORDER BY"));
        assert!(referenced(&query));
    }

    #[test]
    fn userless_listing_skips_membership() {
        let opts = QueryOptions::new().scope(Scope::Feed(FeedId(4)));
        let query = compose(QueryKind::Articles { user: false }, None, &opts, &SqliteHelper).unwrap();
        assert!(!query.sql.contains("users_feeds"));
        assert!(query.sql.contains("a.feed_id = :feed_id"));
        assert_eq!(query.args, vec![(":feed_id".to_string(), Value::Integer(4))]);
    }

    #[test]
    fn per_user_kinds_require_a_login() {
        let err = compose(QueryKind::ArticleIds, None, &QueryOptions::new(), &SqliteHelper)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOptions(_)));
    }

    #[test]
    fn empty_scope_lists_match_nothing() {
        let opts = QueryOptions::new().scope(Scope::Search(Vec::new()));
        let query = compose_user(QueryKind::ArticleIds, &opts);
        assert!(query.sql.contains("WHERE 1 = 0"));
    }

    #[test]
    fn long_id_lists_use_the_dialect_strategy() {
        let ids = (1..=40).map(ArticleId).collect();
        let query = compose_user(QueryKind::ArticleIds, &QueryOptions::new().scope(Scope::Search(ids)));
        assert!(query.sql.contains("json_each(:article_id)"));
        assert_eq!(query.args.len(), 2);
    }

    #[test]
    fn state_queries_use_marker_set_operations() {
        let opts = QueryOptions::new().scope(Scope::Search(vec![ArticleId(42)]));
        let unread = compose_user(QueryKind::State(StateChange::Read(false)), &opts);
        assert!(unread.sql.starts_with("INSERT INTO users_articles_unread"));
        assert!(unread.sql.contains("EXCEPT SELECT"));

        let read = compose_user(QueryKind::State(StateChange::Read(true)), &opts);
        assert!(read.sql.starts_with("DELETE FROM users_articles_unread"));
        assert!(referenced(&read));
    }

    #[test]
    fn offset_without_limit_pages_to_the_end() {
        let opts = QueryOptions::new().paging(0, 5);
        let query = compose_user(QueryKind::ArticleIds, &opts);
        assert!(query.sql.ends_with("LIMIT -1 OFFSET :offset"));
        assert!(!query.sql.contains(":limit"));
    }

    #[test]
    fn scored_listing_orders_by_score_first() {
        let mut opts = QueryOptions::new();
        opts.include_scores = true;
        opts.high_scored_first = true;
        opts.unread_first = true;
        let query = compose_user(QueryKind::Articles { user: true }, &opts);
        assert!(query.sql.contains(", asco.score"));
        let order = query.sql.lines().find(|line| line.starts_with("ORDER BY")).unwrap();
        assert!(order.starts_with("ORDER BY asco.score DESC, CASE WHEN au.article_id"));
        assert!(order.ends_with("a.date DESC, a.id DESC"));
    }
}
