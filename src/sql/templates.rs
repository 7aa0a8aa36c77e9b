//! Query text: fixed statements for the entity repositories, plus the
//! article templates the composer fills with fragments.

pub const USER_FEEDS_JOIN: &str =
    "INNER JOIN users_feeds uf ON uf.feed_id = a.feed_id AND uf.user_login = :user_login";
pub const UNREAD_JOIN: &str = "LEFT OUTER JOIN users_articles_unread au ON a.id = au.article_id AND au.user_login = uf.user_login";
pub const FAVORITE_JOIN: &str = "LEFT OUTER JOIN users_articles_favorite af ON a.id = af.article_id AND af.user_login = uf.user_login";
pub const UNTAGGED_JOIN: &str = "LEFT OUTER JOIN users_feeds_tags uft ON uft.feed_id = uf.feed_id AND uft.user_login = uf.user_login";
pub const SCORE_JOIN: &str = "INNER JOIN articles_scores asco ON a.id = asco.article_id";
pub const THUMBNAIL_JOIN: &str = "LEFT OUTER JOIN articles_thumbnails at ON a.id = at.article_id";

pub const READ_COLUMN: &str = "CASE WHEN au.article_id IS NULL THEN 1 ELSE 0 END";
pub const FAVORITE_COLUMN: &str = "CASE WHEN af.article_id IS NULL THEN 0 ELSE 1 END";
pub const SCORE_COLUMN: &str = ", asco.score";

const ARTICLE_COLUMNS: &str = "SELECT a.feed_id, a.id, a.title, a.description, a.link, a.date, a.guid,";
const THUMBNAIL_COLUMNS: &str =
    "COALESCE(at.thumbnail, '') AS thumbnail, COALESCE(at.link, '') AS thumbnail_link";

/// Rendered fragments; empty strings are left out of the final text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragments {
    pub columns: String,
    pub join: String,
    pub where_clause: String,
    pub order: String,
    pub limit: String,
}

fn lines(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-user listing. The template carries the membership, unread and
/// favorite joins itself.
pub fn user_articles(f: &Fragments) -> String {
    let read = format!("{READ_COLUMN} AS read, {FAVORITE_COLUMN} AS favorite,");
    let thumbnail = format!("{THUMBNAIL_COLUMNS}{}", f.columns);
    lines(&[
        ARTICLE_COLUMNS,
        read.as_str(),
        thumbnail.as_str(),
        "FROM articles a",
        USER_FEEDS_JOIN,
        UNREAD_JOIN,
        FAVORITE_JOIN,
        f.join.as_str(),
        THUMBNAIL_JOIN,
        f.where_clause.as_str(),
        f.order.as_str(),
        f.limit.as_str(),
    ])
}

pub fn userless_articles(f: &Fragments) -> String {
    let thumbnail = format!("{THUMBNAIL_COLUMNS}{}", f.columns);
    lines(&[
        ARTICLE_COLUMNS,
        "0 AS read, 0 AS favorite,",
        thumbnail.as_str(),
        "FROM articles a",
        f.join.as_str(),
        THUMBNAIL_JOIN,
        f.where_clause.as_str(),
        f.order.as_str(),
        f.limit.as_str(),
    ])
}

pub fn article_ids(f: &Fragments) -> String {
    lines(&[
        "SELECT a.id",
        "FROM articles a",
        f.join.as_str(),
        f.where_clause.as_str(),
        f.order.as_str(),
        f.limit.as_str(),
    ])
}

pub fn article_count(f: &Fragments) -> String {
    lines(&[
        "SELECT count(a.id)",
        "FROM articles a",
        f.join.as_str(),
        f.where_clause.as_str(),
    ])
}

/// Set-difference insert into a marker table: only pairs not yet present.
pub fn state_insert(table: &str, f: &Fragments) -> String {
    let insert = format!("INSERT INTO {table} (user_login, article_id)");
    let except = format!(
        "EXCEPT SELECT m.user_login, m.article_id FROM {table} m WHERE m.user_login = :user_login"
    );
    lines(&[
        insert.as_str(),
        "SELECT uf.user_login, a.id",
        "FROM articles a",
        f.join.as_str(),
        f.where_clause.as_str(),
        except.as_str(),
    ])
}

/// Delete-if-present from a marker table.
pub fn state_delete(table: &str, f: &Fragments) -> String {
    let delete =
        format!("DELETE FROM {table} WHERE user_login = :user_login AND article_id IN (");
    lines(&[
        delete.as_str(),
        "SELECT a.id",
        "FROM articles a",
        f.join.as_str(),
        f.where_clause.as_str(),
        ")",
    ])
}

pub const UNREAD_TABLE: &str = "users_articles_unread";
pub const FAVORITE_TABLE: &str = "users_articles_favorite";

pub const DELETE_STALE_UNREAD: &str = "DELETE FROM users_articles_unread WHERE article_id IN (SELECT id FROM articles WHERE date IS NOT NULL AND date < ?1)";

pub const GET_USER: &str = "SELECT login, first_name, last_name, email, hash_type, admin, active, salt, hash, md5_api, profile_data FROM users WHERE login = ?1";
pub const GET_USER_BY_MD5: &str = "SELECT login, first_name, last_name, email, hash_type, admin, active, salt, hash, md5_api, profile_data FROM users WHERE md5_api = ?1";
pub const ALL_USERS: &str = "SELECT login, first_name, last_name, email, hash_type, admin, active, salt, hash, md5_api, profile_data FROM users ORDER BY login";
pub const UPDATE_USER: &str = "UPDATE users SET first_name = :first_name, last_name = :last_name, email = :email, hash_type = :hash_type, admin = :admin, active = :active, salt = :salt, hash = :hash, md5_api = :md5_api, profile_data = :profile_data WHERE login = :login";
pub const CREATE_USER: &str = "INSERT INTO users(login, first_name, last_name, email, hash_type, admin, active, salt, hash, md5_api, profile_data) VALUES(:login, :first_name, :last_name, :email, :hash_type, :admin, :active, :salt, :hash, :md5_api, :profile_data)";
pub const DELETE_USER: &str = "DELETE FROM users WHERE login = ?1";

pub const GET_FEED: &str = "SELECT f.id, f.link, f.title, f.description, f.site_link, f.hub_link, f.update_error, f.subscribe_error FROM feeds f WHERE f.id = ?1";
pub const GET_FEED_BY_LINK: &str = "SELECT f.id, f.link, f.title, f.description, f.site_link, f.hub_link, f.update_error, f.subscribe_error FROM feeds f WHERE f.link = ?1";
pub const ALL_FEEDS: &str = "SELECT f.id, f.link, f.title, f.description, f.site_link, f.hub_link, f.update_error, f.subscribe_error FROM feeds f ORDER BY f.id";
pub const USER_FEEDS: &str = "SELECT f.id, f.link, f.title, f.description, f.site_link, f.hub_link, f.update_error, f.subscribe_error FROM feeds f INNER JOIN users_feeds uf ON uf.feed_id = f.id WHERE uf.user_login = ?1 ORDER BY f.id";
pub const FEED_ID_BY_LINK: &str = "SELECT id FROM feeds WHERE link = ?1";
pub const UPDATE_FEED: &str = "UPDATE feeds SET title = :title, description = :description, site_link = :site_link, hub_link = :hub_link, update_error = :update_error, subscribe_error = :subscribe_error WHERE link = :link";
pub const CREATE_FEED: &str = "INSERT INTO feeds(link, title, description, site_link, hub_link, update_error, subscribe_error) VALUES(:link, :title, :description, :site_link, :hub_link, :update_error, :subscribe_error)";
pub const DELETE_FEED: &str = "DELETE FROM feeds WHERE id = ?1";
pub const ATTACH_FEED: &str = "INSERT INTO users_feeds(user_login, feed_id) SELECT :user_login, :feed_id EXCEPT SELECT user_login, feed_id FROM users_feeds WHERE user_login = :user_login AND feed_id = :feed_id";
pub const DETACH_FEED: &str = "DELETE FROM users_feeds WHERE user_login = ?1 AND feed_id = ?2";
pub const FEED_USERS: &str = "SELECT u.login, u.first_name, u.last_name, u.email, u.hash_type, u.admin, u.active, u.salt, u.hash, u.md5_api, u.profile_data FROM users u INNER JOIN users_feeds uf ON uf.user_login = u.login WHERE uf.feed_id = ?1 ORDER BY u.login";
pub const USER_FEED_EXISTS: &str =
    "SELECT count(*) FROM users_feeds WHERE user_login = ?1 AND feed_id = ?2";
pub const DELETE_USER_FEED_TAGS: &str =
    "DELETE FROM users_feeds_tags WHERE user_login = ?1 AND feed_id = ?2";
pub const CREATE_USER_FEED_TAG: &str = "INSERT INTO users_feeds_tags(user_login, feed_id, tag) SELECT :user_login, :feed_id, :tag EXCEPT SELECT user_login, feed_id, tag FROM users_feeds_tags WHERE user_login = :user_login AND feed_id = :feed_id AND tag = :tag";
pub const USER_FEED_TAGS: &str =
    "SELECT tag FROM users_feeds_tags WHERE user_login = ?1 AND feed_id = ?2 ORDER BY tag";
pub const FEED_ARTICLE_LINKS: &str = "SELECT link FROM articles WHERE feed_id = ?1";
pub const CREATE_FEED_ARTICLE: &str = "INSERT INTO articles(feed_id, link, guid, title, description, date) VALUES(:feed_id, :link, :guid, :title, :description, :date)";
pub const CREATE_SUBSCRIBER_UNREAD: &str = "INSERT INTO users_articles_unread(user_login, article_id) SELECT uf.user_login, :article_id FROM users_feeds uf WHERE uf.feed_id = :feed_id";

pub const GET_SUBSCRIPTION: &str = "SELECT feed_id, link, lease_duration, verification_time, subscription_failure FROM hubbub_subscriptions WHERE feed_id = ?1";
pub const ALL_SUBSCRIPTIONS: &str = "SELECT feed_id, link, lease_duration, verification_time, subscription_failure FROM hubbub_subscriptions ORDER BY feed_id";
pub const UPDATE_SUBSCRIPTION: &str = "UPDATE hubbub_subscriptions SET link = :link, lease_duration = :lease_duration, verification_time = :verification_time, subscription_failure = :subscription_failure WHERE feed_id = :feed_id";
pub const CREATE_SUBSCRIPTION: &str = "INSERT INTO hubbub_subscriptions(feed_id, link, lease_duration, verification_time, subscription_failure) VALUES(:feed_id, :link, :lease_duration, :verification_time, :subscription_failure)";

pub const GET_THUMBNAIL: &str = "SELECT article_id, thumbnail, link, mime_type, processed FROM articles_thumbnails WHERE article_id = ?1";
pub const UPDATE_THUMBNAIL: &str = "UPDATE articles_thumbnails SET thumbnail = :thumbnail, link = :link, mime_type = :mime_type, processed = :processed WHERE article_id = :article_id";
pub const CREATE_THUMBNAIL: &str = "INSERT INTO articles_thumbnails(article_id, thumbnail, link, mime_type, processed) VALUES(:article_id, :thumbnail, :link, :mime_type, :processed)";

pub const GET_SCORES: &str = "SELECT article_id, score, score1, score2, score3, score4, score5 FROM articles_scores WHERE article_id = ?1";
pub const UPDATE_SCORES: &str = "UPDATE articles_scores SET score = :score, score1 = :score1, score2 = :score2, score3 = :score3, score4 = :score4, score5 = :score5 WHERE article_id = :article_id";
pub const CREATE_SCORES: &str = "INSERT INTO articles_scores(article_id, score, score1, score2, score3, score4, score5) VALUES(:article_id, :score, :score1, :score2, :score3, :score4, :score5)";

pub const GET_EXTRACT: &str = "SELECT article_id, title, content, top_image, language FROM articles_extracts WHERE article_id = ?1";
pub const UPDATE_EXTRACT: &str = "UPDATE articles_extracts SET title = :title, content = :content, top_image = :top_image, language = :language WHERE article_id = :article_id";
pub const CREATE_EXTRACT: &str = "INSERT INTO articles_extracts(article_id, title, content, top_image, language) VALUES(:article_id, :title, :content, :top_image, :language)";
