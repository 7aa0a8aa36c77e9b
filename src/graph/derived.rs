//! Derived one-to-one records, kept as namespaced predicates on the
//! article node.

use std::sync::Arc;

use log::{debug, info};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    content::{ArticleExtract, ArticleId, ArticleScores, ArticleThumbnail},
    errors::{ResultExt, StoreError, StoreResult},
    repo::{ExtractRepo, ScoresRepo, ThumbnailRepo},
};

use super::{
    query::{GraphQuery, vars},
    store::{GraphStore, Mutation},
    uid::Uid,
};

/// Predicate layout of one record kind.
struct RecordKind {
    name: &'static str,
    /// Always written, so its presence marks a stored record.
    marker: &'static str,
    fields: &'static [(&'static str, &'static str)],
}

const THUMBNAIL: RecordKind = RecordKind {
    name: "thumbnail",
    marker: "thumbnail.processed",
    fields: &[
        ("thumbnail", "thumbnail.thumbnail"),
        ("link", "thumbnail.link"),
        ("mime_type", "thumbnail.mimeType"),
        ("processed", "thumbnail.processed"),
    ],
};

const SCORES: RecordKind = RecordKind {
    name: "scores",
    marker: "scores.score",
    fields: &[
        ("score", "scores.score"),
        ("score1", "scores.score1"),
        ("score2", "scores.score2"),
        ("score3", "scores.score3"),
        ("score4", "scores.score4"),
        ("score5", "scores.score5"),
    ],
};

const EXTRACT: RecordKind = RecordKind {
    name: "extract",
    marker: "extract.title",
    fields: &[
        ("title", "extract.title"),
        ("content", "extract.content"),
        ("top_image", "extract.topImage"),
        ("language", "extract.language"),
    ],
};

fn require_id(id: ArticleId) -> StoreResult<()> {
    if !id.is_set() {
        return Err(StoreError::validation("article id is not set"));
    }
    Ok(())
}

/// Reads the record off the article node, mapping predicates back onto the
/// record's own field names.
fn get_record<T: DeserializeOwned>(store: &GraphStore, kind: &RecordKind, id: ArticleId) -> StoreResult<T> {
    require_id(id)?;
    debug!(
        "event=derived_get module=graph.derived status=start kind={} article={id}",
        kind.name
    );
    let uid = Uid(id.0);
    let nodes = store
        .view(|txn| {
            if !txn.node_has(uid, kind.marker)? {
                return Ok(Vec::new());
            }
            let predicates: Vec<&str> = kind.fields.iter().map(|(_, predicate)| *predicate).collect();
            txn.query(
                &GraphQuery::uid("$article").select(&predicates),
                &vars([("$article", uid.to_string())]),
            )
        })
        .context(format!("getting {} of article {id}", kind.name))?;
    let node = nodes
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::not_found(format!("{} of article {id}", kind.name)))?;

    let mut record = serde_json::Map::new();
    record.insert("article_id".into(), json!(id.0));
    for (field, predicate) in kind.fields {
        if let Some(value) = node.get(*predicate) {
            record.insert((*field).to_string(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(record))
        .context(format!("decoding {} of article {id}", kind.name))
}

fn update_record<T: Serialize>(
    store: &GraphStore,
    kind: &RecordKind,
    id: ArticleId,
    record: &T,
) -> StoreResult<()> {
    info!(
        "event=derived_update module=graph.derived status=start kind={} article={id}",
        kind.name
    );
    let fields = serde_json::to_value(record).context(format!("encoding {}", kind.name))?;
    let uid = Uid(id.0);
    let mut doc = serde_json::Map::new();
    doc.insert("uid".into(), json!(uid));
    for (field, predicate) in kind.fields {
        if let Some(value) = fields.get(*field) {
            doc.insert((*predicate).to_string(), value.clone());
        }
    }
    store
        .with_txn(|txn| {
            if !txn.node_has(uid, "article.link")? {
                return Err(StoreError::not_found(format!("article {id}")));
            }
            txn.mutate(&Mutation::set(Value::Object(doc)))?;
            Ok(())
        })
        .context(format!("updating {} of article {id}", kind.name))
}

pub struct GraphThumbnailRepo {
    store: Arc<GraphStore>,
}

impl GraphThumbnailRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl ThumbnailRepo for GraphThumbnailRepo {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleThumbnail> {
        get_record(&self.store, &THUMBNAIL, article)
    }

    fn update(&self, thumbnail: &ArticleThumbnail) -> StoreResult<()> {
        thumbnail.validate()?;
        update_record(&self.store, &THUMBNAIL, thumbnail.article_id, thumbnail)
    }
}

pub struct GraphScoresRepo {
    store: Arc<GraphStore>,
}

impl GraphScoresRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl ScoresRepo for GraphScoresRepo {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleScores> {
        get_record(&self.store, &SCORES, article)
    }

    fn update(&self, scores: &ArticleScores) -> StoreResult<()> {
        scores.validate()?;
        update_record(&self.store, &SCORES, scores.article_id, scores)
    }
}

pub struct GraphExtractRepo {
    store: Arc<GraphStore>,
}

impl GraphExtractRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl ExtractRepo for GraphExtractRepo {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleExtract> {
        get_record(&self.store, &EXTRACT, article)
    }

    fn update(&self, extract: &ArticleExtract) -> StoreResult<()> {
        extract.validate()?;
        update_record(&self.store, &EXTRACT, extract.article_id, extract)
    }
}
