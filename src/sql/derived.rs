//! One-to-one records keyed by article id. Each is written with
//! update-then-insert inside a single transaction.

use std::sync::Arc;

use log::{debug, info};
use rusqlite::{OptionalExtension, Row, params, types::Value};

use crate::{
    content::{ArticleExtract, ArticleId, ArticleScores, ArticleThumbnail},
    errors::{ResultExt, StoreError, StoreResult},
    repo::{ExtractRepo, ScoresRepo, ThumbnailRepo},
};

use super::{
    db::{Args, Db},
    templates,
};

fn require_id(id: ArticleId) -> StoreResult<()> {
    if !id.is_set() {
        return Err(StoreError::validation("article id is not set"));
    }
    Ok(())
}

fn get_record<T>(
    db: &Db,
    sql: &str,
    id: ArticleId,
    kind: &str,
    decode: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> StoreResult<T> {
    require_id(id)?;
    debug!("event=derived_get module=sql.derived status=start kind={kind} article={id}");
    db.with_conn(|s| {
        s.with_stmt(sql, |stmt| {
            stmt.query_row(params![id.0], decode)
                .optional()
                .context(format!("executing {kind} get stmt"))
        })
    })
    .context(format!("getting {kind} of article {id}"))?
    .ok_or_else(|| StoreError::not_found(format!("{kind} of article {id}")))
}

fn upsert(db: &Db, update: &str, create: &str, args: &Args, kind: &str, id: ArticleId) -> StoreResult<()> {
    info!("event=derived_update module=sql.derived status=start kind={kind} article={id}");
    db.with_tx(|s| {
        if s.execute(update, args)? > 0 {
            return Ok(());
        }
        s.execute(create, args)?;
        Ok(())
    })
    .map_err(|err| err.missing_parent(format!("article {id}")))
    .context(format!("updating {kind} of article {id}"))
}

pub struct SqlThumbnailRepo {
    db: Arc<Db>,
}

impl SqlThumbnailRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

fn thumbnail_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleThumbnail> {
    Ok(ArticleThumbnail {
        article_id: ArticleId(row.get(0)?),
        thumbnail: row.get(1)?,
        link: row.get(2)?,
        mime_type: row.get(3)?,
        processed: row.get(4)?,
    })
}

impl ThumbnailRepo for SqlThumbnailRepo {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleThumbnail> {
        get_record(&self.db, templates::GET_THUMBNAIL, article, "thumbnail", thumbnail_from_row)
    }

    fn update(&self, thumbnail: &ArticleThumbnail) -> StoreResult<()> {
        thumbnail.validate()?;
        let args = vec![
            (":article_id".into(), Value::Integer(thumbnail.article_id.0)),
            (":thumbnail".into(), Value::Text(thumbnail.thumbnail.clone())),
            (":link".into(), Value::Text(thumbnail.link.clone())),
            (":mime_type".into(), Value::Text(thumbnail.mime_type.clone())),
            (":processed".into(), Value::Integer(i64::from(thumbnail.processed))),
        ];
        upsert(
            &self.db,
            templates::UPDATE_THUMBNAIL,
            templates::CREATE_THUMBNAIL,
            &args,
            "thumbnail",
            thumbnail.article_id,
        )
    }
}

pub struct SqlScoresRepo {
    db: Arc<Db>,
}

impl SqlScoresRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

fn scores_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleScores> {
    Ok(ArticleScores {
        article_id: ArticleId(row.get(0)?),
        score: row.get(1)?,
        score1: row.get(2)?,
        score2: row.get(3)?,
        score3: row.get(4)?,
        score4: row.get(5)?,
        score5: row.get(6)?,
    })
}

impl ScoresRepo for SqlScoresRepo {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleScores> {
        get_record(&self.db, templates::GET_SCORES, article, "scores", scores_from_row)
    }

    fn update(&self, scores: &ArticleScores) -> StoreResult<()> {
        scores.validate()?;
        let args = vec![
            (":article_id".into(), Value::Integer(scores.article_id.0)),
            (":score".into(), Value::Integer(scores.score)),
            (":score1".into(), Value::Integer(scores.score1)),
            (":score2".into(), Value::Integer(scores.score2)),
            (":score3".into(), Value::Integer(scores.score3)),
            (":score4".into(), Value::Integer(scores.score4)),
            (":score5".into(), Value::Integer(scores.score5)),
        ];
        upsert(
            &self.db,
            templates::UPDATE_SCORES,
            templates::CREATE_SCORES,
            &args,
            "scores",
            scores.article_id,
        )
    }
}

pub struct SqlExtractRepo {
    db: Arc<Db>,
}

impl SqlExtractRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

fn extract_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleExtract> {
    Ok(ArticleExtract {
        article_id: ArticleId(row.get(0)?),
        title: row.get(1)?,
        content: row.get(2)?,
        top_image: row.get(3)?,
        language: row.get(4)?,
    })
}

impl ExtractRepo for SqlExtractRepo {
    fn get(&self, article: ArticleId) -> StoreResult<ArticleExtract> {
        get_record(&self.db, templates::GET_EXTRACT, article, "extract", extract_from_row)
    }

    fn update(&self, extract: &ArticleExtract) -> StoreResult<()> {
        extract.validate()?;
        let args = vec![
            (":article_id".into(), Value::Integer(extract.article_id.0)),
            (":title".into(), Value::Text(extract.title.clone())),
            (":content".into(), Value::Text(extract.content.clone())),
            (":top_image".into(), Value::Text(extract.top_image.clone())),
            (":language".into(), Value::Text(extract.language.clone())),
        ];
        upsert(
            &self.db,
            templates::UPDATE_EXTRACT,
            templates::CREATE_EXTRACT,
            &args,
            "extract",
            extract.article_id,
        )
    }
}
