use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

use super::ArticleId;

fn require_article(kind: &str, id: ArticleId) -> StoreResult<()> {
    if !id.is_set() {
        return Err(StoreError::validation(format!("{kind} has no article id")));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleThumbnail {
    pub article_id: ArticleId,
    pub thumbnail: String,
    pub link: String,
    pub mime_type: String,
    pub processed: bool,
}

impl ArticleThumbnail {
    pub fn validate(&self) -> StoreResult<()> {
        require_article("article thumbnail", self.article_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleScores {
    pub article_id: ArticleId,
    pub score: i64,
    pub score1: i64,
    pub score2: i64,
    pub score3: i64,
    pub score4: i64,
    pub score5: i64,
}

impl ArticleScores {
    pub fn validate(&self) -> StoreResult<()> {
        require_article("article scores", self.article_id)
    }

    /// Folds the per-period scores into one, older periods weighing less.
    pub fn calculate(&self) -> i64 {
        self.score1
            + (0.1 * self.score2 as f64) as i64
            + (0.01 * self.score3 as f64) as i64
            + (0.001 * self.score4 as f64) as i64
            + (0.0001 * self.score5 as f64) as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleExtract {
    pub article_id: ArticleId,
    pub title: String,
    pub content: String,
    pub top_image: String,
    pub language: String,
}

impl ArticleExtract {
    pub fn validate(&self) -> StoreResult<()> {
        require_article("article extract", self.article_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_weights_older_periods_less() {
        let scores = ArticleScores {
            article_id: ArticleId(1),
            score1: 10,
            score2: 100,
            score3: 1000,
            ..ArticleScores::default()
        };
        assert_eq!(scores.calculate(), 30);
    }

    #[test]
    fn records_require_an_article() {
        assert!(ArticleThumbnail::default().validate().is_err());
        assert!(ArticleExtract::default().validate().is_err());
    }
}
