use anyhow::Result;
use sqlx::QueryBuilder;
use std::collections::HashMap;

use super::schema::Database;
use super::types::{Article, ArticleDbRow, NewArticle};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of articles to return from any single query (OOM protection)
pub const MAX_ARTICLES: usize = 2000;

/// Rows per INSERT statement; 7 binds each keeps us well under SQLite's 999 limit
const INSERT_BATCH_SIZE: usize = 50;

pub(crate) const ARTICLE_COLUMNS: &str = "a.id, a.feed_id, a.title, a.translated_title, a.content, \
     a.translated_content, a.published, a.author, a.link, a.thumbnail, a.is_read, a.is_favorite";

/// Clamp caller-supplied paging values into what SQLite will accept
pub(crate) fn page_bounds(limit: usize, offset: usize) -> (i64, i64) {
    let limit = i64::try_from(limit.min(MAX_ARTICLES)).unwrap_or(i64::MAX);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    (limit, offset)
}

/// Which slice of the article table a list query reads
#[derive(Debug, Clone, Copy)]
enum ArticleSelection {
    All,
    Feed(i64),
    Unread,
    Favorite,
}

impl Database {
    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Insert articles for a feed, skipping links the feed already has.
    /// Returns the number of new rows.
    pub async fn insert_articles(&self, feed_id: i64, articles: &[NewArticle]) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for chunk in articles.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO articles (feed_id, title, content, published, author, link, thumbnail) ",
            );
            builder.push_values(chunk, |mut b, article| {
                b.push_bind(feed_id)
                    .push_bind(&article.title)
                    .push_bind(&article.content)
                    .push_bind(article.published)
                    .push_bind(&article.author)
                    .push_bind(&article.link)
                    .push_bind(&article.thumbnail);
            });
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        tracing::debug!(feed_id, inserted, offered = articles.len(), "Inserted articles");
        Ok(inserted)
    }

    /// Store a translation for an article's title and/or content.
    pub async fn set_translation(
        &self,
        article_id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET translated_title = ?, translated_content = ? WHERE id = ?",
        )
        .bind(title)
        .bind(content)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    async fn list_articles(
        &self,
        selection: ArticleSelection,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>> {
        let (limit, offset) = page_bounds(limit, offset);
        tracing::debug!(?selection, limit, offset, "list_articles");

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles a"));
        match selection {
            ArticleSelection::All => {}
            ArticleSelection::Feed(feed_id) => {
                builder.push(" WHERE a.feed_id = ").push_bind(feed_id);
            }
            ArticleSelection::Unread => {
                builder.push(" WHERE a.is_read = 0");
            }
            ArticleSelection::Favorite => {
                builder.push(" WHERE a.is_favorite = 1");
            }
        }
        builder
            .push(" ORDER BY a.published DESC, a.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<ArticleDbRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    /// One page of a feed's articles, newest first.
    pub async fn list_articles_by_feed(
        &self,
        feed_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>> {
        self.list_articles(ArticleSelection::Feed(feed_id), limit, offset)
            .await
    }

    pub async fn list_all_articles(&self, limit: usize, offset: usize) -> Result<Vec<Article>> {
        self.list_articles(ArticleSelection::All, limit, offset).await
    }

    pub async fn list_unread_articles(&self, limit: usize, offset: usize) -> Result<Vec<Article>> {
        self.list_articles(ArticleSelection::Unread, limit, offset)
            .await
    }

    pub async fn list_favorite_articles(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>> {
        self.list_articles(ArticleSelection::Favorite, limit, offset)
            .await
    }

    /// Number of articles in one feed, or in the whole library with `None`.
    pub async fn count_articles(&self, feed_id: Option<i64>) -> Result<i64> {
        let row: (i64,) = match feed_id {
            Some(id) => {
                sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ?")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM articles")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.0)
    }

    // ========================================================================
    // Unread Counts
    // ========================================================================

    /// Unread articles in one feed, or across all feeds with `None`.
    pub async fn unread_count(&self, feed_id: Option<i64>) -> Result<i64> {
        let row: (i64,) = match feed_id {
            Some(id) => {
                sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ? AND is_read = 0")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM articles WHERE is_read = 0")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.0)
    }

    /// Unread count for every feed in one pass; feeds with nothing unread map to 0.
    pub async fn all_unread_counts(&self) -> Result<HashMap<i64, i64>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT f.id, COUNT(CASE WHEN a.is_read = 0 THEN 1 END)
            FROM feeds f
            LEFT JOIN articles a ON a.feed_id = f.id
            GROUP BY f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Set the read flag. Returns whether the row changed.
    pub async fn mark_article_read(&self, article_id: i64, is_read: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET is_read = ? WHERE id = ? AND is_read != ?")
            .bind(is_read)
            .bind(article_id)
            .bind(is_read)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the favorite flag. Returns whether the row changed.
    pub async fn set_favorite(&self, article_id: i64, is_favorite: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE articles SET is_favorite = ? WHERE id = ? AND is_favorite != ?")
                .bind(is_favorite)
                .bind(article_id)
                .bind(is_favorite)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_article(&self, article_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every article of one feed, or of the whole library with `None`.
    pub async fn delete_articles(&self, feed_id: Option<i64>) -> Result<u64> {
        let result = match feed_id {
            Some(id) => {
                sqlx::query("DELETE FROM articles WHERE feed_id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            None => sqlx::query("DELETE FROM articles").execute(&self.pool).await?,
        };
        tracing::info!(?feed_id, deleted = result.rows_affected(), "Deleted articles");
        Ok(result.rows_affected())
    }

    /// Mark everything read in one feed, or everywhere with `None`.
    ///
    /// Only unread rows are touched, so repeating the call returns 0.
    pub async fn mark_all_read(&self, feed_id: Option<i64>) -> Result<u64> {
        let result = match feed_id {
            Some(id) => {
                sqlx::query("UPDATE articles SET is_read = 1 WHERE feed_id = ? AND is_read = 0")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("UPDATE articles SET is_read = 1 WHERE is_read = 0")
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }
}
