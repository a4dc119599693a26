use anyhow::Result;
use thiserror::Error;

use super::articles::{page_bounds, ARTICLE_COLUMNS};
use super::schema::Database;
use super::types::{SearchDbRow, SearchHit};
use crate::util::MAX_SEARCH_QUERY_LENGTH;

// ============================================================================
// FTS5 Query Validation
// ============================================================================

const MAX_WILDCARDS: usize = 3;
const MAX_OR_OPERATORS: usize = 5;
const MAX_PARENTHESES: usize = 5;
const MAX_AND_OPERATORS: usize = 10;

/// A search query refused before it reaches SQLite
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryRejected {
    #[error("Search query exceeds maximum length of {} characters", MAX_SEARCH_QUERY_LENGTH)]
    TooLong,
    #[error("Search query contains too many wildcards (max {})", MAX_WILDCARDS)]
    TooManyWildcards,
    #[error("Search query contains too many OR operators (max {})", MAX_OR_OPERATORS)]
    TooManyOr,
    #[error("Search query contains too many AND operators (max {})", MAX_AND_OPERATORS)]
    TooManyAnd,
    #[error("Search query contains too many parentheses (max {})", MAX_PARENTHESES)]
    TooManyParentheses,
    #[error("Search query has unbalanced parentheses")]
    UnbalancedParentheses,
}

/// Bound FTS5 query complexity so a single search cannot trigger an
/// expensive wildcard expansion.
fn validate_fts_query(query: &str) -> Result<(), QueryRejected> {
    if query.len() > MAX_SEARCH_QUERY_LENGTH {
        return Err(QueryRejected::TooLong);
    }
    if query.matches('*').count() > MAX_WILDCARDS {
        return Err(QueryRejected::TooManyWildcards);
    }

    let upper = query.to_uppercase();
    if upper.matches(" OR ").count() > MAX_OR_OPERATORS {
        return Err(QueryRejected::TooManyOr);
    }
    if upper.matches(" AND ").count() > MAX_AND_OPERATORS {
        return Err(QueryRejected::TooManyAnd);
    }

    let open = query.chars().filter(|&c| c == '(').count();
    let close = query.chars().filter(|&c| c == ')').count();
    if open > MAX_PARENTHESES {
        return Err(QueryRejected::TooManyParentheses);
    }
    if open != close {
        return Err(QueryRejected::UnbalancedParentheses);
    }

    Ok(())
}

impl Database {
    // ========================================================================
    // Search Operations
    // ========================================================================

    /// Full-text search over titles and content, newest first, optionally
    /// narrowed to one feed. Each hit carries its feed's name.
    ///
    /// Uses FTS5 `MATCH` and falls back to `LIKE` when SQLite rejects the
    /// query syntax (stray quotes, bare operators).
    pub async fn search_articles(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
        feed_id: Option<i64>,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        validate_fts_query(query)?;

        let (limit, offset) = page_bounds(limit, offset);
        tracing::debug!(query = %query, ?feed_id, limit, offset, "search_articles");

        let fts_result = sqlx::query_as::<_, SearchDbRow>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}, f.name AS feed_name
            FROM articles a
            INNER JOIN articles_fts ON a.id = articles_fts.rowid
            INNER JOIN feeds f ON f.id = a.feed_id
            WHERE articles_fts MATCH ?1 AND (?2 IS NULL OR a.feed_id = ?2)
            ORDER BY a.published DESC, a.id DESC
            LIMIT ?3 OFFSET ?4
        "#
        ))
        .bind(query)
        .bind(feed_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;

        let rows = match fts_result {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "FTS5 search failed, falling back to LIKE");
                let like_pattern = format!("%{}%", query);
                sqlx::query_as::<_, SearchDbRow>(&format!(
                    r#"
                    SELECT {ARTICLE_COLUMNS}, f.name AS feed_name
                    FROM articles a
                    INNER JOIN feeds f ON f.id = a.feed_id
                    WHERE (a.title LIKE ?1 OR a.content LIKE ?1)
                      AND (?2 IS NULL OR a.feed_id = ?2)
                    ORDER BY a.published DESC, a.id DESC
                    LIMIT ?3 OFFSET ?4
                "#
                ))
                .bind(&like_pattern)
                .bind(feed_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(SearchDbRow::into_hit).collect())
    }

    // ========================================================================
    // FTS5 Maintenance Operations
    // ========================================================================

    /// Rebuild the FTS5 index from the articles table, returning the number
    /// of articles indexed.
    pub async fn rebuild_search_index(&self) -> Result<usize> {
        sqlx::query("INSERT INTO articles_fts(articles_fts) VALUES('rebuild')")
            .execute(&self.pool)
            .await?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;

        Ok(usize::try_from(count.0).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_fts_query, QueryRejected};
    use crate::storage::{Database, NewArticle};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_article(slug: &str, title: &str, published: i64) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            link: format!("https://example.com/{}", slug),
            content: "Test content".to_string(),
            published,
            author: None,
            thumbnail: None,
        }
    }

    async fn seeded_db() -> (Database, i64, i64) {
        let db = test_db().await;
        let rust = db
            .insert_feed("https://rust.example.com/rss", "Rust Blog", None)
            .await
            .unwrap();
        let misc = db
            .insert_feed("https://misc.example.com/rss", "Misc", None)
            .await
            .unwrap();
        db.insert_articles(
            rust,
            &[
                test_article("1", "Rust Programming Guide", 3),
                test_article("2", "Async Rust in Practice", 2),
            ],
        )
        .await
        .unwrap();
        db.insert_articles(
            misc,
            &[
                test_article("3", "Python Tutorial", 1),
                test_article("4", "Rust for Pythonistas", 4),
            ],
        )
        .await
        .unwrap();
        (db, rust, misc)
    }

    #[tokio::test]
    async fn test_search_by_title_carries_feed_name() {
        let (db, _, _) = seeded_db().await;

        let hits = db.search_articles("Python", 50, 0, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(&*hits[0].article.title, "Python Tutorial");
        assert_eq!(&*hits[0].feed_name, "Misc");
    }

    #[tokio::test]
    async fn test_search_orders_newest_first_and_pages() {
        let (db, _, _) = seeded_db().await;

        let hits = db.search_articles("rust", 50, 0, None).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| &*h.article.title).collect();
        assert_eq!(
            titles,
            vec![
                "Rust for Pythonistas",
                "Rust Programming Guide",
                "Async Rust in Practice"
            ]
        );

        let second_page = db.search_articles("rust", 2, 2, None).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(&*second_page[0].article.title, "Async Rust in Practice");
    }

    #[tokio::test]
    async fn test_search_narrowed_to_feed() {
        let (db, rust, _) = seeded_db().await;

        let hits = db.search_articles("rust", 50, 0, Some(rust)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.article.feed_id == rust));
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let db = test_db().await;
        assert!(db.search_articles("   ", 10, 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_syntax_error_falls_back_to_like() {
        let (db, _, _) = seeded_db().await;

        // A lone double quote is invalid FTS5 syntax
        let hits = db.search_articles("Guide\"", 10, 0, None).await;
        assert!(hits.is_ok());
    }

    #[tokio::test]
    async fn test_search_rejects_complex_query() {
        let db = test_db().await;

        let err = db
            .search_articles("a* b* c* d*", 10, 0, None)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<QueryRejected>(),
            Some(&QueryRejected::TooManyWildcards)
        );
    }

    #[tokio::test]
    async fn test_index_follows_deletes_and_rebuild() {
        let (db, rust, _) = seeded_db().await;

        db.delete_articles(Some(rust)).await.unwrap();
        let hits = db.search_articles("Guide", 10, 0, None).await.unwrap();
        assert!(hits.is_empty());

        assert_eq!(db.rebuild_search_index().await.unwrap(), 2);
        let hits = db.search_articles("Python", 10, 0, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_validate_fts_query_limits() {
        assert!(validate_fts_query("rust async").is_ok());
        assert_eq!(
            validate_fts_query(&"a".repeat(257)),
            Err(QueryRejected::TooLong)
        );
        assert_eq!(
            validate_fts_query("a or b or c or d or e or f or g"),
            Err(QueryRejected::TooManyOr)
        );
        assert_eq!(
            validate_fts_query("((((((a))))))"),
            Err(QueryRejected::TooManyParentheses)
        );
        assert_eq!(
            validate_fts_query("(rust"),
            Err(QueryRejected::UnbalancedParentheses)
        );
        let many_and = (0..12).map(|i| format!("t{}", i)).collect::<Vec<_>>().join(" AND ");
        assert_eq!(validate_fts_query(&many_and), Err(QueryRejected::TooManyAnd));
    }
}
