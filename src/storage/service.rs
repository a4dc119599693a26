use async_trait::async_trait;
use std::collections::HashMap;

use super::schema::Database;
use super::search::QueryRejected;
use super::types::{Article, Feed, Group, SearchHit};
use crate::backend::{Backend, BackendError};

/// Surface validation failures as `InvalidQuery`, everything else as storage errors
fn search_error(err: anyhow::Error) -> BackendError {
    match err.downcast_ref::<QueryRejected>() {
        Some(rejected) => BackendError::InvalidQuery(rejected.to_string()),
        None => BackendError::Storage(err),
    }
}

#[async_trait]
impl Backend for Database {
    async fn list_feeds(&self) -> Result<Vec<Feed>, BackendError> {
        Ok(Database::list_feeds(self).await?)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, BackendError> {
        Ok(Database::list_groups(self).await?)
    }

    async fn list_feeds_by_group(&self, group_id: i64) -> Result<Vec<Feed>, BackendError> {
        Ok(Database::list_feeds_by_group(self, group_id).await?)
    }

    async fn list_articles_by_feed(
        &self,
        feed_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError> {
        Ok(Database::list_articles_by_feed(self, feed_id, limit, offset).await?)
    }

    async fn list_all_articles(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError> {
        Ok(Database::list_all_articles(self, limit, offset).await?)
    }

    async fn list_unread_articles(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError> {
        Ok(Database::list_unread_articles(self, limit, offset).await?)
    }

    async fn list_favorite_articles(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError> {
        Ok(Database::list_favorite_articles(self, limit, offset).await?)
    }

    async fn count_articles(&self, feed_id: Option<i64>) -> Result<usize, BackendError> {
        let count = Database::count_articles(self, feed_id).await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn search_articles(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
        feed_id: Option<i64>,
    ) -> Result<Vec<SearchHit>, BackendError> {
        Database::search_articles(self, query, limit, offset, feed_id)
            .await
            .map_err(search_error)
    }

    async fn unread_count(&self, feed_id: Option<i64>) -> Result<i64, BackendError> {
        Ok(Database::unread_count(self, feed_id).await?)
    }

    async fn all_unread_counts(&self) -> Result<HashMap<i64, i64>, BackendError> {
        Ok(Database::all_unread_counts(self).await?)
    }

    async fn mark_article_read(&self, article_id: i64, is_read: bool) -> Result<(), BackendError> {
        Database::mark_article_read(self, article_id, is_read).await?;
        Ok(())
    }

    async fn toggle_favorite(
        &self,
        article_id: i64,
        is_favorite: bool,
    ) -> Result<(), BackendError> {
        Database::set_favorite(self, article_id, is_favorite).await?;
        Ok(())
    }

    async fn delete_article(&self, article_id: i64) -> Result<(), BackendError> {
        Database::delete_article(self, article_id).await?;
        Ok(())
    }

    async fn delete_articles(&self, feed_id: Option<i64>) -> Result<u64, BackendError> {
        Ok(Database::delete_articles(self, feed_id).await?)
    }

    async fn mark_all_read(&self, feed_id: Option<i64>) -> Result<u64, BackendError> {
        Ok(Database::mark_all_read(self, feed_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{Backend, BackendError};
    use crate::storage::Database;

    #[tokio::test]
    async fn test_rejected_search_maps_to_invalid_query() {
        let db = Database::open(":memory:").await.unwrap();
        let backend: &dyn Backend = &db;

        let err = backend
            .search_articles("(unbalanced", 10, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_backend_counts_match_storage() {
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .insert_feed("https://a.example.com/rss", "A", None)
            .await
            .unwrap();
        let backend: &dyn Backend = &db;

        assert_eq!(backend.count_articles(Some(feed)).await.unwrap(), 0);
        assert_eq!(backend.unread_count(None).await.unwrap(), 0);
        assert_eq!(backend.all_unread_counts().await.unwrap()[&feed], 0);
    }
}
