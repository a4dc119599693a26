//! The data-service port the article view controller talks to.
//!
//! Every query the controller issues goes through [`Backend`], so the
//! controller can be driven by the SQLite store in production and by
//! wrappers that count calls or inject failures in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::storage::{Article, Feed, Group, SearchHit};

/// A rejected backend call. All variants are recoverable query failures.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The search text was refused before reaching the store
    #[error("{0}")]
    InvalidQuery(String),

    /// The task running the call panicked
    #[error("Background task panicked: {0}")]
    TaskPanicked(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Query and mutation operations of the backend data service.
///
/// List operations return newest articles first and honour `limit`/`offset`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_feeds(&self) -> Result<Vec<Feed>, BackendError>;
    async fn list_groups(&self) -> Result<Vec<Group>, BackendError>;
    async fn list_feeds_by_group(&self, group_id: i64) -> Result<Vec<Feed>, BackendError>;

    async fn list_articles_by_feed(
        &self,
        feed_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError>;
    async fn list_all_articles(&self, limit: usize, offset: usize)
        -> Result<Vec<Article>, BackendError>;
    async fn list_unread_articles(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError>;
    async fn list_favorite_articles(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, BackendError>;
    /// Article total for one feed, or the whole library with `None`
    async fn count_articles(&self, feed_id: Option<i64>) -> Result<usize, BackendError>;

    async fn search_articles(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
        feed_id: Option<i64>,
    ) -> Result<Vec<SearchHit>, BackendError>;

    async fn unread_count(&self, feed_id: Option<i64>) -> Result<i64, BackendError>;
    async fn all_unread_counts(&self) -> Result<HashMap<i64, i64>, BackendError>;

    async fn mark_article_read(&self, article_id: i64, is_read: bool) -> Result<(), BackendError>;
    async fn toggle_favorite(&self, article_id: i64, is_favorite: bool)
        -> Result<(), BackendError>;
    async fn delete_article(&self, article_id: i64) -> Result<(), BackendError>;
    async fn delete_articles(&self, feed_id: Option<i64>) -> Result<u64, BackendError>;
    async fn mark_all_read(&self, feed_id: Option<i64>) -> Result<u64, BackendError>;
}
