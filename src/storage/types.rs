use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The feed database is locked by another process. Close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Returns true when the message looks like SQLite lock contention
    pub(crate) fn is_lock_message(message: &str) -> bool {
        let lowered = message.to_lowercase();
        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        lowered.contains("database is locked")
            || lowered.contains("database table is locked")
            || lowered.contains("sqlite_busy")
            || lowered.contains("sqlite_locked")
            || lowered.contains("unable to open database file")
    }

    /// Classify a sqlx error, folding lock contention into `InstanceLocked`
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if Self::is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

// ============================================================================
// Ingestion Input
// ============================================================================

/// An article as handed over by the ingestion process.
///
/// `link` is the per-feed identity: a second insert with the same link for the
/// same feed is ignored so read/favorite state survives re-ingestion.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub content: String,
    pub published: i64,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for article queries, converted via `into_article()`
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub translated_title: Option<String>,
    pub content: String,
    pub translated_content: Option<String>,
    pub published: i64,
    pub author: Option<String>,
    pub link: String,
    pub thumbnail: Option<String>,
    pub is_read: bool,
    pub is_favorite: bool,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Article {
        Article {
            id: self.id,
            feed_id: self.feed_id,
            title: Arc::from(self.title),
            translated_title: self.translated_title.map(Arc::from),
            content: Arc::from(self.content),
            translated_content: self.translated_content.map(Arc::from),
            published: self.published,
            author: self.author.map(Arc::from),
            link: Arc::from(self.link),
            thumbnail: self.thumbnail.map(Arc::from),
            is_read: self.is_read,
            is_favorite: self.is_favorite,
        }
    }
}

/// Search rows carry the originating feed's name alongside the article columns
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SearchDbRow {
    #[sqlx(flatten)]
    pub article: ArticleDbRow,
    pub feed_name: String,
}

impl SearchDbRow {
    pub(crate) fn into_hit(self) -> SearchHit {
        SearchHit {
            article: self.article.into_article(),
            feed_name: Arc::from(self.feed_name),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub group_id: Option<i64>,
    pub translate_enabled: bool,
    pub notification_enabled: bool,
    pub last_updated: Option<i64>,
    pub last_update_status: Option<String>,
    pub update_attempts: i64,
    pub next_retry_at: Option<i64>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            name: Arc::from(self.name),
            url: self.url,
            group_id: self.group_id,
            translate_enabled: self.translate_enabled,
            notification_enabled: self.notification_enabled,
            last_updated: self.last_updated,
            last_update_status: self.last_update_status,
            update_attempts: self.update_attempts,
            next_retry_at: self.next_retry_at,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A subscription source.
///
/// `name` is `Arc<str>` because the controller keeps a feed-id → name cache
/// that is cloned into every rendered list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: i64,
    pub name: Arc<str>,
    pub url: String,
    /// `None` places the feed in the ungrouped bucket
    pub group_id: Option<i64>,
    pub translate_enabled: bool,
    pub notification_enabled: bool,
    pub last_updated: Option<i64>,
    /// "ok" or the last error message
    pub last_update_status: Option<String>,
    pub update_attempts: i64,
    pub next_retry_at: Option<i64>,
}

/// A named, ordered container of feeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: Arc<str>,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: Arc<str>,
    pub translated_title: Option<Arc<str>>,
    pub content: Arc<str>,
    pub translated_content: Option<Arc<str>>,
    /// Unix seconds
    pub published: i64,
    pub author: Option<Arc<str>>,
    pub link: Arc<str>,
    pub thumbnail: Option<Arc<str>>,
    pub is_read: bool,
    pub is_favorite: bool,
}

impl Article {
    /// Title to show in lists: the translation when one exists
    pub fn display_title(&self) -> &Arc<str> {
        self.translated_title.as_ref().unwrap_or(&self.title)
    }
}

/// A full-text search hit paired with the display name of its feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub article: Article,
    pub feed_name: Arc<str>,
}
