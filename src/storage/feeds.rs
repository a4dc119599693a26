use anyhow::{bail, Result};
use std::collections::HashMap;

use super::schema::Database;
use super::types::{Feed, FeedDbRow};
use crate::util::strip_control_chars;

/// Retry delay ceiling for failing feeds (one hour)
const MAX_RETRY_DELAY_SECS: i64 = 3600;
/// Retry delay after the first failure; doubles per consecutive failure
const BASE_RETRY_DELAY_SECS: i64 = 60;

const FEED_COLUMNS: &str = "id, name, url, group_id, translate_enabled, notification_enabled, \
     last_updated, last_update_status, update_attempts, next_retry_at";

/// Delay before the next attempt after `attempts` consecutive failures
pub(crate) fn retry_delay_secs(attempts: i64) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    BASE_RETRY_DELAY_SECS
        .saturating_mul(1_i64 << exponent)
        .min(MAX_RETRY_DELAY_SECS)
}

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe to a feed, or update the name and group of an existing
    /// subscription with the same URL. Returns the feed id either way.
    pub async fn insert_feed(&self, url: &str, name: &str, group_id: Option<i64>) -> Result<i64> {
        let clean_name = strip_control_chars(name);
        let clean_name = clean_name.trim();
        if clean_name.is_empty() {
            bail!("Feed name cannot be empty");
        }

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, name, group_id) VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET name = excluded.name, group_id = excluded.group_id
            RETURNING id
        "#,
        )
        .bind(url)
        .bind(clean_name)
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Unsubscribe; articles go with the feed via `ON DELETE CASCADE`.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All feeds, grouped feeds first in group order, then by name.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedDbRow>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY group_id IS NULL, group_id, name COLLATE NOCASE
        "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    pub async fn list_feeds_by_group(&self, group_id: i64) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedDbRow>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            WHERE group_id = ?
            ORDER BY name COLLATE NOCASE
        "#
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    pub async fn set_feed_flags(
        &self,
        feed_id: i64,
        translate_enabled: bool,
        notification_enabled: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET translate_enabled = ?, notification_enabled = ? WHERE id = ?",
        )
        .bind(translate_enabled)
        .bind(notification_enabled)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Update Bookkeeping
    // ========================================================================

    /// Record a successful ingestion run: bumps `last_updated`, which is what
    /// the UI watches to raise feed-updated notifications.
    pub async fn record_update_success(&self, feed_id: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_updated = MAX(COALESCE(last_updated, 0) + 1, ?),
                last_update_status = 'ok',
                update_attempts = 0,
                next_retry_at = NULL
            WHERE id = ?
        "#,
        )
        .bind(now)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed ingestion run and schedule the next retry with
    /// exponential backoff. Returns the new attempt count.
    pub async fn record_update_failure(&self, feed_id: i64, error: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let (attempts,): (i64,) = sqlx::query_as(
            "UPDATE feeds SET update_attempts = update_attempts + 1, last_update_status = ? \
             WHERE id = ? RETURNING update_attempts",
        )
        .bind(error)
        .bind(feed_id)
        .fetch_one(&mut *tx)
        .await?;

        let next_retry = chrono::Utc::now().timestamp() + retry_delay_secs(attempts);
        sqlx::query("UPDATE feeds SET next_retry_at = ? WHERE id = ?")
            .bind(next_retry)
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(feed_id, attempts, next_retry, "Recorded feed update failure");
        Ok(attempts)
    }

    /// `feed_id -> last_updated` for every feed that has been updated at least once.
    pub async fn feed_update_marks(&self) -> Result<HashMap<i64, i64>> {
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT id, last_updated FROM feeds WHERE last_updated IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::retry_delay_secs;
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_feed_upserts_by_url() {
        let db = test_db().await;

        let first = db
            .insert_feed("https://a.example.com/rss", "Old", None)
            .await
            .unwrap();
        let second = db
            .insert_feed("https://a.example.com/rss", "New", None)
            .await
            .unwrap();
        assert_eq!(first, second);

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(&*feeds[0].name, "New");
        assert!(feeds[0].notification_enabled);
        assert!(!feeds[0].translate_enabled);
    }

    #[tokio::test]
    async fn test_insert_feed_rejects_blank_name() {
        let db = test_db().await;
        assert!(db
            .insert_feed("https://a.example.com/rss", " \x07 ", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_feeds_orders_ungrouped_last() {
        let db = test_db().await;
        let group = db.create_group("Tech").await.unwrap();
        db.insert_feed("https://z.example.com/rss", "Zeta", Some(group))
            .await
            .unwrap();
        db.insert_feed("https://a.example.com/rss", "Alpha", None)
            .await
            .unwrap();

        let feeds = db.list_feeds().await.unwrap();
        let names: Vec<&str> = feeds.iter().map(|f| &*f.name).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[tokio::test]
    async fn test_set_feed_flags() {
        let db = test_db().await;
        let id = db
            .insert_feed("https://a.example.com/rss", "A", None)
            .await
            .unwrap();

        db.set_feed_flags(id, true, false).await.unwrap();

        let feed = &db.list_feeds().await.unwrap()[0];
        assert!(feed.translate_enabled);
        assert!(!feed.notification_enabled);
    }

    #[tokio::test]
    async fn test_update_failure_then_success_resets_bookkeeping() {
        let db = test_db().await;
        let id = db
            .insert_feed("https://a.example.com/rss", "A", None)
            .await
            .unwrap();

        assert_eq!(db.record_update_failure(id, "timeout").await.unwrap(), 1);
        assert_eq!(db.record_update_failure(id, "timeout").await.unwrap(), 2);
        let feed = &db.list_feeds().await.unwrap()[0];
        assert_eq!(feed.update_attempts, 2);
        assert_eq!(feed.last_update_status.as_deref(), Some("timeout"));
        assert!(feed.next_retry_at.is_some());

        db.record_update_success(id).await.unwrap();
        let feed = &db.list_feeds().await.unwrap()[0];
        assert_eq!(feed.update_attempts, 0);
        assert_eq!(feed.next_retry_at, None);
        assert_eq!(feed.last_update_status.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_update_marks_advance_on_every_success() {
        let db = test_db().await;
        let id = db
            .insert_feed("https://a.example.com/rss", "A", None)
            .await
            .unwrap();
        assert!(db.feed_update_marks().await.unwrap().is_empty());

        db.record_update_success(id).await.unwrap();
        let first = db.feed_update_marks().await.unwrap()[&id];
        db.record_update_success(id).await.unwrap();
        let second = db.feed_update_marks().await.unwrap()[&id];
        assert!(second > first);
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        assert_eq!(retry_delay_secs(1), 60);
        assert_eq!(retry_delay_secs(2), 120);
        assert_eq!(retry_delay_secs(3), 240);
        assert_eq!(retry_delay_secs(10), 3600);
        assert_eq!(retry_delay_secs(i64::MAX), 3600);
    }

    #[tokio::test]
    async fn test_delete_feed_cascades_articles() {
        let db = test_db().await;
        let id = db
            .insert_feed("https://a.example.com/rss", "A", None)
            .await
            .unwrap();
        db.insert_articles(
            id,
            &[crate::storage::NewArticle {
                title: "Hello".to_string(),
                link: "https://a.example.com/1".to_string(),
                content: String::new(),
                published: 1_700_000_000,
                author: None,
                thumbnail: None,
            }],
        )
        .await
        .unwrap();

        db.delete_feed(id).await.unwrap();
        assert_eq!(db.count_articles(None).await.unwrap(), 0);
    }
}
