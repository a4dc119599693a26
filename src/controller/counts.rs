//! Unread rollups: global, per group and per feed.
//!
//! A refresh is collected into a [`CountSnapshot`] away from the controller
//! and merged with [`CountAggregator::apply`]. Entries that failed to refresh
//! keep the value they had before.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};

use super::session::GroupKey;
use crate::backend::Backend;
use crate::storage::Feed;

/// Result of one refresh pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountSnapshot {
    /// `None` when the global count could not be determined
    pub global: Option<i64>,
    /// Feeds whose count was fetched successfully
    pub feeds: HashMap<i64, i64>,
    /// Feeds whose count failed; their badges stay as they were
    pub failed: HashSet<i64>,
}

fn group_key(feed: &Feed) -> GroupKey {
    feed.group_id.map_or(GroupKey::Ungrouped, GroupKey::Id)
}

/// Fetch unread counts for `feeds`.
///
/// Tries the batched call first. If that fails, each feed is queried on its
/// own so that one bad feed does not blank every badge.
pub async fn collect_counts<B>(backend: &B, feeds: &[Feed]) -> CountSnapshot
where
    B: Backend + ?Sized,
{
    let mut snapshot = CountSnapshot::default();

    match backend.all_unread_counts().await {
        Ok(batched) => {
            for feed in feeds {
                let count = batched.get(&feed.id).copied().unwrap_or(0);
                snapshot.feeds.insert(feed.id, count);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Batched unread count failed, querying feeds one by one");
            let results = join_all(
                feeds
                    .iter()
                    .map(|feed| async move { (feed.id, backend.unread_count(Some(feed.id)).await) }),
            )
            .await;
            for (feed_id, result) in results {
                match result {
                    Ok(count) => {
                        snapshot.feeds.insert(feed_id, count);
                    }
                    Err(e) => {
                        tracing::warn!(feed_id, error = %e, "Unread count failed");
                        snapshot.failed.insert(feed_id);
                    }
                }
            }
        }
    }

    snapshot.global = match backend.unread_count(None).await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Global unread count failed");
            snapshot
                .failed
                .is_empty()
                .then(|| snapshot.feeds.values().sum())
        }
    };

    snapshot
}

#[derive(Debug, Default)]
pub struct CountAggregator {
    global: i64,
    groups: HashMap<GroupKey, i64>,
    feeds: HashMap<i64, i64>,
    membership: HashMap<i64, GroupKey>,
}

impl CountAggregator {
    /// Track a new feed list. Feeds that disappeared lose their badge; group
    /// totals are recomputed from the last-known feed counts.
    pub fn set_membership(&mut self, feeds: &[Feed]) {
        self.membership = feeds.iter().map(|f| (f.id, group_key(f))).collect();
        let membership = &self.membership;
        self.feeds.retain(|id, _| membership.contains_key(id));
        self.groups = self.sum_groups(&HashSet::new());
    }

    fn sum_groups(&self, failed: &HashSet<i64>) -> HashMap<GroupKey, i64> {
        let mut totals: HashMap<GroupKey, i64> = HashMap::new();
        let mut stale: HashSet<GroupKey> = HashSet::new();
        for (feed_id, key) in &self.membership {
            if failed.contains(feed_id) {
                stale.insert(*key);
            }
            *totals.entry(*key).or_insert(0) += self.feeds.get(feed_id).copied().unwrap_or(0);
        }
        for key in stale {
            match self.groups.get(&key) {
                Some(&previous) => {
                    totals.insert(key, previous);
                }
                None => {
                    totals.remove(&key);
                }
            }
        }
        totals
    }

    pub fn apply(&mut self, snapshot: CountSnapshot) {
        let CountSnapshot {
            global,
            feeds,
            failed,
        } = snapshot;

        for (feed_id, count) in feeds {
            if self.membership.contains_key(&feed_id) {
                self.feeds.insert(feed_id, count);
            }
        }
        self.groups = self.sum_groups(&failed);
        if let Some(global) = global {
            self.global = global;
        }
        tracing::debug!(
            global = self.global,
            failed = failed.len(),
            "Unread counts applied"
        );
    }

    pub fn global(&self) -> i64 {
        self.global
    }

    pub fn feed(&self, feed_id: i64) -> i64 {
        self.feeds.get(&feed_id).copied().unwrap_or(0)
    }

    pub fn group(&self, key: GroupKey) -> i64 {
        self.groups.get(&key).copied().unwrap_or(0)
    }

    pub fn group_of(&self, feed_id: i64) -> Option<GroupKey> {
        self.membership.get(&feed_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::storage::{Article, Group, SearchHit};
    use async_trait::async_trait;

    fn feed(id: i64, group_id: Option<i64>) -> Feed {
        Feed {
            id,
            name: format!("Feed {}", id).into(),
            url: format!("https://example.com/{}", id),
            group_id,
            translate_enabled: false,
            notification_enabled: false,
            last_updated: None,
            last_update_status: None,
            update_attempts: 0,
            next_retry_at: None,
        }
    }

    /// Counts backend where the batched call fails and some feeds fail too
    struct Flaky {
        counts: HashMap<i64, i64>,
        broken: HashSet<i64>,
        batched_ok: bool,
        global_ok: bool,
    }

    fn broken() -> BackendError {
        BackendError::Storage(anyhow::anyhow!("disk I/O error"))
    }

    #[async_trait]
    impl Backend for Flaky {
        async fn list_feeds(&self) -> Result<Vec<Feed>, BackendError> {
            Ok(Vec::new())
        }
        async fn list_groups(&self) -> Result<Vec<Group>, BackendError> {
            Ok(Vec::new())
        }
        async fn list_feeds_by_group(&self, _: i64) -> Result<Vec<Feed>, BackendError> {
            Ok(Vec::new())
        }
        async fn list_articles_by_feed(
            &self,
            _: i64,
            _: usize,
            _: usize,
        ) -> Result<Vec<Article>, BackendError> {
            Ok(Vec::new())
        }
        async fn list_all_articles(&self, _: usize, _: usize) -> Result<Vec<Article>, BackendError> {
            Ok(Vec::new())
        }
        async fn list_unread_articles(
            &self,
            _: usize,
            _: usize,
        ) -> Result<Vec<Article>, BackendError> {
            Ok(Vec::new())
        }
        async fn list_favorite_articles(
            &self,
            _: usize,
            _: usize,
        ) -> Result<Vec<Article>, BackendError> {
            Ok(Vec::new())
        }
        async fn count_articles(&self, _: Option<i64>) -> Result<usize, BackendError> {
            Ok(0)
        }
        async fn search_articles(
            &self,
            _: &str,
            _: usize,
            _: usize,
            _: Option<i64>,
        ) -> Result<Vec<SearchHit>, BackendError> {
            Ok(Vec::new())
        }
        async fn unread_count(&self, feed_id: Option<i64>) -> Result<i64, BackendError> {
            match feed_id {
                None if self.global_ok => Ok(self.counts.values().sum()),
                None => Err(broken()),
                Some(id) if self.broken.contains(&id) => Err(broken()),
                Some(id) => Ok(self.counts.get(&id).copied().unwrap_or(0)),
            }
        }
        async fn all_unread_counts(&self) -> Result<HashMap<i64, i64>, BackendError> {
            if self.batched_ok {
                Ok(self.counts.clone())
            } else {
                Err(broken())
            }
        }
        async fn mark_article_read(&self, _: i64, _: bool) -> Result<(), BackendError> {
            Ok(())
        }
        async fn toggle_favorite(&self, _: i64, _: bool) -> Result<(), BackendError> {
            Ok(())
        }
        async fn delete_article(&self, _: i64) -> Result<(), BackendError> {
            Ok(())
        }
        async fn delete_articles(&self, _: Option<i64>) -> Result<u64, BackendError> {
            Ok(0)
        }
        async fn mark_all_read(&self, _: Option<i64>) -> Result<u64, BackendError> {
            Ok(0)
        }
    }

    fn library() -> Vec<Feed> {
        vec![feed(1, Some(10)), feed(2, Some(10)), feed(3, None)]
    }

    #[tokio::test]
    async fn test_batched_counts_roll_up_into_groups() {
        let backend = Flaky {
            counts: HashMap::from([(1, 4), (3, 2)]),
            broken: HashSet::new(),
            batched_ok: true,
            global_ok: true,
        };
        let feeds = library();
        let mut counts = CountAggregator::default();
        counts.set_membership(&feeds);
        counts.apply(collect_counts(&backend, &feeds).await);

        assert_eq!(counts.global(), 6);
        assert_eq!(counts.feed(2), 0);
        assert_eq!(counts.group(GroupKey::Id(10)), 4);
        assert_eq!(counts.group(GroupKey::Ungrouped), 2);
    }

    #[tokio::test]
    async fn test_failed_feed_keeps_last_known_value() {
        let feeds = library();
        let mut counts = CountAggregator::default();
        counts.set_membership(&feeds);
        counts.apply(CountSnapshot {
            global: Some(9),
            feeds: HashMap::from([(1, 5), (2, 1), (3, 3)]),
            failed: HashSet::new(),
        });

        let backend = Flaky {
            counts: HashMap::from([(1, 7), (2, 0), (3, 1)]),
            broken: HashSet::from([2]),
            batched_ok: false,
            global_ok: false,
        };
        let snapshot = collect_counts(&backend, &feeds).await;
        assert_eq!(snapshot.failed, HashSet::from([2]));
        assert_eq!(snapshot.global, None);

        counts.apply(snapshot);
        assert_eq!(counts.feed(1), 7);
        assert_eq!(counts.feed(2), 1);
        assert_eq!(counts.feed(3), 1);
        // Group 10 has a failed member, so its total is the previous one
        assert_eq!(counts.group(GroupKey::Id(10)), 6);
        assert_eq!(counts.group(GroupKey::Ungrouped), 1);
        assert_eq!(counts.global(), 9);
    }

    #[tokio::test]
    async fn test_global_falls_back_to_sum() {
        let backend = Flaky {
            counts: HashMap::from([(1, 2), (2, 3)]),
            broken: HashSet::new(),
            batched_ok: true,
            global_ok: false,
        };
        let snapshot = collect_counts(&backend, &library()).await;
        assert_eq!(snapshot.global, Some(5));
    }

    #[test]
    fn test_removed_feed_drops_out_of_totals() {
        let mut feeds = library();
        let mut counts = CountAggregator::default();
        counts.set_membership(&feeds);
        counts.apply(CountSnapshot {
            global: Some(6),
            feeds: HashMap::from([(1, 1), (2, 2), (3, 3)]),
            failed: HashSet::new(),
        });

        feeds.retain(|f| f.id != 2);
        counts.set_membership(&feeds);
        assert_eq!(counts.feed(2), 0);
        assert_eq!(counts.group(GroupKey::Id(10)), 1);
        assert_eq!(counts.group_of(3), Some(GroupKey::Ungrouped));
    }
}
