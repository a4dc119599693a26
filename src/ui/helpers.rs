//! Background task spawning.
//!
//! Every task runs inside [`catch_task_panic`] and reports back through the
//! `AppEvent` channel; nothing here touches `App` after the spawn.

use crate::app::{App, AppEvent, Mutation};
use feedpane::backend::{Backend, BackendError};
use feedpane::controller::{collect_counts, fetch_page, LoadRequest};
use feedpane::storage::Database;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Wraps a future to catch panics and convert them to errors.
///
/// - `Ok(result)` if the future completes normally
/// - `Err(panic_message)` if the future panics
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic payload".to_string()
            }
        })
}

async fn send(tx: &mpsc::Sender<AppEvent>, event: AppEvent, name: &'static str) {
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, event = name, "Channel send failed (receiver dropped)");
    }
}

async fn report_panic(tx: &mpsc::Sender<AppEvent>, task: &'static str, error: String) {
    tracing::error!(task, error = %error, "Background task panicked");
    send(tx, AppEvent::TaskPanicked { task, error }, "TaskPanicked").await;
}

/// Fetch a page in the background. `None` (a dropped request) is a no-op.
pub(super) fn spawn_page_load(
    app: &App,
    request: Option<LoadRequest>,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let Some(request) = request else {
        return;
    };
    let db = app.db.clone();
    let tx = event_tx.clone();
    tracing::debug!(page = request.page, token = request.token, "Spawning page load");

    tokio::spawn(async move {
        let result = match catch_task_panic(fetch_page(&db, &request)).await {
            Ok(result) => result,
            Err(panic_msg) => {
                tracing::error!(task = "page_load", page = request.page, error = %panic_msg, "Background task panicked");
                Err(BackendError::TaskPanicked(panic_msg))
            }
        };
        send(&tx, AppEvent::PageLoaded { request, result }, "PageLoaded").await;
    });
}

/// Reload feeds and groups. The handler follows up with a count refresh.
pub(super) fn spawn_directory_load(app: &App, event_tx: &mpsc::Sender<AppEvent>) {
    let db = app.db.clone();
    let tx = event_tx.clone();

    tokio::spawn(async move {
        let outcome = catch_task_panic(async {
            let feeds = db.list_feeds().await?;
            let groups = db.list_groups().await?;
            anyhow::Ok((feeds, groups))
        })
        .await;
        match outcome {
            Ok(result) => {
                let result = result.map_err(|e| e.to_string());
                send(&tx, AppEvent::DirectoryLoaded(result), "DirectoryLoaded").await;
            }
            Err(panic_msg) => report_panic(&tx, "directory_load", panic_msg).await,
        }
    });
}

/// Recompute unread badges for the feeds currently in the sidebar.
pub(super) fn spawn_count_refresh(app: &App, event_tx: &mpsc::Sender<AppEvent>) {
    let db = app.db.clone();
    let tx = event_tx.clone();
    let feeds = app.controller.tree().feeds().to_vec();

    tokio::spawn(async move {
        match catch_task_panic(collect_counts(&db, &feeds)).await {
            Ok(snapshot) => send(&tx, AppEvent::CountsRefreshed(snapshot), "CountsRefreshed").await,
            Err(panic_msg) => report_panic(&tx, "count_refresh", panic_msg).await,
        }
    });
}

async fn persist(db: &Database, mutation: Mutation) -> Result<u64, BackendError> {
    match mutation {
        Mutation::MarkRead {
            article_id,
            is_read,
        } => Backend::mark_article_read(db, article_id, is_read)
            .await
            .map(|_| 1),
        Mutation::Favorite {
            article_id,
            is_favorite,
        } => Backend::toggle_favorite(db, article_id, is_favorite)
            .await
            .map(|_| 1),
        Mutation::Delete { article_id } => Backend::delete_article(db, article_id).await.map(|_| 1),
        Mutation::DeleteAll { feed_id } => Backend::delete_articles(db, feed_id).await,
        Mutation::MarkAllRead { feed_id } => Backend::mark_all_read(db, feed_id).await,
    }
}

/// Write an optimistic change through to the store.
pub(super) fn spawn_mutation(app: &App, mutation: Mutation, event_tx: &mpsc::Sender<AppEvent>) {
    let db = app.db.clone();
    let tx = event_tx.clone();

    tokio::spawn(async move {
        let event = match catch_task_panic(persist(&db, mutation)).await {
            Ok(Ok(affected)) => AppEvent::MutationApplied { mutation, affected },
            Ok(Err(e)) => {
                tracing::error!(?mutation, error = %e, "Mutation failed");
                AppEvent::MutationFailed {
                    mutation,
                    error: e.to_string(),
                }
            }
            Err(panic_msg) => {
                tracing::error!(task = "mutation", ?mutation, error = %panic_msg, "Background task panicked");
                AppEvent::MutationFailed {
                    mutation,
                    error: format!("task panicked: {}", panic_msg),
                }
            }
        };
        send(&tx, event, "Mutation").await;
    });
}

/// Feeds whose update mark is new or moved forward.
pub(super) fn changed_feeds(previous: &HashMap<i64, i64>, current: &HashMap<i64, i64>) -> Vec<i64> {
    let mut changed: Vec<i64> = current
        .iter()
        .filter(|&(id, mark)| previous.get(id).map_or(true, |prev| prev < mark))
        .map(|(id, _)| *id)
        .collect();
    changed.sort_unstable();
    changed
}

/// Poll the store for feeds written by the ingestion process.
///
/// The first poll only records a baseline. Stops once the app side of the
/// channel is gone.
pub(super) fn spawn_feed_watcher(
    db: Database,
    period: Duration,
    event_tx: mpsc::Sender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut marks: Option<HashMap<i64, i64>> = None;

        loop {
            ticker.tick().await;
            let current = match catch_task_panic(db.feed_update_marks()).await {
                Ok(Ok(current)) => current,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Feed update poll failed");
                    continue;
                }
                Err(panic_msg) => {
                    report_panic(&event_tx, "feed_watcher", panic_msg).await;
                    continue;
                }
            };

            if let Some(previous) = &marks {
                let feed_ids = changed_feeds(previous, &current);
                if !feed_ids.is_empty() {
                    tracing::info!(feeds = feed_ids.len(), "Feeds updated");
                    if event_tx.send(AppEvent::FeedUpdated { feed_ids }).await.is_err() {
                        tracing::debug!("Feed watcher stopping (receiver dropped)");
                        break;
                    }
                }
            }
            marks = Some(current);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_ok() {
        let result = catch_task_panic(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_catch_task_panic_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result, Err("boom".to_string()));

        let result: Result<(), String> =
            catch_task_panic(async { panic!("feed {} failed", 7) }).await;
        assert_eq!(result, Err("feed 7 failed".to_string()));
    }

    #[test]
    fn test_changed_feeds() {
        let previous = HashMap::from([(1, 100), (2, 200)]);
        let current = HashMap::from([(1, 100), (2, 201), (3, 50)]);
        assert_eq!(changed_feeds(&previous, &current), vec![2, 3]);
        assert!(changed_feeds(&current, &current).is_empty());
    }

    #[tokio::test]
    async fn test_feed_watcher_reports_updates() {
        let db = Database::open(":memory:").await.unwrap();
        let feed_id = db
            .insert_feed("https://example.com/rss", "Example", None)
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_feed_watcher(db.clone(), Duration::from_millis(20), tx);

        // Let the baseline poll happen before the update
        tokio::time::sleep(Duration::from_millis(50)).await;
        db.record_update_success(feed_id).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            AppEvent::FeedUpdated { feed_ids } => assert_eq!(feed_ids, vec![feed_id]),
            _ => panic!("expected FeedUpdated"),
        }
        handle.abort();
    }
}
