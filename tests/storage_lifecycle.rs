//! Integration tests for the library lifecycle as the ingestion process and
//! the reader see it: subscribe, group, ingest, read, regroup, delete.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use feedpane::backend::Backend;
use feedpane::controller::{collect_counts, CountAggregator, GroupKey};
use feedpane::storage::{Database, NewArticle};
use pretty_assertions::assert_eq;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn post(slug: &str, title: &str, published: i64) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        link: format!("https://example.com/{}", slug),
        content: format!("{} body text", title),
        published,
        author: Some("Editor".to_string()),
        thumbnail: None,
    }
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_reingest_keeps_reader_state() {
    let db = test_db().await;
    let feed = db
        .insert_feed("https://example.com/rss", "Example", None)
        .await
        .unwrap();

    let batch = vec![
        post("a", "Async Rust", 1_700_000_000),
        post("b", "Borrow checker", 1_700_000_100),
    ];
    assert_eq!(db.insert_articles(feed, &batch).await.unwrap(), 2);

    let newest = db.list_all_articles(1, 0).await.unwrap();
    assert_eq!(&*newest[0].title, "Borrow checker");
    db.mark_article_read(newest[0].id, true).await.unwrap();
    db.set_favorite(newest[0].id, true).await.unwrap();

    // The next run sees the same two items plus one new one
    let mut again = batch.clone();
    again.push(post("c", "Cargo workspaces", 1_700_000_200));
    assert_eq!(db.insert_articles(feed, &again).await.unwrap(), 1);

    let all = db.list_all_articles(10, 0).await.unwrap();
    assert_eq!(all.len(), 3);
    let kept = all.iter().find(|a| a.id == newest[0].id).unwrap();
    assert!(kept.is_read);
    assert!(kept.is_favorite);
    assert_eq!(db.unread_count(Some(feed)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_marks_follow_successful_runs_only() {
    let db = test_db().await;
    let feed = db
        .insert_feed("https://example.com/rss", "Example", None)
        .await
        .unwrap();
    assert!(db.feed_update_marks().await.unwrap().is_empty());

    db.record_update_failure(feed, "timeout").await.unwrap();
    assert!(db.feed_update_marks().await.unwrap().is_empty());

    db.record_update_success(feed).await.unwrap();
    let first = db.feed_update_marks().await.unwrap()[&feed];
    db.record_update_success(feed).await.unwrap();
    let second = db.feed_update_marks().await.unwrap()[&feed];
    assert!(second > first);
}

// ============================================================================
// Groups and badges
// ============================================================================

#[tokio::test]
async fn test_badges_follow_regrouping() {
    let db = test_db().await;
    let tech = db.create_group("Tech").await.unwrap();
    let rust = db
        .insert_feed("https://example.com/rust.xml", "Rust", Some(tech))
        .await
        .unwrap();
    let news = db
        .insert_feed("https://example.com/news.xml", "News", None)
        .await
        .unwrap();
    db.insert_articles(rust, &[post("r1", "Rust 1", 1), post("r2", "Rust 2", 2)])
        .await
        .unwrap();
    db.insert_articles(news, &[post("n1", "News 1", 3)])
        .await
        .unwrap();

    let mut counts = CountAggregator::default();
    let feeds = db.list_feeds().await.unwrap();
    counts.set_membership(&feeds);
    counts.apply(collect_counts(&db, &feeds).await);
    assert_eq!(counts.group(GroupKey::Id(tech)), 2);
    assert_eq!(counts.group(GroupKey::Ungrouped), 1);
    assert_eq!(counts.global(), 3);

    // Deleting the group sends its feeds to the ungrouped bucket
    db.delete_group(tech).await.unwrap();
    let feeds = db.list_feeds().await.unwrap();
    assert!(feeds.iter().all(|f| f.group_id.is_none()));
    counts.set_membership(&feeds);
    counts.apply(collect_counts(&db, &feeds).await);
    assert_eq!(counts.group(GroupKey::Id(tech)), 0);
    assert_eq!(counts.group(GroupKey::Ungrouped), 3);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_deleted_feed_leaves_no_trace() {
    let db = test_db().await;
    let keep = db
        .insert_feed("https://example.com/keep.xml", "Keep", None)
        .await
        .unwrap();
    let drop = db
        .insert_feed("https://example.com/drop.xml", "Drop", None)
        .await
        .unwrap();
    db.insert_articles(keep, &[post("k", "Tokio scheduler", 1)])
        .await
        .unwrap();
    db.insert_articles(drop, &[post("d", "Tokio internals", 2)])
        .await
        .unwrap();
    assert_eq!(Backend::search_articles(&db, "tokio", 10, 0, None).await.unwrap().len(), 2);

    db.delete_feed(drop).await.unwrap();

    let hits = Backend::search_articles(&db, "tokio", 10, 0, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(&*hits[0].feed_name, "Keep");
    assert_eq!(Backend::count_articles(&db, None).await.unwrap(), 1);
    assert!(!db.all_unread_counts().await.unwrap().contains_key(&drop));
}

#[tokio::test]
async fn test_bulk_operations_scoped_to_feed() {
    let db = test_db().await;
    let a = db
        .insert_feed("https://example.com/a.xml", "A", None)
        .await
        .unwrap();
    let b = db
        .insert_feed("https://example.com/b.xml", "B", None)
        .await
        .unwrap();
    db.insert_articles(a, &[post("a1", "A1", 1), post("a2", "A2", 2)])
        .await
        .unwrap();
    db.insert_articles(b, &[post("b1", "B1", 3)]).await.unwrap();

    assert_eq!(Backend::mark_all_read(&db, Some(a)).await.unwrap(), 2);
    assert_eq!(db.unread_count(None).await.unwrap(), 1);

    assert_eq!(Backend::delete_articles(&db, Some(a)).await.unwrap(), 2);
    assert_eq!(db.count_articles(None).await.unwrap(), 1);

    assert_eq!(Backend::delete_articles(&db, None).await.unwrap(), 1);
    assert_eq!(db.count_articles(None).await.unwrap(), 0);
}
