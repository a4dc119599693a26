//! Turns a [`LoadRequest`] into backend calls.
//!
//! Default browsing pages on the backend. Status filters, group scopes and
//! search pull the whole candidate set (bounded by the fetch cap), narrow it
//! locally and slice the requested page out of it, recomputing the total
//! from the full set every time.

use std::collections::HashSet;
use std::sync::Arc;

use super::list::RenderMode;
use super::session::{FetchStrategy, FilterMode, GroupKey, ViewScope};
use crate::backend::{Backend, BackendError};
use crate::storage::Article;

/// Everything needed to fetch and apply one page, detached from the
/// controller so it can travel to a background task and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Session token at the time the request was issued
    pub token: u64,
    pub page: usize,
    pub page_size: usize,
    /// Upper bound on rows pulled for client-side filtering
    pub fetch_cap: usize,
    pub mode: RenderMode,
    pub strategy: FetchStrategy,
}

impl LoadRequest {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.page_size
    }
}

/// One article of a fetched page; search hits bring their feed's name along
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    pub article: Article,
    pub feed_name: Option<Arc<str>>,
}

impl From<Article> for PageItem {
    fn from(article: Article) -> Self {
        Self {
            article,
            feed_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageData {
    pub items: Vec<PageItem>,
    /// Size of the whole result set the page was cut from
    pub total: usize,
}

impl PageData {
    fn from_articles(articles: Vec<Article>, total: usize) -> Self {
        Self {
            items: articles.into_iter().map(PageItem::from).collect(),
            total,
        }
    }

    /// Cut `[offset, offset + size)` out of a fully fetched, ordered set
    fn sliced(full: Vec<PageItem>, offset: usize, size: usize) -> Self {
        let total = full.len();
        let items = full.into_iter().skip(offset).take(size).collect();
        Self { items, total }
    }
}

fn passes(filter: FilterMode, article: &Article) -> bool {
    match filter {
        FilterMode::All => true,
        FilterMode::Unread => !article.is_read,
        FilterMode::Favorite => article.is_favorite,
    }
}

/// Feed ids belonging to a group; the ungrouped bucket is every feed
/// without a group.
async fn group_members<B>(backend: &B, key: GroupKey) -> Result<HashSet<i64>, BackendError>
where
    B: Backend + ?Sized,
{
    let feeds = match key {
        GroupKey::Id(group_id) => backend.list_feeds_by_group(group_id).await?,
        GroupKey::Ungrouped => backend
            .list_feeds()
            .await?
            .into_iter()
            .filter(|feed| feed.group_id.is_none())
            .collect(),
    };
    Ok(feeds.into_iter().map(|feed| feed.id).collect())
}

/// Status-filtered candidates across the whole library
async fn library_candidates<B>(
    backend: &B,
    filter: FilterMode,
    cap: usize,
) -> Result<Vec<Article>, BackendError>
where
    B: Backend + ?Sized,
{
    match filter {
        FilterMode::All => backend.list_all_articles(cap, 0).await,
        FilterMode::Unread => backend.list_unread_articles(cap, 0).await,
        FilterMode::Favorite => backend.list_favorite_articles(cap, 0).await,
    }
}

/// Fetch the page described by `request`.
pub async fn fetch_page<B>(backend: &B, request: &LoadRequest) -> Result<PageData, BackendError>
where
    B: Backend + ?Sized,
{
    let offset = request.offset();
    let size = request.page_size;
    let cap = request.fetch_cap;
    tracing::debug!(
        page = request.page,
        offset,
        size,
        strategy = ?request.strategy,
        "Fetching article page"
    );

    match &request.strategy {
        FetchStrategy::Browse { scope, filter } => match (*scope, *filter) {
            (ViewScope::All, FilterMode::All) => {
                let articles = backend.list_all_articles(size, offset).await?;
                let total = backend.count_articles(None).await?;
                Ok(PageData::from_articles(articles, total))
            }
            (ViewScope::All, status) => {
                let full = library_candidates(backend, status, cap).await?;
                Ok(PageData::sliced(
                    full.into_iter().map(PageItem::from).collect(),
                    offset,
                    size,
                ))
            }
            (ViewScope::Feed(feed_id), FilterMode::All) => {
                let articles = backend.list_articles_by_feed(feed_id, size, offset).await?;
                let total = backend.count_articles(Some(feed_id)).await?;
                Ok(PageData::from_articles(articles, total))
            }
            (ViewScope::Feed(feed_id), status) => {
                let full: Vec<PageItem> = backend
                    .list_articles_by_feed(feed_id, cap, 0)
                    .await?
                    .into_iter()
                    .filter(|article| passes(status, article))
                    .map(PageItem::from)
                    .collect();
                Ok(PageData::sliced(full, offset, size))
            }
            (ViewScope::Group(key), filter) => {
                let members = group_members(backend, key).await?;
                if members.is_empty() {
                    tracing::debug!(?key, "Group has no feeds");
                    return Ok(PageData::default());
                }
                let full: Vec<PageItem> = library_candidates(backend, filter, cap)
                    .await?
                    .into_iter()
                    .filter(|article| members.contains(&article.feed_id))
                    .map(PageItem::from)
                    .collect();
                Ok(PageData::sliced(full, offset, size))
            }
        },
        FetchStrategy::Search { query, feed_id } => {
            let full: Vec<PageItem> = backend
                .search_articles(query, cap, 0, *feed_id)
                .await?
                .into_iter()
                .map(|hit| PageItem {
                    article: hit.article,
                    feed_name: Some(hit.feed_name),
                })
                .collect();
            Ok(PageData::sliced(full, offset, size))
        }
    }
}
