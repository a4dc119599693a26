//! Article view controller.
//!
//! Decides which page of articles to fetch for the current (scope, filter,
//! search) session, merges responses into the rendered list and keeps the
//! sidebar badges current. The controller itself never awaits: selection
//! changes hand back a [`LoadRequest`] that the caller fetches (usually on a
//! background task) and feeds to [`ArticleViewController::apply_page`].

pub mod counts;
pub mod cursor;
pub mod guard;
pub mod list;
pub mod query;
pub mod scroll;
pub mod session;
pub mod tree;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::backend::{Backend, BackendError};
use crate::storage::{Feed, Group};

pub use counts::{collect_counts, CountAggregator, CountSnapshot};
pub use cursor::PageCursor;
pub use guard::LoadGuard;
pub use list::{ArticleList, Footer, ListEntry, PaneState, RenderMode};
pub use query::{fetch_page, LoadRequest, PageData, PageItem};
pub use scroll::{InfiniteScrollTrigger, ScrollViewport};
pub use session::{FetchStrategy, FilterMode, GroupKey, SearchState, ViewScope, ViewSession};
pub use tree::{ScopeTree, TreeItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub page_size: usize,
    /// Row ceiling for client-side filtered and search fetches
    pub fetch_cap: usize,
    pub scroll_threshold_rows: usize,
    pub scroll_interval: Duration,
    /// chrono format string for list timestamps
    pub date_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            fetch_cap: 1000,
            scroll_threshold_rows: 5,
            scroll_interval: Duration::from_millis(200),
            date_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

/// What happened to a page response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { inserted: usize },
    Failed,
    /// Belonged to an abandoned session and was dropped
    Stale,
}

#[derive(Debug)]
pub struct ArticleViewController {
    config: ControllerConfig,
    session: ViewSession,
    cursor: PageCursor,
    guard: LoadGuard,
    list: ArticleList,
    counts: CountAggregator,
    tree: ScopeTree,
    scroll: InfiniteScrollTrigger,
    feed_names: HashMap<i64, Arc<str>>,
}

impl ArticleViewController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            session: ViewSession::default(),
            cursor: PageCursor::new(config.page_size),
            guard: LoadGuard::default(),
            list: ArticleList::new(config.date_format.clone()),
            counts: CountAggregator::default(),
            tree: ScopeTree::default(),
            scroll: InfiniteScrollTrigger::new(
                config.scroll_threshold_rows,
                config.scroll_interval,
            ),
            feed_names: HashMap::new(),
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn session(&self) -> &ViewSession {
        &self.session
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn list(&self) -> &ArticleList {
        &self.list
    }

    pub fn counts(&self) -> &CountAggregator {
        &self.counts
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn is_loading(&self) -> bool {
        self.guard.is_loading()
    }

    pub fn feed_name(&self, feed_id: i64) -> Option<&Arc<str>> {
        self.feed_names.get(&feed_id)
    }

    /// Sidebar rows with current badges
    pub fn tree_items(&self) -> Vec<TreeItem> {
        self.tree.items(&self.counts)
    }

    pub fn toggle_group_collapsed(&mut self, key: GroupKey) -> bool {
        self.tree.toggle_collapsed(key)
    }

    /// Target of a bulk action: `Some(None)` for the whole library,
    /// `Some(Some(id))` for one feed. Group scopes have no bulk target.
    pub fn bulk_target(&self) -> Option<Option<i64>> {
        match self.session.scope() {
            ViewScope::All => Some(None),
            ViewScope::Feed(id) => Some(Some(id)),
            ViewScope::Group(_) => None,
        }
    }

    // ========================================================================
    // Directory
    // ========================================================================

    /// Replace the feed and group lists. Rebuilds the name cache, badge
    /// membership and sidebar tree; the article list is left alone.
    pub fn set_directory(&mut self, feeds: Vec<Feed>, groups: Vec<Group>) {
        self.feed_names = feeds
            .iter()
            .map(|f| (f.id, Arc::clone(&f.name)))
            .collect();
        self.counts.set_membership(&feeds);
        tracing::debug!(feeds = feeds.len(), groups = groups.len(), "Directory updated");
        self.tree.set_directory(feeds, groups);
    }

    pub fn apply_counts(&mut self, snapshot: CountSnapshot) {
        self.counts.apply(snapshot);
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn set_scope(&mut self, scope: ViewScope) -> Option<LoadRequest> {
        let next = self.session.with_scope(scope);
        self.switch_session(next)
    }

    pub fn set_filter(&mut self, filter: FilterMode) -> Option<LoadRequest> {
        let next = self.session.with_filter(filter);
        self.switch_session(next)
    }

    /// `None` or blank input clears the search
    pub fn set_search(&mut self, query: Option<&str>) -> Option<LoadRequest> {
        let next = self.session.with_search(SearchState::from_input(query));
        self.switch_session(next)
    }

    /// Store the new selection and restart at page 1 if it shows different
    /// articles than the current one.
    fn switch_session(&mut self, next: ViewSession) -> Option<LoadRequest> {
        let changed = next.strategy() != self.session.strategy();
        self.session = next;
        if !changed {
            tracing::debug!(session = %self.session, "Selection unchanged, no reload");
            return None;
        }
        tracing::debug!(session = %self.session, "Selection changed");
        self.reload()
    }

    /// Start the current session over from page 1.
    pub fn reload(&mut self) -> Option<LoadRequest> {
        self.list.reset();
        self.cursor.reset();
        self.guard.reset();
        self.scroll.reset();
        self.begin(1, RenderMode::Replace)
    }

    fn begin(&mut self, page: usize, mode: RenderMode) -> Option<LoadRequest> {
        if !self.cursor.has_more() {
            tracing::debug!(page, "No more articles, load dropped");
            return None;
        }
        let Some(token) = self.guard.begin() else {
            tracing::debug!(page, "Load already in flight, request dropped");
            return None;
        };
        Some(LoadRequest {
            token,
            page,
            page_size: self.cursor.page_size(),
            fetch_cap: self.config.fetch_cap,
            mode,
            strategy: self.session.strategy(),
        })
    }

    /// Continuation load for infinite scroll.
    ///
    /// Refused until page 1 has been applied, and while a continuation error
    /// is on screen: failed pages are only fetched again through [`retry`].
    ///
    /// [`retry`]: ArticleViewController::retry
    pub fn request_next_page(&mut self) -> Option<LoadRequest> {
        if self.cursor.current_page() == 0 || matches!(self.list.footer(), Footer::Error { .. }) {
            return None;
        }
        let request = self.begin(self.cursor.next_page(), RenderMode::Append)?;
        self.list.show_loading_more();
        Some(request)
    }

    /// Feed a scroll position through the trigger
    pub fn on_scroll(&mut self, viewport: ScrollViewport, now: Instant) -> Option<LoadRequest> {
        if !self.scroll.observe(viewport, now) {
            return None;
        }
        self.request_next_page()
    }

    /// Re-issue the failed request: page 1 from the error pane, or the
    /// continuation page named by the footer.
    pub fn retry(&mut self) -> Option<LoadRequest> {
        match self.list.pane() {
            PaneState::Error { retry, .. } => {
                let request = retry.clone();
                if !self.guard.is_current(request.token) {
                    return self.reload();
                }
                self.guard.begin()?;
                self.list.show_loading();
                return Some(request);
            }
            PaneState::Loading | PaneState::Empty | PaneState::Ready => {}
        }
        if let Footer::Error { page, .. } = self.list.footer() {
            let page = *page;
            let request = self.begin(page, RenderMode::Append)?;
            self.list.show_loading_more();
            return Some(request);
        }
        None
    }

    // ========================================================================
    // Responses
    // ========================================================================

    /// Apply a fetched page (or its failure) to the list and cursor.
    pub fn apply_page(
        &mut self,
        request: &LoadRequest,
        result: Result<PageData, BackendError>,
    ) -> LoadOutcome {
        if !self.guard.is_current(request.token) {
            tracing::debug!(
                token = request.token,
                current = self.guard.token(),
                page = request.page,
                "Discarding stale page"
            );
            return LoadOutcome::Stale;
        }
        self.guard.finish();

        match result {
            Ok(page) => {
                let returned = page.items.len();
                let has_more = self.cursor.record_page(request.page, returned, page.total);
                let inserted = self
                    .list
                    .render(page.items, request.mode, has_more, &self.feed_names);
                tracing::debug!(
                    page = request.page,
                    returned,
                    inserted,
                    total = page.total,
                    has_more,
                    "Page applied"
                );
                LoadOutcome::Applied { inserted }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(page = request.page, error = %message, "Page load failed");
                match request.mode {
                    RenderMode::Replace => self.list.show_error(message, request.clone()),
                    RenderMode::Append => self.list.show_footer_error(message, request.page),
                }
                LoadOutcome::Failed
            }
        }
    }

    /// Fetch `request` from `backend` and apply it.
    pub async fn load<B>(&mut self, backend: &B, request: LoadRequest) -> LoadOutcome
    where
        B: Backend + ?Sized,
    {
        let result = fetch_page(backend, &request).await;
        self.apply_page(&request, result)
    }

    // ========================================================================
    // Optimistic Updates
    // ========================================================================

    /// Returns the previous read state for reverting, `None` if not listed
    pub fn set_read(&mut self, article_id: i64, is_read: bool) -> Option<bool> {
        self.list.set_read(article_id, is_read)
    }

    pub fn set_favorite(&mut self, article_id: i64, is_favorite: bool) -> Option<bool> {
        self.list.set_favorite(article_id, is_favorite)
    }

    pub fn remove(&mut self, article_id: i64) -> Option<ListEntry> {
        self.list.remove(article_id)
    }

    pub fn mark_all_read_local(&mut self, feed_id: Option<i64>) -> usize {
        self.list.mark_all_read(feed_id)
    }
}
