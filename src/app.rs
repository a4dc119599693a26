use feedpane::backend::BackendError;
use feedpane::config::Config;
use feedpane::controller::{
    ArticleViewController, CountSnapshot, GroupKey, ListEntry, LoadRequest, PageData,
    ScrollViewport, TreeItem, ViewScope,
};
use feedpane::controller::tree::{ALL_LABEL, UNGROUPED_LABEL};
use feedpane::storage::{Database, Feed, Group};
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::Instant;

/// How long a status message stays on screen.
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Pause after the last keystroke before a search runs.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

// ============================================================================
// Focus
// ============================================================================

/// Which panel has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Articles,
}

// ============================================================================
// Mutations
// ============================================================================

/// A user change that has been applied to the screen and is waiting on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    MarkRead { article_id: i64, is_read: bool },
    Favorite { article_id: i64, is_favorite: bool },
    Delete { article_id: i64 },
    /// Every article of one feed, or the whole library with `None`
    DeleteAll { feed_id: Option<i64> },
    MarkAllRead { feed_id: Option<i64> },
}

impl Mutation {
    /// Whether the current page-1 is stale once this lands
    pub fn reloads(self) -> bool {
        matches!(self, Mutation::Delete { .. } | Mutation::DeleteAll { .. })
    }

    pub fn describe(self) -> &'static str {
        match self {
            Mutation::MarkRead { is_read: true, .. } => "mark read",
            Mutation::MarkRead { is_read: false, .. } => "mark unread",
            Mutation::Favorite { is_favorite: true, .. } => "add favorite",
            Mutation::Favorite { is_favorite: false, .. } => "remove favorite",
            Mutation::Delete { .. } => "delete article",
            Mutation::DeleteAll { .. } => "delete articles",
            Mutation::MarkAllRead { .. } => "mark all read",
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events from background tasks
pub enum AppEvent {
    /// A page fetch finished. Panicked fetches arrive here as
    /// `BackendError::TaskPanicked` so the load guard is always released.
    PageLoaded {
        request: LoadRequest,
        result: Result<PageData, BackendError>,
    },
    /// Feeds and groups were (re)loaded.
    DirectoryLoaded(Result<(Vec<Feed>, Vec<Group>), String>),
    CountsRefreshed(CountSnapshot),
    MutationApplied {
        mutation: Mutation,
        /// Rows touched by bulk operations, 1 otherwise
        affected: u64,
    },
    MutationFailed {
        mutation: Mutation,
        error: String,
    },
    /// The ingestion process wrote new data for these feeds.
    FeedUpdated { feed_ids: Vec<i64> },
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App {
    pub db: Database,
    pub config: Config,
    pub controller: ArticleViewController,

    // UI State
    pub focus: Focus,
    /// Row in the sidebar tree
    pub sidebar_selected: usize,
    /// Row in the article list
    pub article_selected: usize,
    /// First visible article row
    pub article_offset: usize,
    /// Article rows that fit on screen, updated on render
    pub article_rows: usize,

    // Search
    pub search_mode: bool,
    pub search_input: String,
    /// Debounce timer for search
    pub search_debounce: Option<Instant>,
    pub pending_search: Option<String>,

    /// Status message with expiry
    pub status_message: Option<(Cow<'static, str>, Instant)>,

    /// Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,
}

impl App {
    pub fn new(db: Database, config: Config) -> Self {
        let controller = ArticleViewController::new(config.controller_config());
        Self {
            db,
            config,
            controller,
            focus: Focus::Sidebar,
            sidebar_selected: 0,
            article_selected: 0,
            article_offset: 0,
            article_rows: 0,
            search_mode: false,
            search_input: String::new(),
            search_debounce: None,
            pending_search: None,
            status_message: None,
            needs_redraw: true,
        }
    }

    pub fn tree_items(&self) -> Vec<TreeItem> {
        self.controller.tree_items()
    }

    pub fn selected_tree_item(&self) -> Option<TreeItem> {
        self.tree_items().into_iter().nth(self.sidebar_selected)
    }

    pub fn selected_entry(&self) -> Option<&ListEntry> {
        self.controller.list().get(self.article_selected)
    }

    /// Where the article list is scrolled to
    pub fn article_viewport(&self) -> ScrollViewport {
        ScrollViewport {
            offset: self.article_offset,
            visible: self.article_rows,
            content: self.controller.list().len(),
        }
    }

    /// Clamp selections after the sidebar or list changed size.
    pub fn clamp_selections(&mut self) {
        let tree_len = self.tree_items().len();
        self.sidebar_selected = self.sidebar_selected.min(tree_len.saturating_sub(1));

        let list_len = self.controller.list().len();
        self.article_selected = self.article_selected.min(list_len.saturating_sub(1));
        self.keep_selection_visible();
    }

    /// Start a fresh list: selection and scroll back to the top.
    pub fn reset_article_position(&mut self) {
        self.article_selected = 0;
        self.article_offset = 0;
    }

    fn keep_selection_visible(&mut self) {
        if self.article_selected < self.article_offset {
            self.article_offset = self.article_selected;
        } else if self.article_rows > 0 && self.article_selected >= self.article_offset + self.article_rows
        {
            self.article_offset = self.article_selected + 1 - self.article_rows;
        }
    }

    /// Navigate up in the focused panel
    pub fn nav_up(&mut self) {
        match self.focus {
            Focus::Sidebar => {
                self.sidebar_selected = self.sidebar_selected.saturating_sub(1);
            }
            Focus::Articles => {
                self.article_selected = self.article_selected.saturating_sub(1);
                self.keep_selection_visible();
            }
        }
    }

    /// Navigate down in the focused panel
    pub fn nav_down(&mut self) {
        match self.focus {
            Focus::Sidebar => {
                let max_index = self.tree_items().len().saturating_sub(1);
                self.sidebar_selected = self.sidebar_selected.saturating_add(1).min(max_index);
            }
            Focus::Articles => {
                let max_index = self.controller.list().len().saturating_sub(1);
                self.article_selected = self.article_selected.saturating_add(1).min(max_index);
                self.keep_selection_visible();
            }
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Sidebar => Focus::Articles,
            Focus::Articles => Focus::Sidebar,
        };
    }

    /// Collapse or expand the selected group row. Returns false on other rows.
    pub fn toggle_selected_group(&mut self) -> bool {
        let Some(TreeItem {
            scope: ViewScope::Group(key),
            ..
        }) = self.selected_tree_item()
        else {
            return false;
        };
        self.controller.toggle_group_collapsed(key);
        self.select_scope_row(ViewScope::Group(key));
        true
    }

    /// Move the sidebar cursor onto the row for `scope`, if it is visible.
    pub fn select_scope_row(&mut self, scope: ViewScope) {
        if let Some(index) = self.tree_items().iter().position(|i| i.scope == scope) {
            self.sidebar_selected = index;
        }
    }

    /// Human label for the active scope
    pub fn scope_label(&self) -> Cow<'_, str> {
        match self.controller.session().scope() {
            ViewScope::All => Cow::Borrowed(ALL_LABEL),
            ViewScope::Feed(id) => match self.controller.feed_name(id) {
                Some(name) => Cow::Owned(name.to_string()),
                None => Cow::Borrowed("Feed"),
            },
            ViewScope::Group(GroupKey::Ungrouped) => Cow::Borrowed(UNGROUPED_LABEL),
            ViewScope::Group(GroupKey::Id(id)) => self
                .controller
                .tree()
                .groups()
                .iter()
                .find(|g| g.id == id)
                .map_or(Cow::Borrowed("Group"), |g| Cow::Owned(g.name.to_string())),
        }
    }

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired.
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}
