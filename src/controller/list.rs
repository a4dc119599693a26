//! The rendered article list: entries, dedup set and pane/footer state.

use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;

use super::query::{LoadRequest, PageItem};
use crate::util::{single_line, strip_control_chars};

/// Shown when an article's feed is not in the name cache
pub const UNKNOWN_FEED: &str = "Unknown source";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Page 1 of a session: clears the list and the dedup set first
    Replace,
    /// Infinite-scroll continuation
    Append,
}

/// What the article pane shows as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneState {
    /// Page 1 in flight
    Loading,
    /// Page 1 succeeded with zero articles
    Empty,
    /// Page 1 failed; `retry` re-issues the identical request
    Error { message: String, retry: LoadRequest },
    Ready,
}

/// Trailing affordance below the entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Footer {
    None,
    LoadingMore,
    /// A continuation failed; retry targets `page`
    Error { message: String, page: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub article_id: i64,
    pub feed_id: i64,
    pub title: Arc<str>,
    pub published: i64,
    pub published_label: String,
    pub feed_name: Arc<str>,
    pub link: Arc<str>,
    pub thumbnail: Option<Arc<str>>,
    pub is_favorite: bool,
    pub is_read: bool,
}

/// Titles land verbatim on the terminal: one line, no escape sequences.
fn display_title(title: &Arc<str>) -> Arc<str> {
    let stripped = strip_control_chars(title);
    let clean = single_line(&stripped);
    if *clean == **title {
        Arc::clone(title)
    } else {
        Arc::from(clean.as_ref())
    }
}

/// Format a unix timestamp in local time; out-of-range values and bad
/// format strings render empty
pub fn format_timestamp(timestamp: i64, format: &str) -> String {
    let Some(dt) = DateTime::from_timestamp(timestamp, 0) else {
        return String::new();
    };
    let mut label = String::new();
    if write!(label, "{}", dt.with_timezone(&Local).format(format)).is_err() {
        tracing::debug!(format, "Invalid date format");
        label.clear();
    }
    label
}

#[derive(Debug)]
pub struct ArticleList {
    entries: Vec<ListEntry>,
    seen: HashSet<i64>,
    pane: PaneState,
    footer: Footer,
    date_format: String,
}

impl ArticleList {
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            pane: PaneState::Loading,
            footer: Footer::None,
            date_format: date_format.into(),
        }
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn pane(&self) -> &PaneState {
        &self.pane
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ListEntry> {
        self.entries.get(index)
    }

    /// Clear everything and show the page-1 spinner
    pub fn reset(&mut self) {
        self.entries.clear();
        self.seen.clear();
        self.pane = PaneState::Loading;
        self.footer = Footer::None;
    }

    /// Merge a fetched page. Returns how many entries were inserted.
    ///
    /// Append skips ids that are already on screen; overlapping pages happen
    /// when the underlying data shifts between fetches.
    pub fn render(
        &mut self,
        items: Vec<PageItem>,
        mode: RenderMode,
        has_more: bool,
        feed_names: &HashMap<i64, Arc<str>>,
    ) -> usize {
        if mode == RenderMode::Replace {
            self.entries.clear();
            self.seen.clear();
        }

        let before = self.entries.len();
        for item in items {
            if !self.seen.insert(item.article.id) {
                tracing::debug!(article_id = item.article.id, "Skipping duplicate article");
                continue;
            }
            let entry = self.build_entry(item, feed_names);
            self.entries.push(entry);
        }
        let inserted = self.entries.len() - before;

        self.pane = if self.entries.is_empty() && mode == RenderMode::Replace {
            PaneState::Empty
        } else {
            PaneState::Ready
        };
        self.footer = if has_more && mode == RenderMode::Append {
            Footer::LoadingMore
        } else {
            Footer::None
        };
        inserted
    }

    fn build_entry(&self, item: PageItem, feed_names: &HashMap<i64, Arc<str>>) -> ListEntry {
        let PageItem { article, feed_name } = item;
        let feed_name = feed_name
            .or_else(|| feed_names.get(&article.feed_id).map(Arc::clone))
            .unwrap_or_else(|| Arc::from(UNKNOWN_FEED));
        ListEntry {
            article_id: article.id,
            feed_id: article.feed_id,
            title: display_title(article.display_title()),
            published: article.published,
            published_label: format_timestamp(article.published, &self.date_format),
            feed_name,
            link: article.link,
            thumbnail: article.thumbnail,
            is_favorite: article.is_favorite,
            is_read: article.is_read,
        }
    }

    /// Page 1 failed
    pub fn show_error(&mut self, message: String, retry: LoadRequest) {
        self.entries.clear();
        self.seen.clear();
        self.pane = PaneState::Error { message, retry };
        self.footer = Footer::None;
    }

    /// A continuation failed; the loaded entries stay
    pub fn show_footer_error(&mut self, message: String, page: usize) {
        self.footer = Footer::Error { message, page };
    }

    /// Continuation retry in flight
    pub fn show_loading_more(&mut self) {
        self.footer = Footer::LoadingMore;
    }

    pub fn show_loading(&mut self) {
        self.pane = PaneState::Loading;
    }

    // ========================================================================
    // Optimistic Updates
    // ========================================================================

    fn entry_mut(&mut self, article_id: i64) -> Option<&mut ListEntry> {
        self.entries.iter_mut().find(|e| e.article_id == article_id)
    }

    /// Returns the previous value, or `None` if the article is not listed
    pub fn set_read(&mut self, article_id: i64, is_read: bool) -> Option<bool> {
        let entry = self.entry_mut(article_id)?;
        Some(std::mem::replace(&mut entry.is_read, is_read))
    }

    /// Returns the previous value, or `None` if the article is not listed
    pub fn set_favorite(&mut self, article_id: i64, is_favorite: bool) -> Option<bool> {
        let entry = self.entry_mut(article_id)?;
        Some(std::mem::replace(&mut entry.is_favorite, is_favorite))
    }

    /// Mark every listed entry read, limited to one feed with `Some`
    pub fn mark_all_read(&mut self, feed_id: Option<i64>) -> usize {
        let mut changed = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| feed_id.map_or(true, |id| e.feed_id == id))
        {
            if !entry.is_read {
                entry.is_read = true;
                changed += 1;
            }
        }
        changed
    }

    pub fn remove(&mut self, article_id: i64) -> Option<ListEntry> {
        let index = self.entries.iter().position(|e| e.article_id == article_id)?;
        self.seen.remove(&article_id);
        Some(self.entries.remove(index))
    }

    /// Ids in display order
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|e| e.article_id)
    }
}
