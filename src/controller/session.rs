//! The (scope, filter, search) selection as an immutable value.

use std::fmt;

/// A group in the sidebar: a real group row, or the bucket of feeds without one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Id(i64),
    Ungrouped,
}

/// Which articles are under consideration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewScope {
    #[default]
    All,
    Feed(i64),
    Group(GroupKey),
}

impl ViewScope {
    /// The single feed this scope narrows to, if any. Search honours this.
    pub fn feed_id(self) -> Option<i64> {
        match self {
            ViewScope::Feed(id) => Some(id),
            ViewScope::All | ViewScope::Group(_) => None,
        }
    }
}

/// Read/favorite predicate applied within a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    All,
    Unread,
    Favorite,
}

impl FilterMode {
    pub fn label(self) -> &'static str {
        match self {
            FilterMode::All => "All",
            FilterMode::Unread => "Unread",
            FilterMode::Favorite => "Favorites",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SearchState {
    #[default]
    Inactive,
    /// Always holds a trimmed, non-empty query
    Active(String),
}

impl SearchState {
    /// Build from raw user input: trims, and treats blank input as inactive.
    pub fn from_input(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            Some(query) if !query.is_empty() => SearchState::Active(query.to_string()),
            _ => SearchState::Inactive,
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            SearchState::Active(query) => Some(query),
            SearchState::Inactive => None,
        }
    }
}

/// How a page of the current session is fetched.
///
/// Search results are not filtered by read/favorite state: while a search is
/// active the filter is kept in the session but plays no part in fetching.
/// Only a single-feed scope narrows a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    Browse { scope: ViewScope, filter: FilterMode },
    Search { query: String, feed_id: Option<i64> },
}

/// One consistent selection. Mutators return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSession {
    scope: ViewScope,
    filter: FilterMode,
    search: SearchState,
}

impl ViewSession {
    pub fn new(scope: ViewScope, filter: FilterMode, search: SearchState) -> Self {
        Self {
            scope,
            filter,
            search,
        }
    }

    pub fn scope(&self) -> ViewScope {
        self.scope
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.search, SearchState::Active(_))
    }

    #[must_use]
    pub fn with_scope(&self, scope: ViewScope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_filter(&self, filter: FilterMode) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_search(&self, search: SearchState) -> Self {
        Self {
            search,
            ..self.clone()
        }
    }

    /// The effective selection. Two sessions with the same strategy show the
    /// same articles.
    pub fn strategy(&self) -> FetchStrategy {
        match &self.search {
            SearchState::Active(query) => FetchStrategy::Search {
                query: query.clone(),
                feed_id: self.scope.feed_id(),
            },
            SearchState::Inactive => FetchStrategy::Browse {
                scope: self.scope,
                filter: self.filter,
            },
        }
    }
}

impl fmt::Display for ViewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.search {
            SearchState::Active(query) => write!(f, "search {:?} in {:?}", query, self.scope),
            SearchState::Inactive => write!(f, "{:?} / {}", self.scope, self.filter.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_input_trimmed_and_blank_is_inactive() {
        assert_eq!(
            SearchState::from_input(Some("  rust  ")),
            SearchState::Active("rust".to_string())
        );
        assert_eq!(SearchState::from_input(Some("   ")), SearchState::Inactive);
        assert_eq!(SearchState::from_input(None), SearchState::Inactive);
    }

    #[test]
    fn test_search_bypasses_filter_but_keeps_feed_scope() {
        let session = ViewSession::default()
            .with_scope(ViewScope::Feed(7))
            .with_filter(FilterMode::Unread)
            .with_search(SearchState::from_input(Some("rust")));

        assert_eq!(
            session.strategy(),
            FetchStrategy::Search {
                query: "rust".to_string(),
                feed_id: Some(7)
            }
        );
        assert_eq!(session.filter(), FilterMode::Unread);
    }

    #[test]
    fn test_group_scope_does_not_narrow_search() {
        let session = ViewSession::default()
            .with_scope(ViewScope::Group(GroupKey::Ungrouped))
            .with_search(SearchState::from_input(Some("rust")));

        assert_eq!(
            session.strategy(),
            FetchStrategy::Search {
                query: "rust".to_string(),
                feed_id: None
            }
        );
    }

    #[test]
    fn test_filter_change_while_searching_keeps_strategy() {
        let searching = ViewSession::default().with_search(SearchState::from_input(Some("x")));
        let filtered = searching.with_filter(FilterMode::Favorite);

        assert_ne!(searching, filtered);
        assert_eq!(searching.strategy(), filtered.strategy());
    }

    #[test]
    fn test_with_methods_leave_original_untouched() {
        let base = ViewSession::default();
        let _ = base.with_scope(ViewScope::Feed(1));
        assert_eq!(base.scope(), ViewScope::All);
        assert_eq!(base.filter(), FilterMode::All);
        assert!(!base.is_searching());
    }
}
