use std::collections::HashSet;
use std::sync::Arc;

use super::counts::CountAggregator;
use super::session::{GroupKey, ViewScope};
use crate::storage::{Feed, Group};

pub const ALL_LABEL: &str = "All Articles";
pub const UNGROUPED_LABEL: &str = "Ungrouped";

/// A single row in the flattened sidebar tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    /// Scope selected when this row is activated
    pub scope: ViewScope,
    pub label: Arc<str>,
    /// Nesting depth (0 = top-level)
    pub depth: usize,
    pub unread: i64,
    /// Group rows only: whether member feeds are shown
    pub expanded: Option<bool>,
}

/// Sidebar directory: groups in display order, each followed by its feeds,
/// then the ungrouped bucket when any feed lacks a group.
#[derive(Debug, Default)]
pub struct ScopeTree {
    groups: Vec<Group>,
    feeds: Vec<Feed>,
    collapsed: HashSet<GroupKey>,
}

impl ScopeTree {
    pub fn set_directory(&mut self, feeds: Vec<Feed>, groups: Vec<Group>) {
        let keys: HashSet<GroupKey> = groups
            .iter()
            .map(|g| GroupKey::Id(g.id))
            .chain(std::iter::once(GroupKey::Ungrouped))
            .collect();
        self.collapsed.retain(|key| keys.contains(key));
        self.feeds = feeds;
        self.groups = groups;
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Toggle a group's collapsed state. Returns true if it is now collapsed.
    pub fn toggle_collapsed(&mut self, key: GroupKey) -> bool {
        if !self.collapsed.remove(&key) {
            self.collapsed.insert(key);
            return true;
        }
        false
    }

    pub fn is_collapsed(&self, key: GroupKey) -> bool {
        self.collapsed.contains(&key)
    }

    fn push_group(
        &self,
        items: &mut Vec<TreeItem>,
        key: GroupKey,
        label: Arc<str>,
        counts: &CountAggregator,
    ) {
        let expanded = !self.is_collapsed(key);
        items.push(TreeItem {
            scope: ViewScope::Group(key),
            label,
            depth: 0,
            unread: counts.group(key),
            expanded: Some(expanded),
        });
        if !expanded {
            return;
        }
        let group_id = match key {
            GroupKey::Id(id) => Some(id),
            GroupKey::Ungrouped => None,
        };
        for feed in self.feeds.iter().filter(|f| f.group_id == group_id) {
            items.push(TreeItem {
                scope: ViewScope::Feed(feed.id),
                label: Arc::clone(&feed.name),
                depth: 1,
                unread: counts.feed(feed.id),
                expanded: None,
            });
        }
    }

    /// Rows in display order. "All" is always row 0.
    pub fn items(&self, counts: &CountAggregator) -> Vec<TreeItem> {
        let mut items = vec![TreeItem {
            scope: ViewScope::All,
            label: Arc::from(ALL_LABEL),
            depth: 0,
            unread: counts.global(),
            expanded: None,
        }];

        for group in &self.groups {
            self.push_group(
                &mut items,
                GroupKey::Id(group.id),
                Arc::clone(&group.name),
                counts,
            );
        }
        if self.feeds.iter().any(|f| f.group_id.is_none()) {
            self.push_group(
                &mut items,
                GroupKey::Ungrouped,
                Arc::from(UNGROUPED_LABEL),
                counts,
            );
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::counts::CountSnapshot;
    use std::collections::HashMap;

    fn feed(id: i64, name: &str, group_id: Option<i64>) -> Feed {
        Feed {
            id,
            name: Arc::from(name),
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

    fn directory() -> (Vec<Feed>, Vec<Group>) {
        let groups = vec![Group {
            id: 1,
            name: Arc::from("Tech"),
            order_index: 0,
        }];
        let feeds = vec![
            feed(10, "Rust Blog", Some(1)),
            feed(11, "LWN", Some(1)),
            feed(12, "Cooking", None),
        ];
        (feeds, groups)
    }

    fn counts(feeds: &[Feed]) -> CountAggregator {
        let mut counts = CountAggregator::default();
        counts.set_membership(feeds);
        counts.apply(CountSnapshot {
            global: Some(6),
            feeds: HashMap::from([(10, 2), (11, 1), (12, 3)]),
            failed: Default::default(),
        });
        counts
    }

    #[test]
    fn test_tree_layout_and_badges() {
        let (feeds, groups) = directory();
        let counts = counts(&feeds);
        let mut tree = ScopeTree::default();
        tree.set_directory(feeds, groups);

        let items = tree.items(&counts);
        let scopes: Vec<ViewScope> = items.iter().map(|i| i.scope).collect();
        assert_eq!(
            scopes,
            vec![
                ViewScope::All,
                ViewScope::Group(GroupKey::Id(1)),
                ViewScope::Feed(10),
                ViewScope::Feed(11),
                ViewScope::Group(GroupKey::Ungrouped),
                ViewScope::Feed(12),
            ]
        );
        assert_eq!(items[0].unread, 6);
        assert_eq!(items[1].unread, 3);
        assert_eq!(items[4].unread, 3);
        assert_eq!(&*items[4].label, UNGROUPED_LABEL);
    }

    #[test]
    fn test_collapsed_group_hides_feeds() {
        let (feeds, groups) = directory();
        let counts = counts(&feeds);
        let mut tree = ScopeTree::default();
        tree.set_directory(feeds, groups);

        assert!(tree.toggle_collapsed(GroupKey::Id(1)));
        let items = tree.items(&counts);
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].expanded, Some(false));

        assert!(!tree.toggle_collapsed(GroupKey::Id(1)));
        assert_eq!(tree.items(&counts).len(), 6);
    }

    #[test]
    fn test_no_ungrouped_bucket_when_every_feed_grouped() {
        let (mut feeds, groups) = directory();
        feeds.retain(|f| f.group_id.is_some());
        let mut tree = ScopeTree::default();
        tree.set_directory(feeds, groups);

        let items = tree.items(&CountAggregator::default());
        assert!(items
            .iter()
            .all(|i| i.scope != ViewScope::Group(GroupKey::Ungrouped)));
    }
}
