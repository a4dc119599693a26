use crate::app::{App, Focus};
use feedpane::util::truncate_to_width;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the scope tree: All, groups with their feeds, Ungrouped.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let is_focused = app.focus == Focus::Sidebar;
    let active = app.controller.session().scope();
    let items = app.tree_items();
    let inner_width = area.width.saturating_sub(2) as usize;

    let list_items: Vec<ListItem> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let indent = "  ".repeat(item.depth);
            let icon = match item.expanded {
                Some(true) => "v ",
                Some(false) => "> ",
                None => "",
            };

            let style = if i == app.sidebar_selected && is_focused {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if item.unread > 0 {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let marker = if item.scope == active { "• " } else { "  " };

            let badge = if item.unread > 0 {
                format!(" ({})", item.unread)
            } else {
                String::new()
            };
            let prefix = format!("{}{}{}", marker, indent, icon);
            let room = inner_width.saturating_sub(prefix.chars().count() + badge.len());

            let mut spans = Vec::with_capacity(3);
            spans.push(Span::styled(prefix, style));
            spans.push(Span::styled(truncate_to_width(&item.label, room), style));
            if !badge.is_empty() {
                spans.push(Span::styled(badge, style.fg(Color::Cyan)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let list = List::new(list_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title("Feeds"),
        )
        .highlight_style(Style::default());

    let mut state = ListState::default().with_selected(Some(app.sidebar_selected));
    f.render_stateful_widget(list, area, &mut state);
}
