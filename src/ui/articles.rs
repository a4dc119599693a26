use crate::app::{App, Focus};
use feedpane::controller::{FilterMode, Footer, ListEntry, PaneState};
use feedpane::util::{display_width, truncate_to_width};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// Panel title: scope, filter and the active (or in-progress) search.
fn title(app: &App) -> String {
    let session = app.controller.session();
    if app.search_mode {
        return format!("Search: {}_", app.search_input);
    }
    match session.search().query() {
        Some(query) => format!("{} - search \"{}\"", app.scope_label(), query),
        None => format!("{} - {}", app.scope_label(), session.filter().label()),
    }
}

fn entry_line(entry: &ListEntry, selected: bool, width: usize) -> Line<'_> {
    let title_style = if selected {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    } else if !entry.is_read {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let meta_style = Style::default().fg(Color::DarkGray);

    let star = if entry.is_favorite { "★ " } else { "  " };
    let meta = if entry.published_label.is_empty() {
        format!("  {}", entry.feed_name)
    } else {
        format!("  {} · {}", entry.feed_name, entry.published_label)
    };
    // Title gets what is left after the star and as much metadata as fits
    let room = width.saturating_sub(display_width(star) + display_width(&meta).min(width / 2));

    Line::from(vec![
        Span::styled(star, Style::default().fg(Color::Yellow)),
        Span::styled(truncate_to_width(&entry.title, room), title_style),
        Span::styled(truncate_to_width(&meta, width.saturating_sub(room)).into_owned(), meta_style),
    ])
}

/// Render the article list panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let is_focused = app.focus == Focus::Articles;
    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title(app));

    let list = app.controller.list();
    let placeholder = match list.pane() {
        PaneState::Loading => Some(("Loading articles...".to_string(), Color::Gray)),
        PaneState::Empty => Some((empty_message(app), Color::Gray)),
        PaneState::Error { message, .. } => Some((
            format!("Failed to load articles: {}\n\nPress r to retry", message),
            Color::Red,
        )),
        PaneState::Ready => None,
    };
    if let Some((text, color)) = placeholder {
        let paragraph = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let width = area.width.saturating_sub(2) as usize;
    let mut items: Vec<ListItem> = list
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| ListItem::new(entry_line(entry, i == app.article_selected, width)))
        .collect();

    match list.footer() {
        Footer::None => {}
        Footer::LoadingMore => items.push(ListItem::new(Span::styled(
            "Loading more...",
            Style::default().fg(Color::DarkGray),
        ))),
        Footer::Error { message, page } => items.push(ListItem::new(Span::styled(
            format!("Page {} failed: {} (r to retry)", page, message),
            Style::default().fg(Color::Red),
        ))),
    }

    let list_widget = List::new(items)
        .block(block)
        .highlight_style(Style::default());
    let mut state = ListState::default()
        .with_offset(app.article_offset)
        .with_selected(Some(app.article_selected));
    f.render_stateful_widget(list_widget, area, &mut state);
}

fn empty_message(app: &App) -> String {
    let session = app.controller.session();
    if let Some(query) = session.search().query() {
        return format!("No articles match \"{}\"", query);
    }
    match session.filter() {
        FilterMode::All => "No articles".to_string(),
        FilterMode::Unread => "No unread articles".to_string(),
        FilterMode::Favorite => "No favorite articles".to_string(),
    }
}
