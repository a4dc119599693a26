//! Keyboard input handling.

use crate::app::{App, AppEvent, Focus, Mutation};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use feedpane::controller::FilterMode;
use feedpane::util::{validate_url_for_open, MAX_SEARCH_QUERY_LENGTH};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::helpers::{spawn_mutation, spawn_page_load};
use super::loop_runner::Action;

pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Ok(Action::Quit);
    }

    if app.search_mode {
        return Ok(handle_search_input(app, code, event_tx));
    }

    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::Char('j') | KeyCode::Down => {
            app.nav_down();
            if app.focus == Focus::Articles {
                observe_scroll(app, event_tx);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => app.nav_up(),
        KeyCode::Enter => match app.focus {
            Focus::Sidebar => select_sidebar_scope(app, event_tx),
            Focus::Articles => open_article(app, event_tx),
        },
        KeyCode::Char(' ') if app.focus == Focus::Sidebar => {
            app.toggle_selected_group();
        }
        KeyCode::Char('1') => apply_filter(app, FilterMode::All, event_tx),
        KeyCode::Char('2') => apply_filter(app, FilterMode::Unread, event_tx),
        KeyCode::Char('3') => apply_filter(app, FilterMode::Favorite, event_tx),
        KeyCode::Char('/') => {
            app.search_mode = true;
            app.search_input = app
                .controller
                .session()
                .search()
                .query()
                .unwrap_or_default()
                .to_string();
        }
        KeyCode::Esc if app.controller.session().is_searching() => {
            app.search_input.clear();
            let request = app.controller.set_search(None);
            spawn_page_load(app, request, event_tx);
        }
        KeyCode::Char('r') => {
            let request = app.controller.retry();
            if request.is_none() {
                app.set_status("Nothing to retry");
            }
            spawn_page_load(app, request, event_tx);
        }
        KeyCode::Char('o') => open_link(app)?,
        KeyCode::Char('m') => toggle_read(app, event_tx),
        KeyCode::Char('f') => toggle_favorite(app, event_tx),
        KeyCode::Char('d') => delete_selected(app, event_tx),
        KeyCode::Char('D') => bulk(app, event_tx, |feed_id| Mutation::DeleteAll { feed_id }),
        KeyCode::Char('A') => bulk(app, event_tx, |feed_id| Mutation::MarkAllRead { feed_id }),
        _ => {}
    }
    Ok(Action::Continue)
}

/// Let the scroll trigger look at the current viewport.
pub(super) fn observe_scroll(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if app.controller.is_loading() || !app.controller.cursor().has_more() {
        return;
    }
    let viewport = app.article_viewport();
    let request = app.controller.on_scroll(viewport, Instant::now());
    spawn_page_load(app, request, event_tx);
}

fn select_sidebar_scope(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(item) = app.selected_tree_item() else {
        return;
    };
    let request = app.controller.set_scope(item.scope);
    if request.is_some() {
        app.reset_article_position();
        app.focus = Focus::Articles;
    }
    spawn_page_load(app, request, event_tx);
}

fn apply_filter(app: &mut App, filter: FilterMode, event_tx: &mpsc::Sender<AppEvent>) {
    let request = app.controller.set_filter(filter);
    if request.is_none() && app.controller.session().is_searching() {
        app.set_status(format!("{} filter applies once search is cleared", filter.label()));
    }
    spawn_page_load(app, request, event_tx);
}

fn open_article(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(entry) = app.selected_entry() else {
        return;
    };
    let (article_id, is_read) = (entry.article_id, entry.is_read);
    if app.config.mark_read_on_open && !is_read {
        app.controller.set_read(article_id, true);
        spawn_mutation(
            app,
            Mutation::MarkRead {
                article_id,
                is_read: true,
            },
            event_tx,
        );
    }
}

fn open_link(app: &mut App) -> Result<()> {
    let Some(entry) = app.selected_entry() else {
        return Ok(());
    };
    let link = entry.link.to_string();
    match validate_url_for_open(&link) {
        Ok(url) => {
            open::that(url.as_str())?;
            app.set_status("Opened in browser");
        }
        Err(e) => app.set_status(format!("Cannot open link: {}", e)),
    }
    Ok(())
}

fn toggle_read(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(entry) = app.selected_entry() else {
        return;
    };
    let (article_id, is_read) = (entry.article_id, !entry.is_read);
    app.controller.set_read(article_id, is_read);
    spawn_mutation(
        app,
        Mutation::MarkRead {
            article_id,
            is_read,
        },
        event_tx,
    );
}

fn toggle_favorite(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(entry) = app.selected_entry() else {
        return;
    };
    let (article_id, is_favorite) = (entry.article_id, !entry.is_favorite);
    app.controller.set_favorite(article_id, is_favorite);
    spawn_mutation(
        app,
        Mutation::Favorite {
            article_id,
            is_favorite,
        },
        event_tx,
    );
}

fn delete_selected(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(entry) = app.selected_entry() else {
        return;
    };
    let article_id = entry.article_id;
    app.controller.remove(article_id);
    app.clamp_selections();
    spawn_mutation(app, Mutation::Delete { article_id }, event_tx);
}

/// Bulk action over the active feed, or the whole library from "All".
fn bulk(
    app: &mut App,
    event_tx: &mpsc::Sender<AppEvent>,
    mutation: impl FnOnce(Option<i64>) -> Mutation,
) {
    let Some(feed_id) = app.controller.bulk_target() else {
        app.set_status("Select a single feed or All Articles first");
        return;
    };
    let mutation = mutation(feed_id);
    match mutation {
        Mutation::MarkAllRead { feed_id } => {
            app.controller.mark_all_read_local(feed_id);
        }
        Mutation::DeleteAll { .. } => {
            app.set_status("Deleting...");
        }
        Mutation::MarkRead { .. } | Mutation::Favorite { .. } | Mutation::Delete { .. } => {}
    }
    spawn_mutation(app, mutation, event_tx);
}

fn handle_search_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    match code {
        KeyCode::Esc => {
            app.search_mode = false;
            app.search_debounce = None;
            app.pending_search = None;
            app.search_input.clear();
            let request = app.controller.set_search(None);
            spawn_page_load(app, request, event_tx);
        }
        KeyCode::Enter => {
            // An explicit submit wins over the pending debounce
            app.search_debounce = None;
            app.pending_search = None;
            app.search_mode = false;
            run_search(app, event_tx);
        }
        KeyCode::Backspace => {
            app.search_input.pop();
            app.search_debounce = Some(Instant::now());
            app.pending_search = Some(app.search_input.clone());
        }
        KeyCode::Char(c) => {
            if app.search_input.len() >= MAX_SEARCH_QUERY_LENGTH {
                app.set_status(format!(
                    "Search query at max length ({} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
                return Action::Continue;
            }
            app.search_input.push(c);
            app.search_debounce = Some(Instant::now());
            app.pending_search = Some(app.search_input.clone());
        }
        _ => {}
    }
    Action::Continue
}

/// Apply the typed query; blank input clears the search.
pub(super) fn run_search(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let query = app.search_input.clone();
    let request = app.controller.set_search(Some(&query));
    if request.is_some() {
        app.reset_article_position();
    }
    spawn_page_load(app, request, event_tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedpane::config::Config;
    use feedpane::controller::SearchState;
    use feedpane::storage::Database;

    async fn test_app() -> (App, mpsc::Sender<AppEvent>, mpsc::Receiver<AppEvent>) {
        let db = Database::open(":memory:").await.unwrap();
        let (tx, rx) = mpsc::channel(32);
        (App::new(db, Config::default()), tx, rx)
    }

    fn press(app: &mut App, code: KeyCode, tx: &mpsc::Sender<AppEvent>) -> Action {
        handle_input(app, code, KeyModifiers::NONE, tx).unwrap()
    }

    #[tokio::test]
    async fn test_quit() {
        let (mut app, tx, _rx) = test_app().await;
        assert!(matches!(press(&mut app, KeyCode::Char('q'), &tx), Action::Quit));
    }

    #[tokio::test]
    async fn test_search_typing_is_debounced() {
        let (mut app, tx, _rx) = test_app().await;
        press(&mut app, KeyCode::Char('/'), &tx);
        assert!(app.search_mode);

        press(&mut app, KeyCode::Char('r'), &tx);
        press(&mut app, KeyCode::Char('s'), &tx);
        assert_eq!(app.pending_search.as_deref(), Some("rs"));
        assert!(!app.controller.session().is_searching());

        press(&mut app, KeyCode::Enter, &tx);
        assert!(!app.search_mode);
        assert_eq!(
            app.controller.session().search(),
            &SearchState::Active("rs".to_string())
        );
    }

    #[tokio::test]
    async fn test_escape_clears_active_search() {
        let (mut app, tx, _rx) = test_app().await;
        app.search_input = "rust".to_string();
        run_search(&mut app, &tx);
        assert!(app.controller.session().is_searching());

        press(&mut app, KeyCode::Esc, &tx);
        assert!(!app.controller.session().is_searching());
    }

    #[tokio::test]
    async fn test_filter_keys_switch_filter() {
        let (mut app, tx, _rx) = test_app().await;
        press(&mut app, KeyCode::Char('2'), &tx);
        assert_eq!(app.controller.session().filter(), FilterMode::Unread);
        press(&mut app, KeyCode::Char('3'), &tx);
        assert_eq!(app.controller.session().filter(), FilterMode::Favorite);
    }

    #[tokio::test]
    async fn test_bulk_refused_in_group_scope() {
        let (mut app, tx, _rx) = test_app().await;
        app.controller
            .set_scope(feedpane::controller::ViewScope::Group(
                feedpane::controller::GroupKey::Ungrouped,
            ));
        press(&mut app, KeyCode::Char('A'), &tx);
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_ref()),
            Some("Select a single feed or All Articles first")
        );
    }
}
