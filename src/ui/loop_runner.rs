//! The reader's event loop: keys, finished background work, signals and a
//! periodic tick, all on one task that owns `App`.

use crate::app::{App, AppEvent, SEARCH_DEBOUNCE};
use anyhow::Result;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;
use super::helpers::{spawn_directory_load, spawn_feed_watcher, spawn_page_load};
use super::input::{handle_input, observe_scroll, run_search};
use super::render::render;

/// What the loop does after a key press
pub enum Action {
    Continue,
    /// Leave the loop; the terminal is restored on the way out
    Quit,
}

/// Drive the article view until the user quits or a signal arrives.
///
/// Sources, in priority order:
/// - **Signals**: SIGTERM/SIGINT end the loop
/// - **Keys**: crossterm's async event stream
/// - **Background tasks**: page loads, count refreshes and mutations via `AppEvent`
/// - **Periodic tick**: 250ms timer for status expiry, debounced search and
///   filling the viewport when the first page is short
///
/// Installs a panic hook that restores terminal state before unwinding.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    // The hook must exist before raw mode, or a panic leaves the shell unusable
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut event_stream = crossterm::event::EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    start_background_work(app, &event_tx);
    let watcher = app
        .config
        .feed_poll_interval()
        .map(|period| spawn_feed_watcher(app.db.clone(), period, event_tx.clone()));

    loop {
        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain finished background work before taking more input so page
        // results are not starved by rapid key repeat.
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event, &event_tx);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        app.needs_redraw = true;
                        match handle_input(app, key.code, key.modifiers, &event_tx) {
                            Ok(Action::Quit) => break,
                            Ok(Action::Continue) => {}
                            Err(e) => app.set_status(format!("Error: {}", e)),
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => app.needs_redraw = true,
                    _ => {}
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event, &event_tx);
            }

            _ = tick_interval.tick() => {
                handle_tick(app, &event_tx);
            }
        }
    }

    if let Some(handle) = watcher {
        handle.abort();
    }
    restore_terminal(terminal)?;
    Ok(())
}

/// Load the sidebar and the first page of the default session.
fn start_background_work(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    spawn_directory_load(app, event_tx);
    let request = app.controller.reload();
    spawn_page_load(app, request, event_tx);
}

fn handle_tick(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if app.search_mode {
        if let Some(last_keystroke) = app.search_debounce {
            if last_keystroke.elapsed() >= SEARCH_DEBOUNCE {
                app.search_debounce = None;
                if app.pending_search.take().is_some() {
                    app.needs_redraw = true;
                    run_search(app, event_tx);
                }
            }
        }
    }

    // A short first page never produces a scroll; keep pulling pages until
    // the viewport is full or the session is exhausted.
    if !app.controller.is_loading() && app.controller.cursor().has_more() {
        let before = app.controller.is_loading();
        observe_scroll(app, event_tx);
        if app.controller.is_loading() != before {
            app.needs_redraw = true;
        }
    }
}

/// Raw mode plus the alternate screen.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Undo `setup_terminal`.
fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
