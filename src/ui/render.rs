//! Render functions for the TUI.

use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::Paragraph,
    Frame,
};

use super::{articles, sidebar, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render entry point. Also records how many article rows fit so the
/// scroll trigger sees the real viewport.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    render_main_panels(f, app, chunks[0]);
    status::render(f, app, chunks[1]);
}

/// Sidebar (30%) | article list (70%)
fn render_main_panels(f: &mut Frame, app: &mut App, area: Rect) {
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    sidebar::render(f, app, main_chunks[0]);

    // Borders take two rows, the footer one more
    let rows = main_chunks[1].height.saturating_sub(3) as usize;
    if rows != app.article_rows {
        app.article_rows = rows;
        app.clamp_selections();
    }
    articles::render(f, app, main_chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedpane::config::Config;
    use feedpane::storage::Database;
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn test_too_small_terminal() {
        let db = Database::open(":memory:").await.unwrap();
        let mut app = App::new(db, Config::default());
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        assert!(buffer_text(&terminal).contains("Terminal too small"));
    }

    #[tokio::test]
    async fn test_render_records_article_rows() {
        let db = Database::open(":memory:").await.unwrap();
        let mut app = App::new(db, Config::default());
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        // 30 rows - status bar - borders - footer
        assert_eq!(app.article_rows, 26);
        assert!(buffer_text(&terminal).contains("All Articles"));
    }
}
