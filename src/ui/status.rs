use crate::app::{App, Focus};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.search_mode {
        Cow::Borrowed("Type to search | ESC clear | ENTER confirm")
    } else {
        match app.focus {
            Focus::Sidebar => Cow::Borrowed(
                "[Enter]select [Space]collapse [1/2/3]all/unread/fav [/]search [A]ll read [Tab]switch [q]uit",
            ),
            Focus::Articles => {
                let cursor = app.controller.cursor();
                Cow::Owned(format!(
                    "{}/{} | [m]read [f]av [d]el [o]pen [r]etry [/]search [Tab]switch [q]uit",
                    app.controller.list().len(),
                    cursor.total_articles()
                ))
            }
        }
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}
