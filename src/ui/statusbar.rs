use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::App;
use crate::ui::theme::Theme;

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let bg_style = Style::default().bg(theme.bar_bg);

    let mut spans = Vec::new();
    for (key, desc) in app.keybinds.hints() {
        spans.extend(pill_spans(key, desc, theme));
    }
    if app.rows.len() < app.displayed {
        spans.push(Span::styled(
            format!("  {} of {} rows", app.rows.len(), app.displayed),
            Style::default().fg(theme.text_dim),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).style(bg_style), area);
}

fn pill_spans<'a>(key: String, desc: &'a str, theme: &Theme) -> Vec<Span<'a>> {
    vec![
        Span::raw(" "),
        Span::styled(
            format!(" {key} "),
            Style::default()
                .fg(theme.key_fg)
                .bg(theme.key_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {desc}"),
            Style::default().fg(theme.key_label_fg).bg(theme.key_label_bg),
        ),
    ]
}
