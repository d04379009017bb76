use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};

use crate::app::App;
use crate::format::{format_clock, format_duration_ns, truncate_unicode};
use crate::ui::theme::Theme;

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    render_window(frame, chunks[0], app);
    render_cpus(frame, chunks[1], app);
}

fn bordered(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
}

fn render_window(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let block = bordered(theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let secondary = Style::default().fg(theme.text_dim);
    let (start, end) = app.window;
    let mut first = vec![
        Span::styled(
            " tracetop ",
            Style::default()
                .fg(theme.title_fg)
                .bg(theme.title_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
    ];
    match app.frame_index {
        Some(index) => first.extend([
            Span::styled(
                format!("{} \u{2192} {}", format_clock(start), format_clock(end)),
                Style::default().fg(theme.text),
            ),
            Span::styled(
                format!("  ({})  #{index}", format_duration_ns(end.saturating_sub(start))),
                secondary,
            ),
        ]),
        None => first.push(Span::styled("waiting for trace\u{2026}", secondary)),
    }

    let mut second = vec![Span::styled(
        format!(" Procs: {}/{}", app.displayed, app.total),
        secondary,
    )];
    if let Some(key) = &app.sort_by {
        second.push(Span::styled(format!("  Sort: {key}"), secondary));
    }
    for (name, hits) in &app.probe_hits {
        second.push(Span::styled(format!("  {name}: {hits}"), secondary));
    }

    frame.render_widget(
        Paragraph::new(vec![Line::from(first), Line::from(second)]),
        inner,
    );
}

fn render_cpus(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let block = bordered(theme).title(Span::styled(
        " CPUs ",
        Style::default()
            .fg(theme.text_dim)
            .add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = Vec::with_capacity(app.cpus.len() * 2);
    for cpu in &app.cpus {
        let task = match &cpu.task {
            Some((tid, comm)) => format!("{} ({tid})", truncate_unicode(comm, 12)),
            None => "idle".to_string(),
        };
        spans.push(Span::styled(
            format!(" {}:", cpu.id),
            Style::default().fg(theme.column_fg),
        ));
        spans.push(Span::styled(
            format!("{task} "),
            Style::default().fg(theme.text),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).wrap(Wrap { trim: false }),
        inner,
    );
}
