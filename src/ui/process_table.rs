use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Row, Table};

use crate::app::{App, ProcessRow};
use crate::format::{format_bytes, truncate_unicode};

const COMM_WIDTH: u16 = 16;
const HOST_WIDTH: u16 = 12;

/// Display name for a `perf_*` counter column.
fn counter_title(name: &str) -> String {
    name.strip_prefix("perf_").unwrap_or(name).to_uppercase()
}

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;

    let mut titles = vec![
        "TID".to_string(),
        "PID".to_string(),
        "PPID".to_string(),
        "COMM".to_string(),
        "HOST".to_string(),
        "%CPU".to_string(),
    ];
    titles.extend(app.counter_names.iter().map(|n| counter_title(n)));
    titles.extend(["READ", "WRITE", "FILES"].map(String::from));

    let mut widths = vec![
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(COMM_WIDTH),
        Constraint::Length(HOST_WIDTH),
        Constraint::Length(6),
    ];
    widths.extend(
        app.counter_names
            .iter()
            .map(|n| Constraint::Length(counter_title(n).len().max(10) as u16)),
    );
    widths.extend([
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(5),
    ]);

    let header = Row::new(titles).style(
        Style::default()
            .fg(theme.column_fg)
            .add_modifier(Modifier::BOLD),
    );

    let rows = app.rows.iter().map(|row| table_row(row, app));

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.border)),
        );
    frame.render_widget(table, area);
}

fn table_row<'a>(row: &ProcessRow, app: &App) -> Row<'a> {
    let theme = &app.theme;
    let name_fg = if row.is_thread {
        theme.thread_fg
    } else {
        theme.text
    };
    let mut cells = vec![
        Cell::from(row.tid.to_string()),
        Cell::from(row.pid.to_string()),
        Cell::from(row.ppid.to_string()),
        Cell::from(truncate_unicode(&row.comm, COMM_WIDTH as usize))
            .style(Style::default().fg(name_fg)),
        Cell::from(truncate_unicode(
            row.hostname.as_deref().unwrap_or("-"),
            HOST_WIDTH as usize,
        )),
        Cell::from(format!("{:5.1}", row.cpu_percent))
            .style(Style::default().fg(theme.load_color(row.cpu_percent))),
    ];
    cells.extend(row.counters.iter().map(|v| Cell::from(v.to_string())));
    cells.extend([
        Cell::from(format_bytes(row.read_bytes)),
        Cell::from(format_bytes(row.write_bytes)),
        Cell::from(row.open_files.to_string()),
    ]);
    Row::new(cells).style(Style::default().fg(theme.text_dim))
}
