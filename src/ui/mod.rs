pub mod header;
pub mod process_table;
pub mod statusbar;
pub mod terminal;
pub mod theme;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};

use crate::app::App;

pub use terminal::TerminalSink;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    header::render(frame, chunks[0], app);
    process_table::render(frame, chunks[1], app);
    statusbar::render(frame, chunks[2], app);
}
