use color_eyre::Result;
use color_eyre::eyre::eyre;
use ratatui::DefaultTerminal;

use crate::app::App;
use crate::pipeline::DisplaySink;
use crate::system::snapshot::Snapshot;

/// Full-screen display. The terminal is only taken over once the first
/// snapshot exists, and is handed back on shutdown.
pub struct TerminalSink {
    app: App,
    terminal: Option<DefaultTerminal>,
}

impl TerminalSink {
    pub fn new(app: App) -> Self {
        TerminalSink {
            app,
            terminal: None,
        }
    }
}

impl DisplaySink for TerminalSink {
    fn init(&mut self) -> Result<()> {
        let mut terminal = ratatui::try_init()?;
        terminal.draw(|frame| super::draw(frame, &self.app))?;
        self.terminal = Some(terminal);
        Ok(())
    }

    fn render(&mut self, index: u64, snapshot: &Snapshot) -> Result<()> {
        self.app.update(index, snapshot);
        let terminal = self
            .terminal
            .as_mut()
            .ok_or_else(|| eyre!("render called before init"))?;
        let app = &self.app;
        terminal.draw(|frame| super::draw(frame, app))?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.terminal.take().is_some() {
            ratatui::try_restore()?;
        }
        Ok(())
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        if self.terminal.take().is_some() {
            let _ = ratatui::try_restore();
        }
    }
}
