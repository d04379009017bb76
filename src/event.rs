use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
pub enum Event {
    Key(KeyEvent),
}

/// Forwards terminal input from crossterm's async stream. The stream ends
/// when the terminal goes away or the receiver is dropped.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    _task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let task = tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(Ok(evt)) = reader.next().await {
                let mapped = match evt {
                    CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => {
                        Some(Event::Key(key))
                    }
                    _ => None,
                };
                if let Some(e) = mapped
                    && tx.send(e).is_err()
                {
                    break;
                }
            }
        });

        Self { rx, _task: task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
