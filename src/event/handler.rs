//! Terminal event source.
//!
//! A background task merges crossterm's event stream with a tick interval
//! and forwards both over a channel. The handler is itself a [`Stream`], so
//! the app loop can `select!` on it next to other sources.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::warn;

use super::Event;

/// Event handler for terminal input and ticks.
pub struct EventHandler {
    /// Receiver for merged events
    event_rx: mpsc::UnboundedReceiver<Event>,
    /// Task reading the terminal
    task: JoinHandle<()>,
}

impl EventHandler {
    /// Start reading terminal events, ticking every `tick_rate`.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut terminal = EventStream::new();
            let mut interval = time::interval(tick_rate);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = IntervalStream::new(interval);

            loop {
                let event = tokio::select! {
                    Some(_) = ticks.next() => Event::Tick,
                    maybe = terminal.next() => match maybe {
                        Some(Ok(event)) => match convert(event) {
                            Some(event) => event,
                            None => continue,
                        },
                        Some(Err(err)) => {
                            warn!(error = %err, "terminal event error");
                            continue;
                        }
                        None => break,
                    },
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self { event_rx: rx, task }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn convert(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) => Some(Event::Key(key)),
        CrosstermEvent::Mouse(mouse) => Some(Event::Mouse(mouse)),
        CrosstermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
        _ => None,
    }
}

impl Stream for EventHandler {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.event_rx.poll_recv(cx)
    }
}
