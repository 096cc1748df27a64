//! Timer that feeds `Tick` events into the event loop.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::app::Event;

/// Braille spinner frames.
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// One-shot tick scheduler. The reducer re-arms it after every tick, so it
/// stops on its own once the session is terminal; [`Ticker::stop`] also
/// suppresses a tick that is already armed.
pub struct Ticker {
    interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { interval, shutdown }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms a single `Tick` delivered after the interval.
    pub fn schedule(&self, tx: mpsc::Sender<Event>) {
        if self.is_stopped() {
            return;
        }
        let mut shutdown = self.shutdown.subscribe();

        let interval = self.interval;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !*shutdown.borrow() {
                        let _ = tx.send(Event::Tick).await;
                    }
                }
                _ = shutdown.changed() => {}
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
