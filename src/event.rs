use std::time::Duration;
use tokio::sync::mpsc;

/// Events driving the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// Periodic tick for query polling
  Tick,
  /// Interrupt received, stop the loop
  Shutdown,
}

/// Event handler that produces ticks until interrupted
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn tick timer
    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    // Spawn interrupt listener
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        let _ = tx.send(Event::Shutdown);
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
