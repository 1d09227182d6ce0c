//! Notification adapter — turns bursts of native layout events into single `notify()` calls.
//!
//! Layout observers fire many times per edit (every keystroke, every reflow pass). The
//! adapter trailing-debounces them over a short quiet window and drops resize events that
//! report the size it already forwarded, so the controller's own settle timer is not
//! restarted for nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::layout::controller::{sleep_until_opt, FitController};

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(50);

/// A raw event from the embedding application's layout observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeSignal {
    /// The observed content box now has this size.
    Resized { width: f32, height: f32 },
    /// Something changed that may affect size; no dimensions available.
    ContentChanged,
}

/// Receiver of debounced change notifications.
pub trait ChangeSink: Send + Sync + 'static {
    fn notify(&self);
}

impl ChangeSink for FitController {
    fn notify(&self) {
        FitController::notify(self);
    }
}

/// Handle to the adapter task. The task stops when the handle is dropped.
#[derive(Clone)]
pub struct NotificationAdapter {
    signals: mpsc::UnboundedSender<ChangeSignal>,
}

impl NotificationAdapter {
    pub fn spawn<S: ChangeSink>(sink: S, quiet_window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(sink, quiet_window, rx));
        Self { signals: tx }
    }

    pub fn signal(&self, signal: ChangeSignal) {
        if self.signals.send(signal).is_err() {
            debug!("notification adapter stopped; signal dropped");
        }
    }

    pub fn resized(&self, width: f32, height: f32) {
        self.signal(ChangeSignal::Resized { width, height });
    }

    pub fn content_changed(&self) {
        self.signal(ChangeSignal::ContentChanged);
    }
}

async fn run<S: ChangeSink>(
    sink: S,
    quiet_window: Duration,
    mut signals: mpsc::UnboundedReceiver<ChangeSignal>,
) {
    let mut last_forwarded: Option<(f32, f32)> = None;
    let mut latest_size: Option<(f32, f32)> = None;
    let mut content_dirty = false;
    let mut flush_at: Option<Instant> = None;

    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    Some(ChangeSignal::Resized { width, height }) => {
                        latest_size = Some((width, height));
                    }
                    Some(ChangeSignal::ContentChanged) => content_dirty = true,
                    None => break,
                }
                flush_at = Some(Instant::now() + quiet_window);
            }
            _ = sleep_until_opt(flush_at) => {
                flush_at = None;
                let resized = latest_size.is_some() && latest_size != last_forwarded;
                if content_dirty || resized {
                    sink.notify();
                }
                if latest_size.is_some() {
                    last_forwarded = latest_size;
                }
                content_dirty = false;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[derive(Clone, Default)]
    struct CountingSink(Arc<AtomicUsize>);

    impl CountingSink {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl ChangeSink for CountingSink {
        fn notify(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_forwards_once() {
        let sink = CountingSink::default();
        let adapter = NotificationAdapter::spawn(sink.clone(), DEFAULT_QUIET_WINDOW);

        for i in 0..10 {
            adapter.resized(600.0, 900.0 + i as f32);
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.count(), 0, "still inside the burst");

        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_size_is_not_forwarded() {
        let sink = CountingSink::default();
        let adapter = NotificationAdapter::spawn(sink.clone(), DEFAULT_QUIET_WINDOW);

        adapter.resized(600.0, 900.0);
        sleep(Duration::from_millis(100)).await;
        adapter.resized(600.0, 900.0);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), 1);

        adapter.resized(600.0, 940.0);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_change_always_forwarded() {
        let sink = CountingSink::default();
        let adapter = NotificationAdapter::spawn(sink.clone(), DEFAULT_QUIET_WINDOW);

        adapter.content_changed();
        sleep(Duration::from_millis(100)).await;
        adapter.content_changed();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_task() {
        let sink = CountingSink::default();
        let adapter = NotificationAdapter::spawn(sink.clone(), DEFAULT_QUIET_WINDOW);
        adapter.content_changed();
        drop(adapter);

        sleep(Duration::from_millis(100)).await;
        // The pending burst is abandoned with the task.
        assert_eq!(sink.count(), 0);
        assert_eq!(Arc::strong_count(&sink.0), 1);
    }
}
