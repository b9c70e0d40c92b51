//! Event bus for notifying hosts about layout and manager state changes.
//!
//! Events are fire-and-forget: a send with no subscribers is not an error, and
//! a subscriber that falls more than `event_capacity` events behind sees
//! `RecvError::Lagged` and should re-read whatever state it displays.

use crate::error::LayoutError;
use crate::model::{Layout, LayoutId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum LayoutEvent {
    /// A layout was created or changed. `None` means "several may have
    /// changed, re-list" and is what a finished sync emits.
    Change { updated_layout: Option<Layout> },

    /// A layout disappeared from readers (erased or tombstoned).
    Delete { layout_id: LayoutId },

    /// The manager went from idle to busy or back.
    BusyChange { busy: bool },

    OnlineChange { online: bool },

    /// The sticky sync error was set or cleared.
    ErrorChange { error: Option<Arc<LayoutError>> },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LayoutEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: LayoutEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LayoutEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Reference-counted busy flag. Only the 0 -> 1 and 1 -> 0 transitions are
/// announced, so nested operations do not flicker the indicator.
///
/// Transitions are emitted while the count is locked, so subscribers see them
/// in the order the count changed.
#[derive(Debug)]
pub struct BusyTracker {
    count: Mutex<usize>,
    events: EventBus,
}

impl BusyTracker {
    pub fn new(events: EventBus) -> Self {
        Self {
            count: Mutex::new(0),
            events,
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.count.lock() > 0
    }

    /// Mark the start of an operation. Busy until the guard drops.
    pub fn enter(self: &Arc<Self>) -> BusyGuard {
        let mut count = self.count.lock();
        *count += 1;
        if *count == 1 {
            self.events.emit(LayoutEvent::BusyChange { busy: true });
        }
        drop(count);
        BusyGuard {
            tracker: Arc::clone(self),
        }
    }

    fn leave(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.events.emit(LayoutEvent::BusyChange { busy: false });
        }
    }
}

/// Decrements the busy count on drop, including on `?` and panic unwinds.
#[must_use = "the operation is only tracked while the guard is alive"]
#[derive(Debug)]
pub struct BusyGuard {
    tracker: Arc<BusyTracker>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tracker.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<LayoutEvent>) -> Vec<bool> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LayoutEvent::BusyChange { busy } = event {
                seen.push(busy);
            }
        }
        seen
    }

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let bus = EventBus::new(4);
        bus.emit(LayoutEvent::OnlineChange { online: false });
    }

    #[test]
    fn test_busy_transitions_only_at_edges() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let tracker = Arc::new(BusyTracker::new(bus));

        let outer = tracker.enter();
        let inner = tracker.enter();
        assert!(tracker.is_busy());
        drop(inner);
        assert!(tracker.is_busy());
        drop(outer);
        assert!(!tracker.is_busy());

        assert_eq!(drain(&mut rx), vec![true, false]);
    }

    #[test]
    fn test_busy_events_alternate_under_contention() {
        let bus = EventBus::new(4096);
        let mut rx = bus.subscribe();
        let tracker = Arc::new(BusyTracker::new(bus));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        drop(tracker.enter());
                    }
                });
            }
        });

        let seen = drain(&mut rx);
        assert!(!tracker.is_busy());
        assert_eq!(seen.first(), Some(&true));
        assert_eq!(seen.last(), Some(&false));
        for pair in seen.windows(2) {
            assert_ne!(pair[0], pair[1], "busy events out of order: {seen:?}");
        }
    }

    #[test]
    fn test_guard_released_on_error_path() {
        let tracker = Arc::new(BusyTracker::new(EventBus::default()));

        let failing = || -> Result<(), LayoutError> {
            let _busy = tracker.enter();
            Err(LayoutError::Cancelled)
        };
        assert!(failing().is_err());
        assert!(!tracker.is_busy());
    }
}
