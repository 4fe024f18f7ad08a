use crate::Frame;

/// Raw toolkit notification about one window, as delivered by a backend.
///
/// Backends report whatever granularity they have; only the end of a drag
/// or resize gesture carries geometry the adapter will act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowNotification {
    MoveStarted,
    /// Intermediate motion during a drag. Ignored.
    Moved(Frame),
    MoveEnded(Frame),
    ResizeStarted,
    /// Intermediate frames during a live resize. Ignored.
    Resized(Frame),
    ResizeEnded(Frame),
    Closed,
}

pub type FrameCallback = Box<dyn FnMut(Frame) + Send>;

/// Normalizes toolkit notifications into frame-end callbacks.
///
/// Only end events fire the callback, so a whole gesture coalesces into one
/// persisted state instead of a write per pixel of motion.
pub struct FrameEventAdapter {
    on_frame_end: FrameCallback,
    closed: bool,
}

impl FrameEventAdapter {
    pub fn new(on_frame_end: FrameCallback) -> Self {
        Self {
            on_frame_end,
            closed: false,
        }
    }

    pub fn notify(&mut self, notification: WindowNotification) {
        if self.closed {
            return;
        }
        match notification {
            WindowNotification::MoveEnded(frame) | WindowNotification::ResizeEnded(frame) => {
                (self.on_frame_end)(frame);
            }
            WindowNotification::Closed => {
                // The window is gone; the subscription goes inert rather
                // than erroring.
                self.closed = true;
            }
            WindowNotification::MoveStarted
            | WindowNotification::Moved(_)
            | WindowNotification::ResizeStarted
            | WindowNotification::Resized(_) => {}
        }
    }
}

/// Handle for an active frame-end subscription.
///
/// The teardown runs exactly once: on an explicit `release()` or, failing
/// that, when the handle is dropped with its tracker.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    pub fn is_released(&self) -> bool {
        self.teardown.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn collecting_adapter() -> (FrameEventAdapter, Arc<Mutex<Vec<Frame>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let adapter = FrameEventAdapter::new(Box::new(move |frame| {
            sink.lock().unwrap().push(frame);
        }));
        (adapter, seen)
    }

    #[test]
    fn only_end_events_fire_the_callback() {
        let (mut adapter, seen) = collecting_adapter();

        adapter.notify(WindowNotification::MoveStarted);
        adapter.notify(WindowNotification::Moved(Frame::new(1, 1, 100, 100)));
        adapter.notify(WindowNotification::Moved(Frame::new(2, 2, 100, 100)));
        adapter.notify(WindowNotification::MoveEnded(Frame::new(3, 3, 100, 100)));
        adapter.notify(WindowNotification::ResizeStarted);
        adapter.notify(WindowNotification::Resized(Frame::new(3, 3, 150, 120)));
        adapter.notify(WindowNotification::ResizeEnded(Frame::new(3, 3, 200, 140)));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![Frame::new(3, 3, 100, 100), Frame::new(3, 3, 200, 140)]
        );
    }

    #[test]
    fn closed_window_stops_delivery() {
        let (mut adapter, seen) = collecting_adapter();

        adapter.notify(WindowNotification::MoveEnded(Frame::new(1, 1, 10, 10)));
        adapter.notify(WindowNotification::Closed);
        adapter.notify(WindowNotification::MoveEnded(Frame::new(9, 9, 90, 90)));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn subscription_tears_down_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let teardown_count = Arc::clone(&count);

        let mut sub = Subscription::new(move || {
            teardown_count.fetch_add(1, Ordering::SeqCst);
        });
        sub.release();
        sub.release();
        drop(sub);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_tears_down_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let teardown_count = Arc::clone(&count);

        drop(Subscription::new(move || {
            teardown_count.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
