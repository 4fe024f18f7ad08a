use crate::events::{FrameCallback, Subscription};
use crate::{Frame, Result};
use std::time::Duration;

/// One native window as exposed by a GUI toolkit integration.
///
/// The core never creates or destroys these; it only reads the frame,
/// applies setters, and subscribes to frame-end notifications.
pub trait WindowHandle: Send + Sync {
    /// Current frame, or `None` once the native window is gone.
    fn frame(&self) -> Option<Frame>;

    fn apply_frame(&self, frame: Frame) -> Result<()>;

    fn set_floating(&self, floating: bool) -> Result<()>;

    /// Best-effort raise/focus. May do nothing on some backends.
    fn raise(&self);

    fn is_open(&self) -> bool;

    /// Capability probe: subscribe to frame-end events, or `None` when this
    /// backend cannot deliver them. Callers that get `None` must not assume
    /// tracking is active.
    fn subscribe_frame_end(&self, callback: FrameCallback) -> Option<Subscription>;
}

/// The toolkit's event loop, driven cooperatively from the owning thread.
pub trait EventPump {
    /// Process pending GUI events, waiting at most `slice`.
    fn pump(&mut self, slice: Duration);

    /// Number of toolkit windows still open.
    fn open_window_count(&self) -> usize;
}
