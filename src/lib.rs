pub mod backend;
pub mod cache;
pub mod diagnose;
pub mod events;
pub mod hold;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod tracker;

pub use backend::{EventPump, WindowHandle};
pub use cache::{CacheKey, GeometryRecord, GeometryStore};
pub use events::Subscription;
pub use hold::{hold_windows, HoldOptions, HoldPrompt, HoldTrigger};
pub use tracker::{track_position_size, TrackOptions, WindowTracker};

pub type Result<T> = anyhow::Result<T>;

/// A window's on-screen position and size, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Log a warning once per process for a given key.
///
/// Best-effort backend integration fails inside loops (every frame-end
/// event, every restore attempt); this keeps the signal without spamming.
pub(crate) fn warn_once(key: &str, message: &str) {
    use once_cell::sync::Lazy;
    use std::collections::HashSet;
    use std::sync::Mutex;

    static WARNED: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

    let mut warned = WARNED.lock().unwrap();
    if warned.insert(key.to_string()) {
        log::warn!("{}", message);
    }
}
