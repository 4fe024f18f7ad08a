use crate::backend::WindowHandle;
use crate::cache::{machine_id, CacheKey, GeometryRecord, GeometryStore};
use crate::events::Subscription;
use crate::{warn_once, Frame, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct TrackOptions {
    /// Apply the cached record to the window on bind, if one exists.
    pub restore: bool,
    /// Override the machine identity; defaults to the host name.
    pub machine_id: Option<String>,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            restore: true,
            machine_id: None,
        }
    }
}

/// State shared with the frame-end callback. The toolkit may invoke the
/// observer from its own dispatch, so this sits behind a mutex.
struct TrackerShared {
    store: Arc<GeometryStore>,
    key: CacheKey,
    last_saved: Option<GeometryRecord>,
    floating: bool,
}

impl TrackerShared {
    /// Write one record through to the store unless it matches the last
    /// saved state. Redundant events are common (some toolkits fire
    /// end-events without a frame delta) and must not churn the disk.
    fn write_through(&mut self, frame: Frame) -> Result<bool> {
        let record = GeometryRecord::new(frame, self.floating);
        if self.last_saved == Some(record) {
            return Ok(false);
        }
        let written = self.store.record(&self.key, record)?;
        self.last_saved = Some(record);
        Ok(written)
    }
}

/// Binds one native window to one cache entry.
///
/// Bound on creation; frame-end events write the new geometry through to
/// the store until `disconnect()` or the tracker is dropped. A window
/// closed by the user simply stops producing events; the tracker goes
/// inert without error.
pub struct WindowTracker {
    window: Arc<dyn WindowHandle>,
    store: Arc<GeometryStore>,
    tag: String,
    shared: Arc<Mutex<TrackerShared>>,
    subscription: Option<Subscription>,
}

impl WindowTracker {
    /// Bind `window` to the cache entry for `tag`.
    ///
    /// Returns `None` when the backend does not expose frame-end events;
    /// tracking is then a no-op and the caller keeps the window untracked
    /// rather than half-tracked.
    pub fn track(
        store: Arc<GeometryStore>,
        window: Arc<dyn WindowHandle>,
        tag: &str,
        options: TrackOptions,
    ) -> Option<Self> {
        let machine = options.machine_id.unwrap_or_else(machine_id);
        let key = CacheKey::new(machine, tag);
        let cached = store.get(&key);

        // Seeded false; a successful restore below raises it to the cached
        // state. The record must describe the window as it actually is, not
        // as the cache wishes it were.
        let shared = Arc::new(Mutex::new(TrackerShared {
            store: Arc::clone(&store),
            key: key.clone(),
            last_saved: cached,
            floating: false,
        }));

        let callback_shared = Arc::clone(&shared);
        let composite = key.composite();
        let subscription =
            window.subscribe_frame_end(Box::new(move |frame| {
                let mut shared = callback_shared.lock().unwrap();
                match shared.write_through(frame) {
                    Ok(true) => {}
                    Ok(false) => log::debug!("Frame-end event without delta for {}", composite),
                    Err(e) => {
                        // No synchronous caller to report to; keep the
                        // signal without spamming per gesture.
                        warn_once(
                            &format!("event-save:{}", composite),
                            &format!("Failed to save geometry for {}: {}", composite, e),
                        );
                    }
                }
            }));

        let subscription = match subscription {
            Some(subscription) => subscription,
            None => {
                log::info!(
                    "Backend does not expose frame-end events; not tracking {:?}",
                    tag
                );
                return None;
            }
        };

        let tracker = Self {
            window,
            store,
            tag: tag.to_string(),
            shared,
            subscription: Some(subscription),
        };

        if options.restore {
            let floating = tracker.restore_cached(cached);
            tracker.shared.lock().unwrap().floating = floating;
        }

        Some(tracker)
    }

    /// One-shot, best-effort restore. A frame that no longer fits the
    /// current display may be rejected by the toolkit; the window then
    /// stays at its default position.
    ///
    /// Returns the floating state actually applied to the window, which
    /// seeds the next saved record.
    fn restore_cached(&self, cached: Option<GeometryRecord>) -> bool {
        let record = match cached {
            Some(record) => record,
            None => {
                log::debug!("No cached geometry for {:?}", self.tag);
                return false;
            }
        };

        if let Err(e) = self.window.apply_frame(record.frame()) {
            warn_once(
                &format!("restore:{}", self.tag),
                &format!("Could not restore geometry for {:?}: {}", self.tag, e),
            );
            return false;
        }
        if record.floating {
            if let Err(e) = self.window.set_floating(true) {
                warn_once(
                    &format!("restore-floating:{}", self.tag),
                    &format!("Could not restore floating state for {:?}: {}", self.tag, e),
                );
                return false;
            }
        }
        log::debug!("Restored geometry for {:?}: {:?}", self.tag, record);
        record.floating
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn machine_id(&self) -> String {
        self.shared.lock().unwrap().key.machine_id.clone()
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.store.path()
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    /// Move and resize the window, then persist the resulting frame.
    /// Disk failures are returned to the caller, unlike event-driven saves.
    pub fn set_frame(&self, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        let requested = Frame::new(x, y, width, height);
        if !self.window.is_open() {
            log::debug!("set_frame on closed window {:?}; ignoring", self.tag);
            return Ok(());
        }
        self.window.apply_frame(requested)?;
        // Persist what the toolkit actually settled on, not the request.
        let actual = self.window.frame().unwrap_or(requested);
        self.shared.lock().unwrap().write_through(actual)?;
        Ok(())
    }

    pub fn set_position(&self, x: i32, y: i32) -> Result<()> {
        match self.window.frame() {
            Some(current) => self.set_frame(x, y, current.width, current.height),
            None => Ok(()),
        }
    }

    pub fn set_size(&self, width: u32, height: u32) -> Result<()> {
        match self.window.frame() {
            Some(current) => self.set_frame(current.x, current.y, width, height),
            None => Ok(()),
        }
    }

    /// Toggle always-on-top, then persist it with the current frame.
    pub fn set_floating(&self, floating: bool) -> Result<()> {
        if !self.window.is_open() {
            return Ok(());
        }
        self.window.set_floating(floating)?;
        let mut shared = self.shared.lock().unwrap();
        shared.floating = floating;
        if let Some(frame) = self.window.frame() {
            shared.write_through(frame)?;
        }
        Ok(())
    }

    pub fn raise_window(&self) {
        self.window.raise();
    }

    /// Unsubscribe from frame-end events. Terminal for this tracker; a new
    /// `track` call creates an independent one.
    pub fn disconnect(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.release();
            log::debug!("Disconnected tracker for {:?}", self.tag);
        }
    }
}

impl Drop for WindowTracker {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Convenience entry point matching the common single-store case: track
/// `window` under `tag` against the default cache file.
pub fn track_position_size(window: Arc<dyn WindowHandle>, tag: &str) -> Option<WindowTracker> {
    let store = Arc::new(GeometryStore::open_default());
    WindowTracker::track(store, window, tag, TrackOptions::default())
}
