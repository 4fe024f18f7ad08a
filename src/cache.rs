use crate::{Frame, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const CACHE_FILE_NAME: &str = "window_geometry.json";
pub const CACHE_DIR_ENV: &str = "WINTRACK_CACHE_DIR";
pub const MACHINE_ID_ENV: &str = "WINTRACK_MACHINE_ID";

/// Last known on-screen frame and always-on-top state of one window.
///
/// Immutable value: updates replace the whole record, never a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryRecord {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub floating: bool,
}

impl GeometryRecord {
    pub fn new(frame: Frame, floating: bool) -> Self {
        Self {
            x: frame.x,
            y: frame.y,
            width: frame.width,
            height: frame.height,
            floating,
        }
    }

    pub fn frame(&self) -> Frame {
        Frame::new(self.x, self.y, self.width, self.height)
    }
}

/// Identifies one cached geometry entry.
///
/// `machine_id` keeps caches apart when the file is synced across machines
/// with different displays; `tag` is a caller-supplied stable string.
/// Deliberately not derived from the window title, which can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub machine_id: String,
    pub tag: String,
}

impl CacheKey {
    pub fn new(machine_id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            tag: tag.into(),
        }
    }

    /// Flattened form used as the JSON top-level key.
    pub fn composite(&self) -> String {
        format!("{}::{}", self.machine_id, self.tag)
    }
}

/// The persisted cache: composite key -> record. At most one record per
/// (machine id, tag); last writer wins; no history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheDocument {
    entries: BTreeMap<String, GeometryRecord>,
}

impl CacheDocument {
    pub fn get(&self, key: &CacheKey) -> Option<GeometryRecord> {
        self.entries.get(&key.composite()).copied()
    }

    pub fn put(&mut self, key: &CacheKey, record: GeometryRecord) {
        self.entries.insert(key.composite(), record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write geometry cache {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode geometry cache")]
    Encode(#[from] serde_json::Error),
}

/// Load a cache document, failing soft: a missing or malformed file yields
/// an empty document. The file itself is left untouched until the next
/// successful save.
pub fn load_document(path: &Path) -> CacheDocument {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::debug!("No readable geometry cache at {:?}: {}", path, e);
            return CacheDocument::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!(
                "Malformed geometry cache at {:?} ({}); starting with an empty cache",
                path,
                e
            );
            CacheDocument::default()
        }
    }
}

/// Write the document next to its destination, then rename into place, so a
/// crash mid-write cannot corrupt the existing file. The cache directory is
/// created on first write.
pub fn save_document(doc: &CacheDocument, path: &Path) -> std::result::Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CacheError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(|source| CacheError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Default cache file location: `./.wintrack/window_geometry.json`, with the
/// directory overridable through `WINTRACK_CACHE_DIR`.
pub fn default_cache_path() -> PathBuf {
    let dir = match std::env::var_os(CACHE_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(".wintrack"),
    };
    dir.join(CACHE_FILE_NAME)
}

/// Identity of the host this cache entry applies to.
///
/// `WINTRACK_MACHINE_ID` wins, then the host name, then a fixed fallback.
pub fn machine_id() -> String {
    if let Ok(id) = std::env::var(MACHINE_ID_ENV) {
        if !id.is_empty() {
            return id;
        }
    }
    sysinfo::System::host_name().unwrap_or_else(|| "unknown-host".to_string())
}

/// Owns the cache document and its backing file. One store is shared by all
/// trackers in a process; tests construct an in-memory store instead of
/// touching the filesystem.
#[derive(Debug)]
pub struct GeometryStore {
    path: Option<PathBuf>,
    doc: Mutex<CacheDocument>,
}

impl GeometryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let doc = load_document(&path);
        Self {
            path: Some(path),
            doc: Mutex::new(doc),
        }
    }

    pub fn open_default() -> Self {
        Self::open(default_cache_path())
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: Mutex::new(CacheDocument::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &CacheKey) -> Option<GeometryRecord> {
        self.doc.lock().unwrap().get(key)
    }

    /// Write one record through to disk. Returns `Ok(false)` when the entry
    /// is already up to date, in which case the file is not rewritten (some
    /// toolkits fire end-events without an actual frame delta).
    ///
    /// The document is re-read from disk before merging, so two stores
    /// sharing one file never erase each other's unrelated tags.
    pub fn record(&self, key: &CacheKey, record: GeometryRecord) -> Result<bool> {
        let mut doc = self.doc.lock().unwrap();

        match &self.path {
            Some(path) => {
                let mut latest = load_document(path);
                if latest.get(key) == Some(record) {
                    *doc = latest;
                    return Ok(false);
                }
                latest.put(key, record);
                save_document(&latest, path)?;
                log::debug!("Saved geometry for {}: {:?}", key.composite(), record);
                *doc = latest;
                Ok(true)
            }
            None => {
                if doc.get(key) == Some(record) {
                    return Ok(false);
                }
                doc.put(key, record);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn record(x: i32, y: i32, w: u32, h: u32) -> GeometryRecord {
        GeometryRecord::new(Frame::new(x, y, w, h), false)
    }

    #[test]
    fn round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        let key = CacheKey::new("m1", "win1");

        let mut doc = CacheDocument::default();
        doc.put(&key, record(10, 20, 300, 200));
        save_document(&doc, &path).unwrap();

        let loaded = load_document(&path);
        assert_eq!(loaded.get(&key), Some(record(10, 20, 300, 200)));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = load_document(&dir.path().join("nope.json"));
        assert!(doc.is_empty());
    }

    #[test]
    fn malformed_file_loads_empty_and_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let doc = load_document(&path);
        assert!(doc.is_empty());
        // Load never touches the file; only a later save replaces it.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn save_creates_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join(CACHE_FILE_NAME);

        let mut doc = CacheDocument::default();
        doc.put(&CacheKey::new("m1", "a"), record(0, 0, 100, 100));
        save_document(&doc, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn tags_are_isolated() {
        let store = GeometryStore::in_memory();
        let key_a = CacheKey::new("m1", "A");
        let key_b = CacheKey::new("m1", "B");

        store.record(&key_a, record(1, 2, 30, 40)).unwrap();
        store.record(&key_b, record(5, 6, 70, 80)).unwrap();
        store.record(&key_a, record(9, 9, 99, 99)).unwrap();

        assert_eq!(store.get(&key_a), Some(record(9, 9, 99, 99)));
        assert_eq!(store.get(&key_b), Some(record(5, 6, 70, 80)));
    }

    #[test]
    fn machine_ids_are_isolated() {
        let store = GeometryStore::in_memory();
        store
            .record(&CacheKey::new("m1", "win"), record(1, 1, 10, 10))
            .unwrap();
        store
            .record(&CacheKey::new("m2", "win"), record(2, 2, 20, 20))
            .unwrap();

        assert_eq!(
            store.get(&CacheKey::new("m1", "win")),
            Some(record(1, 1, 10, 10))
        );
    }

    #[test]
    fn unchanged_record_does_not_rewrite_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        let store = GeometryStore::open(&path);
        let key = CacheKey::new("m1", "stable");

        assert!(store.record(&key, record(10, 10, 200, 100)).unwrap());
        let first = std::fs::metadata(&path).unwrap().modified().unwrap();
        let bytes = std::fs::read(&path).unwrap();

        // Spurious end-event with no frame delta: no second write.
        assert!(!store.record(&key, record(10, 10, 200, 100)).unwrap());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), first);
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn two_stores_sharing_a_file_merge_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);

        let store_a = GeometryStore::open(&path);
        let store_b = GeometryStore::open(&path);

        store_a
            .record(&CacheKey::new("m1", "a"), record(1, 1, 10, 10))
            .unwrap();
        store_b
            .record(&CacheKey::new("m1", "b"), record(2, 2, 20, 20))
            .unwrap();

        let merged = load_document(&path);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn missing_key_is_absent() {
        let store = GeometryStore::in_memory();
        assert_matches!(store.get(&CacheKey::new("m1", "never-tracked")), None);
    }

    #[test]
    fn composite_key_format() {
        let key = CacheKey::new("host-a", "figure 1");
        assert_eq!(key.composite(), "host-a::figure 1");
    }

    #[test]
    fn machine_id_env_override_wins() {
        // Serialize access to the env var within the test binary.
        static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::set_var(MACHINE_ID_ENV, "test-machine");
        assert_eq!(machine_id(), "test-machine");
        std::env::remove_var(MACHINE_ID_ENV);
    }
}
