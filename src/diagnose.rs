use crate::cache::{default_cache_path, machine_id, CACHE_DIR_ENV};
use chrono::{DateTime, Utc};
use crossterm::tty::IsTty;
use serde::Serialize;
use std::path::PathBuf;

/// Environment report for troubleshooting geometry tracking.
///
/// Printed as JSON by `wintrack-diagnose`; meant for bug reports, not for
/// programmatic consumption.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub generated_at: DateTime<Utc>,
    pub platform: &'static str,
    pub cwd: Option<PathBuf>,
    pub stdin_is_tty: bool,
    pub machine_id: String,
    pub cache_path: PathBuf,
    pub cache_file_exists: bool,
    pub cache_dir_env_set: bool,
    pub display_env: Option<String>,
    pub wayland_display_env: Option<String>,
}

impl Diagnostics {
    pub fn collect() -> Self {
        let cache_path = default_cache_path();
        Self {
            generated_at: Utc::now(),
            platform: std::env::consts::OS,
            cwd: std::env::current_dir().ok(),
            stdin_is_tty: std::io::stdin().is_tty(),
            machine_id: machine_id(),
            cache_file_exists: cache_path.exists(),
            cache_path,
            cache_dir_env_set: std::env::var_os(CACHE_DIR_ENV).is_some(),
            display_env: std::env::var("DISPLAY").ok(),
            wayland_display_env: std::env::var("WAYLAND_DISPLAY").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_to_json() {
        let report = Diagnostics::collect();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("platform").is_some());
        assert!(json.get("machine_id").is_some());
        assert!(json.get("cache_path").is_some());
    }
}
