use std::path::PathBuf;
use std::time::Duration;

use crate::path::Platform;
use crate::prefs;

/// Quiet period after the last filesystem event before a reload fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Interval used by notify's polling backends.
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub platform: Platform,
    pub watch_enabled: bool,
    /// Upper bound on concurrent per-entry metadata fetches.
    pub metadata_workers: usize,
    pub extra_blocked: Vec<String>,
    pub watcher: WatcherConfig,
    /// `None` disables preference persistence.
    pub prefs_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            platform: Platform::host(),
            watch_enabled: true,
            metadata_workers: 8,
            extra_blocked: Vec::new(),
            watcher: WatcherConfig::default(),
            prefs_path: prefs::default_path(),
        }
    }
}

impl BrowserConfig {
    /// Defaults without touching the user's preference file.
    pub fn ephemeral() -> Self {
        Self {
            prefs_path: None,
            ..Self::default()
        }
    }
}
