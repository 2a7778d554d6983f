//! Directory browsing engine for a file explorer pane: listings (or the
//! drive list at the virtual root), live change tracking, sorting and
//! multi-item selection.

pub mod config;
pub mod controller;
pub mod error;
pub mod fs;
pub mod lister;
pub mod loader;
pub mod path;
pub mod prefs;
pub mod security;
pub mod selection;
pub mod sort;
pub mod startup;
pub mod util;
pub mod watcher;

pub use config::{BrowserConfig, DEBOUNCE_WINDOW, WatcherConfig};
pub use controller::{BrowserController, BrowserEvent, BrowserState};
pub use error::{BrowserError, FsError, WatchError};
pub use fs::{DirectoryEntry, EntryStat, FileSystem, LocalFileSystem, RawEntry};
pub use path::Platform;
pub use sort::{SortDirection, SortField, SortSpec};
