use std::fs;
use std::time::SystemTime;

use log::debug;
use sysinfo::Disks;

use crate::config::WatcherConfig;
use crate::error::{FsError, WatchError};
use crate::path::{self, Platform};
use crate::watcher::{self, WatchHandle};

/// One row of a directory listing, or a volume at the virtual root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub is_drive: bool,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

impl DirectoryEntry {
    pub fn new(
        name: String,
        path: String,
        is_directory: bool,
        size: Option<u64>,
        modified: Option<SystemTime>,
    ) -> Self {
        Self {
            name,
            path,
            is_directory,
            is_drive: false,
            size,
            modified,
        }
    }

    pub fn drive(label: &str, platform: Platform) -> Self {
        let path = path::normalize_drive_root(label);
        Self {
            name: path::file_name(&path, platform).to_string(),
            path,
            is_directory: true,
            is_drive: true,
            size: None,
            modified: None,
        }
    }
}

/// A child as reported by [`FileSystem::list_directory`], before metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub is_directory: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStat {
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

/// Host capabilities the browser consumes.
pub trait FileSystem: Send + Sync {
    /// Immediate children of `path`.
    fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>, FsError>;
    /// Size and modification time of one entry.
    fn stat_entry(&self, path: &str) -> Result<EntryStat, FsError>;
    /// Labels of the logical drives / volumes shown at the virtual root.
    fn list_logical_drives(&self) -> Vec<String>;
    /// Non-recursive change subscription; dropping the handle unsubscribes.
    fn watch(&self, path: &str, config: &WatcherConfig) -> Result<WatchHandle, WatchError>;
    fn home_directory(&self) -> Option<String>;
}

/// [`FileSystem`] backed by `std::fs` and `notify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>, FsError> {
        let reader = fs::read_dir(path).map_err(|err| FsError::from_io(path, err))?;
        let mut out = Vec::new();
        for entry in reader {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("skipping unreadable entry in {path}: {err}");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            // follow symlinks so a link to a directory browses like one
            let is_directory = fs::metadata(entry.path())
                .map(|meta| meta.is_dir())
                .or_else(|_| entry.file_type().map(|ft| ft.is_dir()))
                .unwrap_or(false);
            out.push(RawEntry { name, is_directory });
        }
        Ok(out)
    }

    fn stat_entry(&self, path: &str) -> Result<EntryStat, FsError> {
        let meta = fs::metadata(path).map_err(|err| FsError::from_io(path, err))?;
        Ok(EntryStat {
            size: meta.is_file().then(|| meta.len()),
            modified: meta.modified().ok(),
        })
    }

    fn list_logical_drives(&self) -> Vec<String> {
        let disks = Disks::new_with_refreshed_list();
        let mut mounts: Vec<String> = disks
            .list()
            .iter()
            .map(|disk| disk.mount_point().to_string_lossy().into_owned())
            .collect();
        mounts.sort();
        mounts.dedup();
        if mounts.is_empty() && Platform::host() == Platform::Posix {
            debug!("no mounted volumes reported; falling back to /");
            mounts.push("/".to_string());
        }
        mounts
    }

    fn watch(&self, path: &str, config: &WatcherConfig) -> Result<WatchHandle, WatchError> {
        watcher::spawn_with_config(path, config.clone())
    }

    fn home_directory(&self) -> Option<String> {
        dirs::home_dir().map(|home| home.to_string_lossy().into_owned())
    }
}
