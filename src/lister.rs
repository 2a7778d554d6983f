use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use log::debug;

use crate::error::FsError;
use crate::fs::{DirectoryEntry, EntryStat, FileSystem};
use crate::path::{self, Platform};

/// Produces fully populated listings for a directory or the virtual root.
#[derive(Clone)]
pub struct DirectoryLister {
    fs: Arc<dyn FileSystem>,
    platform: Platform,
    workers: usize,
}

impl DirectoryLister {
    pub fn new(fs: Arc<dyn FileSystem>, platform: Platform, workers: usize) -> Self {
        Self {
            fs,
            platform,
            workers: workers.max(1),
        }
    }

    /// Lists `path`, or the logical drives when `path` is empty.
    ///
    /// Only a failure to read `path` itself is an error; entries whose
    /// metadata cannot be read are kept with no size or timestamp.
    pub fn load(&self, path: &str) -> Result<Vec<DirectoryEntry>, FsError> {
        if path.is_empty() {
            let drives: Vec<DirectoryEntry> = self
                .fs
                .list_logical_drives()
                .iter()
                .map(|label| DirectoryEntry::drive(label, self.platform))
                .collect();
            debug!("listed {} logical drives", drives.len());
            return Ok(drives);
        }

        let children = self.fs.list_directory(path)?;
        let child_paths: Vec<String> = children
            .iter()
            .map(|child| path::join(path, &child.name, self.platform))
            .collect();
        let stats = self.stat_all(&child_paths);

        let entries = children
            .into_iter()
            .zip(child_paths)
            .zip(stats)
            .map(|((child, child_path), stat)| {
                let stat = stat.unwrap_or_default();
                let size = if child.is_directory { None } else { stat.size };
                DirectoryEntry::new(child.name, child_path, child.is_directory, size, stat.modified)
            })
            .collect::<Vec<_>>();
        debug!("listed {} entries in {path}", entries.len());
        Ok(entries)
    }

    /// Fetches metadata for every path on a bounded pool; returns in input order.
    fn stat_all(&self, paths: &[String]) -> Vec<Option<EntryStat>> {
        let mut results: Vec<Option<EntryStat>> = vec![None; paths.len()];
        if paths.is_empty() {
            return results;
        }

        let (job_tx, job_rx) = unbounded::<(usize, &str)>();
        let (result_tx, result_rx) = unbounded::<(usize, Option<EntryStat>)>();
        for (idx, path) in paths.iter().enumerate() {
            let _ = job_tx.send((idx, path.as_str()));
        }
        drop(job_tx);

        let workers = self.workers.min(paths.len());
        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let fs = &self.fs;
                scope.spawn(move || {
                    while let Ok((idx, path)) = job_rx.recv() {
                        let stat = match fs.stat_entry(path) {
                            Ok(stat) => Some(stat),
                            Err(err) => {
                                debug!("metadata unavailable for {path}: {err}");
                                None
                            }
                        };
                        let _ = result_tx.send((idx, stat));
                    }
                });
            }
        });
        drop(result_tx);

        for (idx, stat) in result_rx.iter() {
            results[idx] = stat;
        }
        results
    }
}
