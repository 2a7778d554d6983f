use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, trace};

use crate::error::FsError;
use crate::fs::DirectoryEntry;
use crate::lister::DirectoryLister;

/// Sends listing requests to the background loader.
pub struct LoaderHandle {
    cmd_tx: Sender<LoadCommand>,
    job_counter: Arc<AtomicU64>,
}

impl LoaderHandle {
    /// Queues a listing of `path`; returns the job id, or `None` if the
    /// worker has exited.
    pub fn request_load(&self, path: &str, preserve_selection: bool) -> Option<u64> {
        let job_id = self.job_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.cmd_tx
            .send(LoadCommand::Load {
                job_id,
                path: path.to_string(),
                preserve_selection,
            })
            .ok()
            .map(|_| job_id)
    }
}

pub enum LoadCommand {
    Load {
        job_id: u64,
        path: String,
        preserve_selection: bool,
    },
}

#[derive(Debug)]
pub enum LoadMessage {
    Complete {
        job_id: u64,
        path: String,
        preserve_selection: bool,
        result: Result<Vec<DirectoryEntry>, FsError>,
    },
    /// A newer request was queued before this one started.
    Superseded { job_id: u64, path: String },
}

impl LoadMessage {
    pub fn job_id(&self) -> u64 {
        match self {
            LoadMessage::Complete { job_id, .. } | LoadMessage::Superseded { job_id, .. } => {
                *job_id
            }
        }
    }
}

pub fn spawn(lister: DirectoryLister) -> io::Result<(LoaderHandle, Receiver<LoadMessage>)> {
    let (cmd_tx, cmd_rx) = unbounded();
    let (msg_tx, msg_rx) = unbounded();
    let job_counter = Arc::new(AtomicU64::new(0));

    thread::Builder::new()
        .name("explorer-loader".into())
        .spawn(move || worker_loop(cmd_rx, msg_tx, lister))?;

    Ok((
        LoaderHandle {
            cmd_tx,
            job_counter,
        },
        msg_rx,
    ))
}

fn worker_loop(cmd_rx: Receiver<LoadCommand>, msg_tx: Sender<LoadMessage>, lister: DirectoryLister) {
    while let Ok(mut command) = cmd_rx.recv() {
        // only the newest queued request is worth reading from disk
        while let Ok(newer) = cmd_rx.try_recv() {
            let LoadCommand::Load { job_id, path, .. } = command;
            trace!("loader skipping superseded job {job_id} for {path}");
            let _ = msg_tx.send(LoadMessage::Superseded { job_id, path });
            command = newer;
        }

        let LoadCommand::Load {
            job_id,
            path,
            preserve_selection,
        } = command;
        debug!("loader job {job_id} listing {path:?}");
        let result = lister.load(&path);
        if msg_tx
            .send(LoadMessage::Complete {
                job_id,
                path,
                preserve_selection,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}
