use std::io;

use thiserror::Error;

/// Failures reported by a [`crate::fs::FileSystem`] implementation.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("permission denied for {0}")]
    PermissionDenied(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_string()),
            _ => FsError::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watching {path} is unsupported: {reason}")]
    Unsupported { path: String, reason: String },
}

/// Errors surfaced by the browser to its callers.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("access denied: {path} ({reason})")]
    AccessDenied { path: String, reason: String },
    #[error("{0} no longer exists")]
    NotFound(String),
    #[error("failed to list {path}: {message}")]
    Io { path: String, message: String },
    #[error("directory loader is no longer running")]
    LoaderStopped,
    #[error("failed to start directory loader: {0}")]
    LoaderSpawn(#[source] io::Error),
    #[error("browser is closed")]
    Closed,
}

impl From<FsError> for BrowserError {
    fn from(value: FsError) -> Self {
        match value {
            FsError::NotFound(path) => BrowserError::NotFound(path),
            FsError::PermissionDenied(path) => BrowserError::AccessDenied {
                path,
                reason: "permission denied".to_string(),
            },
            FsError::Io { path, source } => BrowserError::Io {
                path,
                message: source.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preferences io error: {0}")]
    Io(#[from] io::Error),
    #[error("preferences are not valid json: {0}")]
    Json(#[from] serde_json::Error),
}
