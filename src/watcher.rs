use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use log::{debug, trace, warn};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{DEBOUNCE_WINDOW, WatcherConfig};
use crate::error::WatchError;
use crate::fs::FileSystem;

#[derive(Debug, Clone)]
pub enum WatchEventKind {
    Dirty,
    Rescan,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn dirty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Dirty,
        }
    }

    pub fn rescan(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Rescan,
        }
    }

    pub fn error(path: impl Into<PathBuf>, message: String) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Error(message),
        }
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct WatchHandle {
    pub events: Receiver<WatchEvent>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchHandle {
    /// Wraps an externally driven event source.
    pub fn from_receiver(events: Receiver<WatchEvent>) -> Self {
        Self {
            events,
            watcher: None,
        }
    }

    pub fn stop(mut self) {
        self.watcher.take();
    }
}

pub fn spawn(root: &str) -> Result<WatchHandle, WatchError> {
    spawn_with_config(root, WatcherConfig::default())
}

/// Watches the immediate children of `root` through the OS facility.
pub fn spawn_with_config(root: &str, config: WatcherConfig) -> Result<WatchHandle, WatchError> {
    let (event_tx, event_rx) = unbounded();
    let root_path = PathBuf::from(root);
    let unsupported = |reason: String| WatchError::Unsupported {
        path: root.to_string(),
        reason,
    };

    let mut watcher = new_watcher(root_path.clone(), event_tx, &config)
        .map_err(|err| unsupported(format!("failed to initialise watcher: {err}")))?;
    watcher
        .watch(&root_path, RecursiveMode::NonRecursive)
        .map_err(|err| unsupported(err.to_string()))?;
    debug!("watching {root}");

    Ok(WatchHandle {
        events: event_rx,
        watcher: Some(watcher),
    })
}

fn new_watcher(
    root: PathBuf,
    tx: Sender<WatchEvent>,
    config: &WatcherConfig,
) -> notify::Result<RecommendedWatcher> {
    RecommendedWatcher::new(
        move |event: Result<Event, notify::Error>| match event {
            Ok(event) => {
                for path in &event.paths {
                    if let Some(ev) = map_event_kind(&event.kind, path, &root) {
                        trace!("watcher event kind={:?} path={}", event.kind, path.display());
                        let _ = tx.send(ev);
                    }
                }
            }
            Err(err) => {
                let _ = tx.send(WatchEvent::error(root.clone(), err.to_string()));
            }
        },
        Config::default()
            .with_poll_interval(config.notify_poll_interval)
            .with_compare_contents(false),
    )
}

fn map_event_kind(kind: &EventKind, path: &Path, root: &Path) -> Option<WatchEvent> {
    match kind {
        EventKind::Remove(_) | EventKind::Create(_) | EventKind::Modify(_) => {
            Some(WatchEvent::dirty(path))
        }
        EventKind::Access(_) => None,
        EventKind::Other | EventKind::Any => Some(WatchEvent::rescan(root)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching { path: String },
    Debouncing { path: String, deadline: Instant },
}

/// What the owner of a [`ChangeWatcher`] has to act on after a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// The quiet period elapsed for `path`; its listing should be reloaded.
    Reload(String),
    /// Watching `path` failed; it is left unwatched.
    Degraded { path: String, reason: String },
}

/// Debounced change tracking for the directory currently on display.
pub struct ChangeWatcher {
    state: WatchState,
    handle: Option<WatchHandle>,
    degraded: Option<String>,
    config: WatcherConfig,
    window: Duration,
}

impl ChangeWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            state: WatchState::Idle,
            handle: None,
            degraded: None,
            config,
            window: DEBOUNCE_WINDOW,
        }
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn watched_path(&self) -> Option<&str> {
        match &self.state {
            WatchState::Idle => None,
            WatchState::Watching { path } | WatchState::Debouncing { path, .. } => Some(path),
        }
    }

    /// Points the watcher at `path`, dropping any previous subscription and
    /// pending debounce. The virtual root is never watched, and a path whose
    /// subscription already failed is not retried.
    pub fn subscribe(&mut self, fs: &dyn FileSystem, path: &str) -> Option<WatchSignal> {
        if self.watched_path() == Some(path) {
            return None;
        }
        self.unsubscribe();

        if path.is_empty() {
            return None;
        }
        if self.degraded.as_deref() == Some(path) {
            trace!("not re-watching degraded path {path}");
            return None;
        }
        self.degraded = None;

        match fs.watch(path, &self.config) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = WatchState::Watching {
                    path: path.to_string(),
                };
                None
            }
            Err(err) => Some(self.degrade(path.to_string(), err.to_string())),
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        if let Some(path) = self.watched_path() {
            debug!("stopped watching {path}");
        }
        self.state = WatchState::Idle;
    }

    /// Starts or restarts the quiet period at `now`.
    pub fn record_event(&mut self, now: Instant) {
        let deadline = now + self.window;
        self.state = match std::mem::replace(&mut self.state, WatchState::Idle) {
            WatchState::Idle => WatchState::Idle,
            WatchState::Watching { path } | WatchState::Debouncing { path, .. } => {
                WatchState::Debouncing { path, deadline }
            }
        };
    }

    /// Consumes pending OS events, stamping them with `now`, and reports a
    /// reload once the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<WatchSignal> {
        let mut saw_event = false;
        let mut failure = None;
        if let Some(handle) = self.handle.as_ref() {
            loop {
                match handle.events.try_recv() {
                    Ok(event) => match event.kind {
                        WatchEventKind::Dirty | WatchEventKind::Rescan => saw_event = true,
                        WatchEventKind::Error(message) => {
                            failure = Some(message);
                            break;
                        }
                    },
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        failure = Some("event source disconnected".to_string());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = failure {
            let path = self.watched_path().unwrap_or_default().to_string();
            return Some(self.degrade(path, reason));
        }
        if saw_event {
            self.record_event(now);
        }

        match &self.state {
            WatchState::Debouncing { path, deadline } if now >= *deadline => {
                let path = path.clone();
                self.state = WatchState::Watching { path: path.clone() };
                Some(WatchSignal::Reload(path))
            }
            _ => None,
        }
    }

    /// Time left before a pending reload fires.
    pub fn time_until_fire(&self, now: Instant) -> Option<Duration> {
        match &self.state {
            WatchState::Debouncing { deadline, .. } => Some(deadline.saturating_duration_since(now)),
            _ => None,
        }
    }

    fn degrade(&mut self, path: String, reason: String) -> WatchSignal {
        warn!("watching {path} unavailable, manual refresh only: {reason}");
        self.unsubscribe();
        self.degraded = Some(path.clone());
        WatchSignal::Degraded { path, reason }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
