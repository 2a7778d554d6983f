use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{BrowserError, FsError};
use crate::fs::{DirectoryEntry, FileSystem};
use crate::lister::DirectoryLister;
use crate::loader::{self, LoadMessage, LoaderHandle};
use crate::path::{self, Platform};
use crate::prefs::{Prefs, PrefsStore};
use crate::security::SecurityGate;
use crate::selection::SelectionEngine;
use crate::sort::{self, SortField, SortSpec};
use crate::startup;
use crate::watcher::{ChangeWatcher, WatchSignal, WatchState};

/// Everything a view renders. Replaced wholesale on every applied listing.
#[derive(Debug, Clone, Default)]
pub struct BrowserState {
    /// Empty for the virtual root (the drive list).
    pub current_path: String,
    /// Always in `sort` order.
    pub entries: Vec<DirectoryEntry>,
    pub selection: SelectionEngine,
    pub sort: SortSpec,
}

/// Notifications for views and collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    StateReplaced,
    SelectionChanged,
    Status(String),
    AccessDenied { path: String, reason: String },
    WatchDegraded(String),
}

/// The stateful browser engine.
///
/// Listings are read on a background worker; results are applied on the
/// caller's thread from [`BrowserController::poll`], which also drives the
/// change watcher's debounce timer. A listing is applied only if its path is
/// still the most recently requested one.
pub struct BrowserController {
    fs: Arc<dyn FileSystem>,
    config: BrowserConfig,
    gate: SecurityGate,
    loader: LoaderHandle,
    load_rx: Receiver<LoadMessage>,
    state: BrowserState,
    watcher: ChangeWatcher,
    target: Option<String>,
    in_flight: usize,
    pending_preselect: Option<(String, Vec<String>)>,
    status_text: Option<String>,
    last_error: Option<String>,
    subscribers: Vec<Sender<BrowserEvent>>,
    prefs: Option<PrefsStore>,
    closed: bool,
}

impl BrowserController {
    pub fn new(fs: Arc<dyn FileSystem>, config: BrowserConfig) -> Result<Self, BrowserError> {
        let lister = DirectoryLister::new(fs.clone(), config.platform, config.metadata_workers);
        let (loader, load_rx) = loader::spawn(lister).map_err(BrowserError::LoaderSpawn)?;
        let gate = SecurityGate::with_defaults(config.platform, &config.extra_blocked);
        let prefs = config.prefs_path.clone().map(PrefsStore::open);
        let state = BrowserState {
            sort: prefs.as_ref().map(|store| store.prefs().sort).unwrap_or_default(),
            ..BrowserState::default()
        };

        Ok(Self {
            fs,
            watcher: ChangeWatcher::new(config.watcher.clone()),
            config,
            gate,
            loader,
            load_rx,
            state,
            target: None,
            in_flight: 0,
            pending_preselect: None,
            status_text: None,
            last_error: None,
            subscribers: Vec::new(),
            prefs,
            closed: false,
        })
    }

    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    pub fn current_path(&self) -> &str {
        &self.state.current_path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.state.entries
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        self.state.selection.selected()
    }

    pub fn anchor_index(&self) -> Option<usize> {
        self.state.selection.anchor_index()
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.state.sort
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn watch_state(&self) -> &WatchState {
        self.watcher.state()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn subscribe(&mut self) -> Receiver<BrowserEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Last visited directory, else home, else the platform's top level.
    pub fn start_location(&self) -> String {
        if let Some(last) = self
            .prefs
            .as_ref()
            .and_then(|store| store.prefs().last_path.clone())
            .filter(|path| !self.gate.is_blocked(path))
        {
            return last;
        }
        if let Some(home) = self
            .fs
            .home_directory()
            .filter(|path| !self.gate.is_blocked(path))
        {
            return home;
        }
        match self.config.platform {
            Platform::Posix => "/".to_string(),
            Platform::Windows => String::new(),
        }
    }

    pub fn navigate(&mut self, path: &str) -> Result<(), BrowserError> {
        self.request(path, false)
    }

    pub fn refresh(&mut self) -> Result<(), BrowserError> {
        let current = self.state.current_path.clone();
        self.request(&current, true)
    }

    /// Moves to the parent directory, or to the drive list from a root.
    pub fn go_up(&mut self) -> Result<(), BrowserError> {
        if self.state.current_path.is_empty() {
            return Ok(());
        }
        let parent = ascend(&self.state.current_path, self.config.platform);
        self.navigate(&parent)
    }

    /// Opens the directory containing `file_path` and selects the file once
    /// the listing arrives.
    pub fn open_startup(&mut self, file_path: &str) -> Result<(), BrowserError> {
        let target = startup::resolve(file_path, self.config.platform);
        self.pending_preselect = Some((target.parent_dir.clone(), target.preselect));
        self.navigate(&target.parent_dir)
    }

    pub fn sort(&mut self, field: SortField) {
        self.state.sort = self.state.sort.toggled(field);
        sort::order(&mut self.state.entries, self.state.sort);
        self.remember_prefs();
        self.emit(BrowserEvent::StateReplaced);
    }

    /// Applies `spec` directly, without the toggle behaviour of [`Self::sort`].
    pub fn set_sort(&mut self, spec: SortSpec) {
        if spec == self.state.sort {
            return;
        }
        self.state.sort = spec;
        sort::order(&mut self.state.entries, spec);
        self.remember_prefs();
        self.emit(BrowserEvent::StateReplaced);
    }

    pub fn select_single(&mut self, path: &str, index: usize) {
        self.state.selection.select_single(path, index);
        self.emit(BrowserEvent::SelectionChanged);
    }

    pub fn toggle(&mut self, path: &str, index: usize) {
        self.state.selection.toggle(path, index);
        self.emit(BrowserEvent::SelectionChanged);
    }

    pub fn select_range(&mut self, index: usize, additive: bool) {
        self.state
            .selection
            .select_range(&self.state.entries, index, additive);
        self.emit(BrowserEvent::SelectionChanged);
    }

    pub fn select_all(&mut self) {
        self.state.selection.select_all(&self.state.entries);
        self.emit(BrowserEvent::SelectionChanged);
    }

    pub fn clear_selection(&mut self) {
        self.state.selection.clear();
        self.emit(BrowserEvent::SelectionChanged);
    }

    pub fn poll(&mut self) {
        self.poll_at(Instant::now());
    }

    /// Applies finished listings, advances the debounce timer to `now` and
    /// flushes due preferences. Does nothing once closed.
    pub fn poll_at(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        while let Ok(message) = self.load_rx.try_recv() {
            self.handle_load_message(message);
        }

        match self.watcher.poll(now) {
            Some(WatchSignal::Reload(path)) => self.reload_from_watcher(&path),
            Some(WatchSignal::Degraded { path, .. }) => self.emit(BrowserEvent::WatchDegraded(path)),
            None => {}
        }

        if let Some(store) = self.prefs.as_mut() {
            if let Err(err) = store.persist_due(now) {
                warn!("failed to persist preferences: {err}");
            }
        }
    }

    /// Blocks until no listing is outstanding or `timeout` elapses; returns
    /// whether the controller went idle.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.load_rx.recv_timeout(remaining) {
                Ok(message) => self.handle_load_message(message),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    self.in_flight = 0;
                    return false;
                }
            }
        }
        true
    }

    /// Stops watching and writes pending preferences. A closed controller
    /// rejects further loads with [`BrowserError::Closed`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.watcher.unsubscribe();
        if let Some(store) = self.prefs.as_mut() {
            if let Err(err) = store.flush() {
                warn!("failed to persist preferences: {err}");
            }
        }
        debug!("browser closed at {:?}", self.state.current_path);
    }

    fn request(&mut self, path: &str, preserve_selection: bool) -> Result<(), BrowserError> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        if self.gate.is_blocked(path) {
            let reason = "protected system directory".to_string();
            self.set_error(format!("Access denied: {path}"));
            self.emit(BrowserEvent::AccessDenied {
                path: path.to_string(),
                reason: reason.clone(),
            });
            return Err(BrowserError::AccessDenied {
                path: path.to_string(),
                reason,
            });
        }

        if path != self.state.current_path {
            // leaving: a pending debounce for the old directory must not fire
            self.watcher.unsubscribe();
        }

        self.loader
            .request_load(path, preserve_selection)
            .ok_or(BrowserError::LoaderStopped)?;
        self.in_flight += 1;
        self.target = Some(path.to_string());
        self.set_status(format!("Loading {}…", display_path(path)));
        Ok(())
    }

    fn reload_from_watcher(&mut self, path: &str) {
        let live = self.target.as_deref().unwrap_or(&self.state.current_path);
        if path != self.state.current_path || path != live {
            debug!("dropping stale watcher reload for {path}");
            return;
        }
        debug!("watcher detected changes in {path}; reloading");
        if let Err(err) = self.request(path, true) {
            warn!("watcher reload for {path} failed: {err}");
        }
    }

    fn handle_load_message(&mut self, message: LoadMessage) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let LoadMessage::Complete {
            job_id,
            path,
            preserve_selection,
            result,
        } = message
        else {
            return;
        };

        if self.target.as_deref() != Some(path.as_str()) {
            debug!("discarding stale listing job {job_id} for {path:?}");
            return;
        }

        match result {
            Ok(entries) => self.apply_listing(path, entries, preserve_selection),
            Err(FsError::NotFound(_)) if path == self.state.current_path && !path.is_empty() => {
                let parent = ascend(&path, self.config.platform);
                info!("{path} vanished; moving to {parent:?}");
                self.set_error(format!("{path} no longer exists"));
                if let Err(err) = self.navigate(&parent) {
                    warn!("could not recover from vanished {path}: {err}");
                }
            }
            Err(err) => self.reject_listing(&path, BrowserError::from(err)),
        }
    }

    fn apply_listing(
        &mut self,
        path: String,
        mut entries: Vec<DirectoryEntry>,
        preserve_selection: bool,
    ) {
        sort::order(&mut entries, self.state.sort);
        let same_directory = path == self.state.current_path;

        self.state.current_path = path;
        self.state.entries = entries;
        if preserve_selection && same_directory {
            self.state.selection.prune(&self.state.entries);
        } else {
            self.state.selection.clear();
        }
        self.apply_preselect();

        if self.config.watch_enabled {
            let current = self.state.current_path.clone();
            if let Some(WatchSignal::Degraded { path, .. }) =
                self.watcher.subscribe(self.fs.as_ref(), &current)
            {
                self.emit(BrowserEvent::WatchDegraded(path));
            }
        }

        self.remember_prefs();
        self.last_error = None;
        self.set_status(format!(
            "Loaded {} entries from {}",
            self.state.entries.len(),
            display_path(&self.state.current_path)
        ));
        self.emit(BrowserEvent::StateReplaced);
    }

    fn apply_preselect(&mut self) {
        let Some((dir, paths)) = self.pending_preselect.take() else {
            return;
        };
        if dir != self.state.current_path {
            self.pending_preselect = Some((dir, paths));
            return;
        }
        let mut first = true;
        for wanted in paths {
            let Some(index) = self
                .state
                .entries
                .iter()
                .position(|entry| entry.path == wanted)
            else {
                debug!("startup file {wanted} not in listing");
                continue;
            };
            if first {
                self.state.selection.select_single(&wanted, index);
                first = false;
            } else {
                self.state.selection.toggle(&wanted, index);
            }
        }
    }

    fn reject_listing(&mut self, path: &str, err: BrowserError) {
        warn!("listing {path:?} failed: {err}");
        if let BrowserError::AccessDenied { path, reason } = &err {
            self.emit(BrowserEvent::AccessDenied {
                path: path.clone(),
                reason: reason.clone(),
            });
        }
        self.set_error(err.to_string());
        if self
            .pending_preselect
            .as_ref()
            .is_some_and(|(dir, _)| dir == path)
        {
            self.pending_preselect = None;
        }

        // stay where we were and resume watching it
        let current = self.state.current_path.clone();
        self.target = Some(current.clone());
        if self.config.watch_enabled {
            if let Some(WatchSignal::Degraded { path, .. }) =
                self.watcher.subscribe(self.fs.as_ref(), &current)
            {
                self.emit(BrowserEvent::WatchDegraded(path));
            }
        }
    }

    fn remember_prefs(&mut self) {
        if let Some(store) = self.prefs.as_mut() {
            let prefs = Prefs {
                sort: self.state.sort,
                last_path: Some(self.state.current_path.clone()),
            };
            store.update(Instant::now(), prefs);
        }
    }

    fn set_status(&mut self, message: String) {
        self.status_text = Some(message.clone());
        self.emit(BrowserEvent::Status(message));
    }

    fn set_error(&mut self, message: String) {
        self.last_error = Some(message.clone());
        self.set_status(message);
    }

    fn emit(&mut self, event: BrowserEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parent for "go up"; ascending past `/` or a drive root yields the virtual root.
fn ascend(path: &str, platform: Platform) -> String {
    let parent = path::parent_of(path, platform);
    if parent == path { String::new() } else { parent }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "drives" } else { path }
}
