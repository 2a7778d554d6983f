use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{Receiver, Sender, unbounded};
use explorer_core::config::WatcherConfig;
use explorer_core::path::{file_name, parent_of};
use explorer_core::watcher::{WatchEvent, WatchHandle, WatchState};
use explorer_core::{
    BrowserConfig, BrowserController, BrowserError, BrowserEvent, EntryStat, FileSystem, FsError,
    Platform, RawEntry, SortDirection, SortField, WatchError,
};

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct FakeChild {
    name: String,
    is_directory: bool,
    size: Option<u64>,
    stat_fails: bool,
}

#[derive(Default)]
struct FakeFs {
    dirs: Mutex<BTreeMap<String, Vec<FakeChild>>>,
    drives: Vec<String>,
    denied: Vec<String>,
    unwatchable: Vec<String>,
    list_calls: Mutex<BTreeMap<String, usize>>,
    watchers: Mutex<Vec<(String, Sender<WatchEvent>)>>,
}

impl FakeFs {
    fn with_dir(self, path: &str, children: Vec<FakeChild>) -> Self {
        self.dirs.lock().unwrap().insert(path.to_string(), children);
        self
    }

    fn remove_child(&self, dir: &str, name: &str) {
        if let Some(children) = self.dirs.lock().unwrap().get_mut(dir) {
            children.retain(|child| child.name != name);
        }
    }

    fn remove_dir(&self, dir: &str) {
        self.dirs.lock().unwrap().remove(dir);
    }

    fn list_calls(&self, path: &str) -> usize {
        self.list_calls
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    fn watch_sender(&self, path: &str) -> Sender<WatchEvent> {
        self.watchers
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(watched, _)| watched == path)
            .map(|(_, tx)| tx.clone())
            .expect("path is watched")
    }
}

impl FileSystem for FakeFs {
    fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>, FsError> {
        *self
            .list_calls
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;
        if self.denied.iter().any(|denied| denied == path) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        self.dirs
            .lock()
            .unwrap()
            .get(path)
            .map(|children| {
                children
                    .iter()
                    .map(|child| RawEntry {
                        name: child.name.clone(),
                        is_directory: child.is_directory,
                    })
                    .collect()
            })
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn stat_entry(&self, path: &str) -> Result<EntryStat, FsError> {
        // fake paths are rooted at `/` or carry a drive prefix
        let parent = parent_of(path, Platform::Posix);
        let name = file_name(path, Platform::Posix);
        let dirs = self.dirs.lock().unwrap();
        let child = dirs
            .get(&parent)
            .and_then(|children| children.iter().find(|child| child.name == name))
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if child.stat_fails {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        Ok(EntryStat {
            size: child.size,
            modified: Some(SystemTime::UNIX_EPOCH),
        })
    }

    fn list_logical_drives(&self) -> Vec<String> {
        self.drives.clone()
    }

    fn watch(&self, path: &str, _config: &WatcherConfig) -> Result<WatchHandle, WatchError> {
        if self.unwatchable.iter().any(|p| p == path) {
            return Err(WatchError::Unsupported {
                path: path.to_string(),
                reason: "network share".to_string(),
            });
        }
        let (tx, rx) = unbounded();
        self.watchers.lock().unwrap().push((path.to_string(), tx));
        Ok(WatchHandle::from_receiver(rx))
    }

    fn home_directory(&self) -> Option<String> {
        Some("/data".to_string())
    }
}

fn file(name: &str, size: u64) -> FakeChild {
    FakeChild {
        name: name.to_string(),
        is_directory: false,
        size: Some(size),
        stat_fails: false,
    }
}

fn dir(name: &str) -> FakeChild {
    FakeChild {
        name: name.to_string(),
        is_directory: true,
        size: None,
        stat_fails: false,
    }
}

fn data_fs() -> FakeFs {
    FakeFs::default()
        .with_dir("/data", vec![file("a.txt", 10), dir("b"), file("c.txt", 5)])
        .with_dir("/data/b", vec![file("inner.txt", 1)])
        .with_dir("/other", vec![file("x", 1)])
}

fn config(platform: Platform) -> BrowserConfig {
    BrowserConfig {
        platform,
        ..BrowserConfig::ephemeral()
    }
}

fn controller(fs: &Arc<FakeFs>) -> BrowserController {
    BrowserController::new(fs.clone(), config(Platform::Posix)).expect("controller")
}

fn open(controller: &mut BrowserController, path: &str) {
    controller.navigate(path).expect("navigate");
    assert!(controller.wait_until_idle(IDLE_TIMEOUT), "listing of {path}");
    assert_eq!(controller.current_path(), path);
}

fn names(controller: &BrowserController) -> Vec<&str> {
    controller
        .entries()
        .iter()
        .map(|entry| entry.name.as_str())
        .collect()
}

fn selected(controller: &BrowserController) -> Vec<&str> {
    controller.selection().iter().map(String::as_str).collect()
}

fn drain(rx: &Receiver<BrowserEvent>) -> Vec<BrowserEvent> {
    rx.try_iter().collect()
}

#[test]
fn drive_list_round_trip() {
    let fs = Arc::new(
        FakeFs {
            drives: vec!["C:\\".to_string(), "D:\\".to_string()],
            ..FakeFs::default()
        }
        .with_dir("C:\\", vec![file("boot.ini", 3), dir("Users")]),
    );
    let mut browser =
        BrowserController::new(fs.clone(), config(Platform::Windows)).expect("controller");

    open(&mut browser, "");
    let drives: Vec<&str> = browser.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(drives, ["C:\\", "D:\\"]);
    assert!(browser.entries().iter().all(|e| e.is_drive));

    open(&mut browser, "C:\\");
    let paths: Vec<&str> = browser.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["C:\\Users", "C:\\boot.ini"]);

    browser.go_up().expect("go up");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(browser.current_path(), "");
    let drives: Vec<&str> = browser.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(drives, ["C:\\", "D:\\"]);

    browser.go_up().expect("no-op at the virtual root");
    assert!(!browser.is_loading());
}

#[test]
fn go_up_from_posix_root_reaches_drive_list() {
    let fs = Arc::new(
        FakeFs {
            drives: vec!["/".to_string()],
            ..FakeFs::default()
        }
        .with_dir("/", vec![dir("data")]),
    );
    let mut browser = controller(&fs);
    open(&mut browser, "/");
    browser.go_up().expect("go up");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(browser.current_path(), "");
    assert_eq!(names(&browser), ["/"]);
}

#[test]
fn directories_list_before_files() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    assert_eq!(names(&browser), ["b", "a.txt", "c.txt"]);

    browser.sort(SortField::Name);
    assert_eq!(browser.sort_spec().direction, SortDirection::Desc);
    assert_eq!(names(&browser), ["b", "c.txt", "a.txt"]);

    browser.sort(SortField::Size);
    assert_eq!(browser.sort_spec().direction, SortDirection::Asc);
    assert_eq!(names(&browser), ["b", "c.txt", "a.txt"]);
    assert_eq!(fs.list_calls("/data"), 1, "sorting never re-lists");
}

#[test]
fn blocked_paths_leave_state_untouched() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    let events = browser.subscribe();

    for blocked in ["/etc", "C:\\Windows"] {
        match browser.navigate(blocked) {
            Err(BrowserError::AccessDenied { path, .. }) => assert_eq!(path, blocked),
            other => panic!("expected access denied, got {other:?}"),
        }
        assert_eq!(browser.current_path(), "/data");
        assert_eq!(names(&browser), ["b", "a.txt", "c.txt"]);
        assert_eq!(fs.list_calls(blocked), 0);
    }

    let denied = drain(&events)
        .into_iter()
        .filter(|event| matches!(event, BrowserEvent::AccessDenied { .. }))
        .count();
    assert_eq!(denied, 2);
    assert!(browser.last_error().is_some());
}

#[test]
fn unreadable_directory_reports_access_denied() {
    let fs = Arc::new(FakeFs {
        denied: vec!["/secret".to_string()],
        ..data_fs()
    });
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    let events = browser.subscribe();

    browser.navigate("/secret").expect("request is queued");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(browser.current_path(), "/data");
    assert!(drain(&events).iter().any(|event| matches!(
        event,
        BrowserEvent::AccessDenied { path, .. } if path == "/secret"
    )));
    assert!(matches!(browser.watch_state(), WatchState::Watching { path } if path == "/data"));
}

#[test]
fn range_selection_is_idempotent() {
    let fs = Arc::new(
        FakeFs::default().with_dir(
            "/many",
            (0..6).map(|idx| file(&format!("f{idx}"), idx)).collect(),
        ),
    );
    let mut browser = controller(&fs);
    open(&mut browser, "/many");

    let first = browser.entries()[0].path.clone();
    browser.select_single(&first, 0);
    for _ in 0..3 {
        browser.select_range(3, false);
        assert_eq!(
            selected(&browser),
            ["/many/f0", "/many/f1", "/many/f2", "/many/f3"]
        );
    }
    assert_eq!(browser.anchor_index(), Some(0));

    browser.clear_selection();
    assert!(browser.selection().is_empty());
    assert_eq!(browser.anchor_index(), None);
}

#[test]
fn refresh_prunes_vanished_selection() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    browser.select_all();
    assert_eq!(browser.selection().len(), 3);

    fs.remove_child("/data", "a.txt");
    browser.refresh().expect("refresh");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));

    assert_eq!(selected(&browser), ["/data/b", "/data/c.txt"]);
    assert_eq!(names(&browser), ["b", "c.txt"]);
}

#[test]
fn navigating_clears_selection() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    browser.toggle("/data/a.txt", 1);
    open(&mut browser, "/data/b");
    assert!(browser.selection().is_empty());
    assert_eq!(browser.anchor_index(), None);
}

#[test]
fn burst_of_changes_reloads_once() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    let tx = fs.watch_sender("/data");

    let start = Instant::now();
    for step in 0..5u64 {
        tx.send(WatchEvent::dirty("/data/a.txt")).unwrap();
        browser.poll_at(start + Duration::from_millis(step * 10));
    }
    assert_eq!(fs.list_calls("/data"), 1);

    browser.poll_at(start + Duration::from_millis(40 + 250));
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    browser.poll_at(start + Duration::from_secs(2));
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));

    assert_eq!(fs.list_calls("/data"), 2);
}

#[test]
fn watcher_reload_keeps_surviving_selection() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    browser.toggle("/data/a.txt", 1);
    browser.toggle("/data/c.txt", 2);

    fs.remove_child("/data", "c.txt");
    fs.watch_sender("/data")
        .send(WatchEvent::dirty("/data/c.txt"))
        .unwrap();
    let start = Instant::now();
    browser.poll_at(start);
    browser.poll_at(start + Duration::from_millis(300));
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));

    assert_eq!(selected(&browser), ["/data/a.txt"]);
}

#[test]
fn navigation_cancels_pending_reload() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");

    fs.watch_sender("/data")
        .send(WatchEvent::dirty("/data/a.txt"))
        .unwrap();
    let start = Instant::now();
    browser.poll_at(start);
    assert!(matches!(browser.watch_state(), WatchState::Debouncing { .. }));

    browser.navigate("/other").expect("navigate");
    browser.poll_at(start + Duration::from_millis(500));
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    browser.poll_at(start + Duration::from_secs(1));

    assert_eq!(browser.current_path(), "/other");
    assert_eq!(fs.list_calls("/data"), 1);
    assert!(matches!(browser.watch_state(), WatchState::Watching { path } if path == "/other"));
}

#[test]
fn last_navigation_wins() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    browser.navigate("/data").expect("first");
    browser.navigate("/data/b").expect("second");
    browser.navigate("/other").expect("third");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(browser.current_path(), "/other");
    assert_eq!(names(&browser), ["x"]);
}

#[test]
fn vanished_directory_moves_to_parent() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data/b");

    fs.remove_dir("/data/b");
    fs.remove_child("/data", "b");
    browser.refresh().expect("refresh");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));

    assert_eq!(browser.current_path(), "/data");
    assert_eq!(names(&browser), ["a.txt", "c.txt"]);
}

#[test]
fn missing_target_keeps_current_listing() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    browser.navigate("/nowhere").expect("queued");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(browser.current_path(), "/data");
    assert!(browser.last_error().is_some_and(|err| err.contains("/nowhere")));
}

#[test]
fn unwatchable_directory_still_browses() {
    let fs = Arc::new(FakeFs {
        unwatchable: vec!["/data".to_string()],
        ..data_fs()
    });
    let mut browser = controller(&fs);
    let events = browser.subscribe();
    open(&mut browser, "/data");

    assert_eq!(browser.watch_state(), &WatchState::Idle);
    assert!(drain(&events)
        .iter()
        .any(|event| matches!(event, BrowserEvent::WatchDegraded(path) if path == "/data")));

    fs.remove_child("/data", "a.txt");
    browser.refresh().expect("manual refresh");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(names(&browser), ["b", "c.txt"]);
}

#[test]
fn failed_stat_keeps_entry_with_unknown_metadata() {
    let mut locked = file("locked.bin", 99);
    locked.stat_fails = true;
    let fs = Arc::new(FakeFs::default().with_dir("/mixed", vec![locked, file("open.bin", 4)]));
    let mut browser = controller(&fs);
    open(&mut browser, "/mixed");

    let locked = browser
        .entries()
        .iter()
        .find(|entry| entry.name == "locked.bin")
        .expect("entry kept");
    assert_eq!(locked.size, None);
    assert_eq!(locked.modified, None);
}

#[test]
fn startup_file_is_preselected() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    browser.open_startup("/data/c.txt").expect("open");
    assert!(browser.wait_until_idle(IDLE_TIMEOUT));

    assert_eq!(browser.current_path(), "/data");
    assert_eq!(selected(&browser), ["/data/c.txt"]);
    assert_eq!(browser.anchor_index(), Some(2));
}

#[test]
fn preferences_survive_a_restart() {
    let prefs_dir = tempfile::tempdir().expect("tempdir");
    let prefs_path = prefs_dir.path().join("prefs.json");
    let fs = Arc::new(data_fs());
    let make = || {
        BrowserController::new(
            fs.clone(),
            BrowserConfig {
                prefs_path: Some(prefs_path.clone()),
                ..config(Platform::Posix)
            },
        )
        .expect("controller")
    };

    let mut browser = make();
    assert_eq!(browser.start_location(), "/data");
    open(&mut browser, "/data/b");
    browser.sort(SortField::Modified);
    browser.close();
    drop(browser);

    let restored = make();
    assert_eq!(restored.sort_spec().field, SortField::Modified);
    assert_eq!(restored.start_location(), "/data/b");
}

#[test]
fn closed_browser_stops_loading_and_watching() {
    let fs = Arc::new(data_fs());
    let mut browser = controller(&fs);
    open(&mut browser, "/data");
    assert!(matches!(browser.watch_state(), WatchState::Watching { .. }));

    browser.close();
    assert!(browser.is_closed());
    assert_eq!(browser.watch_state(), &WatchState::Idle);
    assert!(matches!(browser.navigate("/other"), Err(BrowserError::Closed)));
    assert!(matches!(browser.refresh(), Err(BrowserError::Closed)));
    assert!(!browser.is_loading());

    browser.poll_at(Instant::now() + Duration::from_secs(1));
    assert_eq!(browser.current_path(), "/data");
    assert_eq!(browser.watch_state(), &WatchState::Idle);
    assert_eq!(fs.list_calls("/other"), 0);
}
