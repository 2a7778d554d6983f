use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::PrefsError;
use crate::sort::SortSpec;

const PREFS_VERSION: u32 = 1;
const SAVE_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Prefs {
    pub sort: SortSpec,
    pub last_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedPrefs {
    version: u32,
    #[serde(flatten)]
    prefs: Prefs,
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut base| {
        base.push("explore");
        base.push("prefs.json");
        base
    })
}

/// Reads preferences; a missing file, bad json or a version mismatch yields `None`.
pub fn load(path: &Path) -> Option<Prefs> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(err) => {
            debug!("no preferences at {}: {err}", path.display());
            return None;
        }
    };
    match serde_json::from_str::<PersistedPrefs>(&json) {
        Ok(state) if state.version == PREFS_VERSION => Some(state.prefs),
        Ok(state) => {
            debug!(
                "preferences version mismatch ({} vs {})",
                state.version, PREFS_VERSION
            );
            None
        }
        Err(err) => {
            warn!("preferences parse error: {err}");
            None
        }
    }
}

pub fn save(path: &Path, prefs: &Prefs) -> Result<(), PrefsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let state = PersistedPrefs {
        version: PREFS_VERSION,
        prefs: prefs.clone(),
    };
    fs::write(path, serde_json::to_string_pretty(&state)?)?;
    Ok(())
}

/// Write-behind store: changes are flushed once they have been quiet for a
/// short delay, or on [`PrefsStore::flush`].
#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    current: Prefs,
    next_save: Option<Instant>,
}

impl PrefsStore {
    pub fn open(path: PathBuf) -> Self {
        let current = load(&path).unwrap_or_default();
        Self {
            path,
            current,
            next_save: None,
        }
    }

    pub fn prefs(&self) -> &Prefs {
        &self.current
    }

    pub fn update(&mut self, now: Instant, prefs: Prefs) {
        if prefs == self.current {
            return;
        }
        self.current = prefs;
        self.next_save = Some(now + SAVE_DELAY);
    }

    pub fn is_dirty(&self) -> bool {
        self.next_save.is_some()
    }

    /// Saves if the write-behind delay has passed.
    pub fn persist_due(&mut self, now: Instant) -> Result<(), PrefsError> {
        match self.next_save {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Ok(()),
        }
    }

    pub fn flush(&mut self) -> Result<(), PrefsError> {
        if self.next_save.is_none() {
            return Ok(());
        }
        save(&self.path, &self.current)?;
        self.next_save = None;
        Ok(())
    }
}
