use log::debug;

use crate::path::Platform;

const POSIX_DENY_LIST: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr",
    "/System", "/Library", "/Applications", "/private/etc",
];

const WINDOWS_DENY_SUFFIXES: &[&str] = &[
    "Windows",
    "Program Files",
    "Program Files (x86)",
    "ProgramData",
    "Users/Default",
];

/// Classifies paths as browsable or blocked.
///
/// Deny-list entries are stored normalised (forward slashes, lowercase, no
/// trailing separator). A path is blocked when it equals an entry or lies
/// beneath one.
#[derive(Debug, Clone)]
pub struct SecurityGate {
    deny_list: Vec<String>,
}

impl SecurityGate {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let deny_list = entries
            .into_iter()
            .map(|entry| normalize(entry.as_ref()))
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { deny_list }
    }

    /// The built-in deny-list for both path styles plus `extra` entries.
    pub fn with_defaults(platform: Platform, extra: &[String]) -> Self {
        let system_drive = system_drive(platform);
        let mut entries: Vec<String> = POSIX_DENY_LIST.iter().map(|s| s.to_string()).collect();
        entries.extend(
            WINDOWS_DENY_SUFFIXES
                .iter()
                .map(|suffix| format!("{system_drive}/{suffix}")),
        );
        entries.extend(extra.iter().cloned());
        Self::new(entries)
    }

    pub fn is_blocked(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let candidate = normalize(path);
        let blocked = self.deny_list.iter().find(|entry| {
            candidate == **entry
                || (candidate.starts_with(entry.as_str())
                    && candidate[entry.len()..].starts_with('/'))
        });
        if let Some(entry) = blocked {
            debug!("security gate blocked {path} (matched {entry})");
            true
        } else {
            false
        }
    }
}

fn system_drive(platform: Platform) -> String {
    match platform {
        Platform::Windows => std::env::var("SystemDrive")
            .ok()
            .filter(|drive| !drive.is_empty())
            .unwrap_or_else(|| "C:".to_string()),
        Platform::Posix => "C:".to_string(),
    }
}

/// Forward slashes, lowercase, `.`/`..` resolved, no trailing separator.
fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/").to_lowercase();
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // never pop the drive prefix
                if segments.len() > 1 || segments.first().is_some_and(|s| !s.ends_with(':')) {
                    segments.pop();
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
