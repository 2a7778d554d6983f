//! Separator-aware string arithmetic for platform paths.
//!
//! Paths are handled as strings rather than [`std::path::PathBuf`] so that a
//! Windows path can be reasoned about on a POSIX host (and vice versa). A
//! drive prefix always marks a Windows path; otherwise the host [`Platform`]
//! decides, and on POSIX a backslash is an ordinary name character.

use serde::{Deserialize, Serialize};

pub const POSIX_SEPARATOR: char = '/';
pub const WINDOWS_SEPARATOR: char = '\\';

/// Path flavour of the host the browser runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn host() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn separator(self) -> char {
        match self {
            Platform::Posix => POSIX_SEPARATOR,
            Platform::Windows => WINDOWS_SEPARATOR,
        }
    }

    /// The flavour `path` is written in when browsed on this platform.
    pub fn style_of(self, path: &str) -> Platform {
        if has_drive_prefix(path) {
            return Platform::Windows;
        }
        match self {
            Platform::Posix => Platform::Posix,
            // UNC paths have no drive prefix
            Platform::Windows if path.contains(WINDOWS_SEPARATOR) => Platform::Windows,
            Platform::Windows => Platform::Posix,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Windows accepts both separators; POSIX only the forward slash.
fn is_separator(style: Platform, ch: char) -> bool {
    match style {
        Platform::Posix => ch == POSIX_SEPARATOR,
        Platform::Windows => ch == POSIX_SEPARATOR || ch == WINDOWS_SEPARATOR,
    }
}

/// `C:`, `C:\`, `C:/` or `/`.
pub fn is_drive_root(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    if !has_drive_prefix(path) {
        return false;
    }
    let rest = &path[2..];
    rest.is_empty() || (rest.len() == 1 && rest.chars().all(|ch| is_separator(Platform::Windows, ch)))
}

/// Restores the trailing separator on a bare drive (`C:` becomes `C:\`).
pub fn normalize_drive_root(path: &str) -> String {
    if has_drive_prefix(path) && path.len() == 2 {
        format!("{path}{WINDOWS_SEPARATOR}")
    } else {
        path.to_string()
    }
}

/// Parent directory of `path`.
///
/// Returns `path` unchanged for `/`, and the empty string (the virtual root)
/// for a Windows drive root or a path with no separator at all.
pub fn parent_of(path: &str, platform: Platform) -> String {
    if path.is_empty() {
        return String::new();
    }

    let style = platform.style_of(path);
    let sep = move |ch: char| is_separator(style, ch);

    if style == Platform::Windows {
        if is_drive_root(path) {
            return String::new();
        }
        let trimmed = path.trim_end_matches(sep);
        return match trimmed.rfind(sep) {
            Some(idx) => {
                let head = &trimmed[..idx];
                if head.len() == 2 && has_drive_prefix(head) {
                    format!("{head}{WINDOWS_SEPARATOR}")
                } else if head.is_empty() {
                    String::new()
                } else {
                    head.trim_end_matches(sep).to_string()
                }
            }
            None => String::new(),
        };
    }

    if path == "/" {
        return path.to_string();
    }
    let trimmed = path.trim_end_matches(sep);
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind(sep) {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].trim_end_matches(sep).to_string(),
        None => String::new(),
    }
}

/// Appends `name` to `base` with the separator of `base`'s flavour.
pub fn join(base: &str, name: &str, platform: Platform) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    let style = platform.style_of(base);
    if base.ends_with(|ch: char| is_separator(style, ch)) {
        format!("{base}{name}")
    } else {
        format!("{base}{}{name}", style.separator())
    }
}

/// Last separator-delimited segment, or the whole string for a root.
pub fn file_name(path: &str, platform: Platform) -> &str {
    let style = platform.style_of(path);
    let sep = move |ch: char| is_separator(style, ch);
    let trimmed = path.trim_end_matches(sep);
    if trimmed.is_empty() {
        return path;
    }
    match trimmed.rfind(sep) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
