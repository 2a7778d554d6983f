use std::time::SystemTime;

use chrono::Local;

use crate::fs::DirectoryEntry;

const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn format_system_time(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => {
            let datetime: chrono::DateTime<Local> = time.into();
            datetime.format("%Y-%m-%d %H:%M").to_string()
        }
        None => "-".to_string(),
    }
}

/// Size column text: drives and directories have none, unreadable files show `?`.
pub fn format_entry_size(entry: &DirectoryEntry) -> String {
    if entry.is_drive {
        "<DRIVE>".to_string()
    } else if entry.is_directory {
        "<DIR>".to_string()
    } else {
        entry.size.map(format_size).unwrap_or_else(|| "?".to_string())
    }
}
