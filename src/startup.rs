use crate::path::{self, Platform};

/// Where to open the browser for an externally supplied file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupTarget {
    pub parent_dir: String,
    pub preselect: Vec<String>,
}

pub fn resolve(file_path: &str, platform: Platform) -> StartupTarget {
    let parent = path::parent_of(file_path, platform);
    let parent_dir = if parent.is_empty() && platform.style_of(file_path) == Platform::Posix {
        "/".to_string()
    } else {
        path::normalize_drive_root(&parent)
    };
    StartupTarget {
        parent_dir,
        preselect: vec![file_path.to_string()],
    }
}

/// The file the program was launched with ("Open with ..."), ignoring flags.
pub fn startup_path_from_args<I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .nth(1)
        .filter(|arg| !arg.is_empty() && !arg.starts_with("--"))
}
