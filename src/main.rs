use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use env_logger::Env;
use explorer_core::controller::{BrowserController, BrowserEvent};
use explorer_core::util::{format_entry_size, format_system_time};
use explorer_core::{BrowserConfig, LocalFileSystem, SortDirection, SortField, SortSpec};
use pico_args::Arguments;
use shellexpand::full;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(""))
        .format_timestamp_secs()
        .try_init();

    let mut args = Arguments::from_env();

    let sort_field = match args.opt_value_from_fn("--sort", parse_sort_field) {
        Ok(value) => value,
        Err(err) => fail(err),
    };
    let watch_poll_secs = match args.opt_value_from_str::<_, u64>("--watch-poll") {
        Ok(value) => value,
        Err(err) => fail(err),
    };
    let descending = args.contains("--desc");
    let watch = args.contains("--watch");

    let path_arg: Option<String> = match args.opt_free_from_str() {
        Ok(value) => value,
        Err(err) => fail(err),
    };

    let leftover = args.finish();
    if !leftover.is_empty() {
        let extras: Vec<String> = leftover
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        fail(format!("unexpected arguments: {}", extras.join(" ")));
    }

    let mut config = BrowserConfig::default();
    config.watch_enabled = watch;
    if let Some(secs) = watch_poll_secs {
        config.watcher.notify_poll_interval = Duration::from_secs(secs.max(1));
    }

    let mut controller = match BrowserController::new(Arc::new(LocalFileSystem), config) {
        Ok(controller) => controller,
        Err(err) => fail(err),
    };

    if sort_field.is_some() || descending {
        let field = sort_field.unwrap_or(controller.sort_spec().field);
        let direction = if descending {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        controller.set_sort(SortSpec { field, direction });
    }

    if let Err(err) = open_initial(&mut controller, path_arg) {
        fail(err);
    }
    if !controller.wait_until_idle(LOAD_TIMEOUT) {
        fail("timed out waiting for the directory listing");
    }
    if let Some(error) = controller.last_error() {
        fail(error);
    }
    print_listing(&controller);

    if !watch {
        controller.close();
        return;
    }

    let events = controller.subscribe();
    loop {
        controller.poll();
        while let Ok(event) = events.try_recv() {
            match event {
                BrowserEvent::StateReplaced => print_listing(&controller),
                BrowserEvent::WatchDegraded(path) => {
                    eprintln!("explore: live updates unavailable for {path}");
                }
                BrowserEvent::AccessDenied { path, reason } => {
                    eprintln!("explore: access denied for {path}: {reason}");
                }
                BrowserEvent::Status(_) | BrowserEvent::SelectionChanged => {}
            }
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn open_initial(
    controller: &mut BrowserController,
    path_arg: Option<String>,
) -> Result<(), String> {
    let Some(raw_path) = path_arg else {
        let start = controller.start_location();
        return controller.navigate(&start).map_err(|err| err.to_string());
    };

    let expanded = full(raw_path.as_str()).map_err(|err| err.to_string())?;
    let path = PathBuf::from(expanded.as_ref());
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()));
    }
    let canonical = path
        .canonicalize()
        .map_err(|err| format!("failed to canonicalize {}: {err}", path.display()))?;
    let canonical_str = canonical.to_string_lossy().into_owned();

    let opened = if canonical.is_dir() {
        controller.navigate(&canonical_str)
    } else {
        controller.open_startup(&canonical_str)
    };
    opened.map_err(|err| err.to_string())
}

fn parse_sort_field(value: &str) -> Result<SortField, String> {
    match value.to_ascii_lowercase().as_str() {
        "name" => Ok(SortField::Name),
        "size" => Ok(SortField::Size),
        "modified" | "date" => Ok(SortField::Modified),
        other => Err(format!("unknown sort field {other:?} (name, size, modified)")),
    }
}

fn print_listing(controller: &BrowserController) {
    let current = controller.current_path();
    println!(
        "{}",
        if current.is_empty() { "[drives]" } else { current }
    );
    for entry in controller.entries() {
        let marker = if controller.selection().contains(&entry.path) {
            '*'
        } else {
            ' '
        };
        let name = if entry.is_directory && !entry.is_drive {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        println!(
            "{marker} {:<40} {:>12} {}",
            name,
            format_entry_size(entry),
            format_system_time(entry.modified)
        );
    }
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("explore: {err}");
    process::exit(1);
}
