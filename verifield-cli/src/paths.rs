//! Platform-specific directory paths.
//!
//! Uses XDG on Linux, standard locations on macOS/Windows.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "verifield";
const APPLICATION: &str = "verifield";

/// Run logs kept in the log directory, the new run included.
const KEPT_RUN_LOGS: usize = 20;

const RUN_LOG_PREFIX: &str = "run-";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Get the cache directory, where logs go.
///
/// - Linux: `$XDG_CACHE_HOME/verifield` or `~/.cache/verifield`
/// - macOS: `~/Library/Caches/dev.verifield.verifield`
/// - Windows: `C:\Users\<User>\AppData\Local\verifield\verifield\cache`
pub fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Get the config directory.
///
/// - Linux: `$XDG_CONFIG_HOME/verifield` or `~/.config/verifield`
/// - macOS: `~/Library/Application Support/dev.verifield.verifield`
/// - Windows: `C:\Users\<User>\AppData\Roaming\verifield\verifield\config`
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the default form settings file.
pub fn settings_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("settings.json"))
}

/// Get the directory holding one log file per run.
pub fn log_dir() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("logs"))
}

/// Path for this run's log file, after making room for it.
///
/// Every invocation gets its own file, named by start time and process id,
/// so concurrent runs never write to the same log.
pub fn run_log_file() -> Option<PathBuf> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).ok()?;
    prune_run_logs(&dir, KEPT_RUN_LOGS.saturating_sub(1));

    let started = chrono::Local::now().format("%Y%m%dT%H%M%S");
    Some(dir.join(format!(
        "{}{}-{}.log",
        RUN_LOG_PREFIX,
        started,
        std::process::id()
    )))
}

/// Remove all but the `keep` newest run logs in `dir`.
///
/// Run log names start with their timestamp, so name order is age order.
/// Returns the number of files removed.
fn prune_run_logs(dir: &Path, keep: usize) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(RUN_LOG_PREFIX) && name.ends_with(".log"))
        })
        .collect();
    if logs.len() <= keep {
        return 0;
    }

    logs.sort();
    let stale = logs.len() - keep;
    logs.iter()
        .take(stale)
        .filter(|path| fs::remove_file(path).is_ok())
        .count()
}
