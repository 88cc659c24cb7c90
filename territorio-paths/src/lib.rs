//! XDG Base Directory paths for territorio.
//!
//! Persisted session tokens live in the XDG data directory on every
//! platform, the same way tools like gh and kubectl keep their state.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "territorio";

/// Get the territorio data directory.
///
/// Returns `$XDG_DATA_HOME/territorio` if set, otherwise
/// `~/.local/share/territorio`.
///
/// # Examples
///
/// ```
/// use territorio_paths::data_dir;
///
/// let sessions = data_dir().join("sessions");
/// ```
pub fn data_dir() -> PathBuf {
    resolve(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        dirs::home_dir(),
        ".local/share",
    )
}

/// Directory holding one persisted bearer token per API origin.
pub fn sessions_dir() -> PathBuf {
    sessions_dir_in(&data_dir())
}

/// Sessions directory under an explicit data directory.
pub fn sessions_dir_in(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

fn resolve(xdg: Option<PathBuf>, home: Option<PathBuf>, home_relative: &str) -> PathBuf {
    match (xdg, home) {
        (Some(xdg), _) if !xdg.as_os_str().is_empty() => xdg.join(APP_DIR),
        (_, Some(home)) => home.join(home_relative).join(APP_DIR),
        _ => PathBuf::from(home_relative).join(APP_DIR),
    }
}
