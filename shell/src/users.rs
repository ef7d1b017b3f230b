use std::path::PathBuf;

#[cfg(unix)]
use uzers::os::unix::UserExt;

/// Resolve the home directory of the named user through the password file.
#[cfg(unix)]
pub(crate) fn home_dir_for_user(name: &str) -> Option<PathBuf> {
    uzers::get_user_by_name(name).map(|user| user.home_dir().to_path_buf())
}

#[cfg(not(unix))]
pub(crate) fn home_dir_for_user(_name: &str) -> Option<PathBuf> {
    None
}
