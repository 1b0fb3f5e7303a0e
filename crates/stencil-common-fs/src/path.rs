//! Path manipulation utilities.

use std::path::{Component, Path, PathBuf};

/// Join a relative path onto `base`, refusing absolute paths and `..` segments.
pub fn safe_join(base: impl AsRef<Path>, path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || path.is_absolute() || path.has_root() {
        return None;
    }

    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return None;
    }

    Some(base.as_ref().join(path))
}

/// Drop any prefix and root so the path can be nested under another directory.
///
/// `/etc/app.conf` becomes `etc/app.conf`; relative paths are returned as-is.
pub fn strip_root(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref()
        .components()
        .filter(|c| !matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

/// Convert a path to a Unix-style string (forward slashes).
pub fn to_unix_string(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
