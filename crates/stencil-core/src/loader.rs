//! Filesystem template loader over an ordered set of search directories.

use std::collections::HashSet;
use std::path::PathBuf;

use stencil_common_fs as fs;
use stencil_common_fs::path::{safe_join, to_unix_string};

use crate::error::{Error, Result};

/// Extension of every template file.
pub const TEMPLATE_EXTENSION: &str = ".hbs";

/// Largest template file the loader will read.
pub const MAX_TEMPLATE_SIZE: usize = 4 * 1024 * 1024;

/// Resolves template names against search directories.
///
/// Directories keep insertion order and never repeat. When a name exists in
/// several directories, the first one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateLoader {
    dirs: Vec<PathBuf>,
}

impl TemplateLoader {
    /// Create a loader over `dirs`, dropping repeats.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut loader = Self::default();
        for dir in dirs {
            loader.add_dir(dir);
        }
        loader
    }

    /// Append a directory. Returns `false` when it was already present.
    pub fn add_dir(&mut self, dir: impl Into<PathBuf>) -> bool {
        push_unique(&mut self.dirs, dir.into())
    }

    /// Search directories in lookup order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Path of the file `name` resolves to.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let invalid = || Error::InvalidTemplateName {
            name: name.to_string(),
        };

        for dir in &self.dirs {
            let candidate = safe_join(dir, name).ok_or_else(invalid)?;
            if fs::is_file(&candidate) {
                return Ok(candidate);
            }
        }

        // Reject bad names even when there is nothing to search.
        if safe_join(".", name).is_none() {
            return Err(invalid());
        }

        Err(Error::TemplateNotFound {
            name: name.to_string(),
            searched: self.dirs.clone(),
        })
    }

    /// Read the source of template `name`.
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        Ok(fs::read_to_string(path, MAX_TEMPLATE_SIZE)?)
    }

    /// Every template under the search directories, keyed by its path
    /// relative to the directory it was found in, without the extension.
    ///
    /// `macros/header.hbs` becomes `macros/header`. Earlier directories
    /// shadow later ones.
    pub fn templates(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for dir in &self.dirs {
            for file in fs::walk_files(dir)? {
                let Ok(relative) = file.strip_prefix(dir) else {
                    continue;
                };
                let relative = to_unix_string(relative);
                let Some(name) = relative.strip_suffix(TEMPLATE_EXTENSION) else {
                    continue;
                };
                if seen.insert(name.to_string()) {
                    found.push((name.to_string(), file));
                }
            }
        }

        Ok(found)
    }
}

/// Push `item` unless an equal path is already present.
pub(crate) fn push_unique(dirs: &mut Vec<PathBuf>, item: PathBuf) -> bool {
    if dirs.contains(&item) {
        return false;
    }
    dirs.push(item);
    true
}
