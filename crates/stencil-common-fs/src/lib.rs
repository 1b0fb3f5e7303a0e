//! File system utilities for Stencil.

pub mod path;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

/// Mode used for every directory created on behalf of a generation run.
///
/// The process umask still applies on top of it.
pub const DIR_MODE: u32 = 0o777;

/// Stable identifier for the kind of filesystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(&'static str);

impl ErrorCode {
    pub const FILE_NOT_FOUND: Self = Self("FILE_NOT_FOUND");
    pub const FILE_READ_ERROR: Self = Self("FILE_READ_ERROR");
    pub const FILE_WRITE_ERROR: Self = Self("FILE_WRITE_ERROR");
    pub const DIR_CREATE_ERROR: Self = Self("DIR_CREATE_ERROR");
    pub const DIR_REMOVE_ERROR: Self = Self("DIR_REMOVE_ERROR");

    /// The code as a string.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Filesystem errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    FileSystem {
        code: ErrorCode,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<io::Error>,
    },
}

impl Error {
    /// The error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::FileSystem { code, .. } => *code,
        }
    }

    /// The path the failure relates to, if known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::FileSystem { path, .. } => path.as_deref(),
        }
    }
}

/// Result type for filesystem operations.
pub type Result<T> = std::result::Result<T, Error>;

fn io_error(code: ErrorCode, message: String, path: &Path, source: io::Error) -> Error {
    Error::FileSystem {
        code,
        message,
        path: Some(path.to_path_buf()),
        source: Some(source),
    }
}

/// Read a file to string with size limit.
pub fn read_to_string(path: impl AsRef<Path>, max_size: usize) -> Result<String> {
    let path = path.as_ref();

    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => io_error(
            ErrorCode::FILE_NOT_FOUND,
            format!("file not found: {}", path.display()),
            path,
            e,
        ),
        io::ErrorKind::PermissionDenied => io_error(
            ErrorCode::FILE_READ_ERROR,
            format!("permission denied: {}", path.display()),
            path,
            e,
        ),
        _ => io_error(
            ErrorCode::FILE_READ_ERROR,
            format!("failed to read metadata: {}", path.display()),
            path,
            e,
        ),
    })?;

    if metadata.len() > max_size as u64 {
        return Err(Error::FileSystem {
            code: ErrorCode::FILE_READ_ERROR,
            message: format!("file too large: {} bytes (max: {})", metadata.len(), max_size),
            path: Some(path.to_path_buf()),
            source: None,
        });
    }

    fs::read_to_string(path).map_err(|e| {
        io_error(
            ErrorCode::FILE_READ_ERROR,
            format!("failed to read file: {}", path.display()),
            path,
            e,
        )
    })
}

/// Ensure a directory and all of its parents exist, created with [`DIR_MODE`].
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    builder.create(path).map_err(|e| {
        io_error(
            ErrorCode::DIR_CREATE_ERROR,
            format!("failed to create directory: {}", path.display()),
            path,
            e,
        )
    })
}

/// Write to a file atomically (write to a sibling temp file, then rename).
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = TempFile::new_in(parent)?;
    temp.write(contents)?;
    temp.persist(path)
}

/// Write string to file atomically.
pub fn write_string_atomic(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    write_atomic(path, contents.as_bytes())
}

/// Recursively remove a directory.
///
/// Returns `Ok(false)` when there was nothing to remove, so repeated calls
/// and races with other cleanups are harmless.
pub fn remove_dir_all_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error(
            ErrorCode::DIR_REMOVE_ERROR,
            format!("failed to remove directory: {}", path.display()),
            path,
            e,
        )),
    }
}

/// Resolve a path to its absolute, symlink-free form. The path must exist.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    fs::canonicalize(path).map_err(|e| {
        let code = if e.kind() == io::ErrorKind::NotFound {
            ErrorCode::FILE_NOT_FOUND
        } else {
            ErrorCode::FILE_READ_ERROR
        };
        io_error(code, format!("failed to resolve path: {}", path.display()), path, e)
    })
}

/// Check if a path exists and is a file.
pub fn is_file(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Recursively list regular files under `dir`, sorted by path.
///
/// A missing directory yields an empty list.
pub fn walk_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::FileSystem {
            code: ErrorCode::FILE_READ_ERROR,
            message: format!("failed to read directory entry under: {}", dir.display()),
            path: e.path().map(Path::to_path_buf),
            source: e.into_io_error(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A temporary file that is removed on drop unless persisted.
pub struct TempFile {
    path: PathBuf,
    file: Option<File>,
}

impl TempFile {
    /// Create a new temporary file in the system temp directory.
    pub fn new() -> Result<Self> {
        Self::new_in(std::env::temp_dir())
    }

    /// Create a new temporary file in the specified directory.
    pub fn new_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        ensure_dir(dir)?;

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!(".stencil-{}-{}-{}.tmp", std::process::id(), nanos, seq));

        let file = File::create(&path).map_err(|e| {
            io_error(
                ErrorCode::FILE_WRITE_ERROR,
                format!("failed to create temporary file: {}", path.display()),
                &path,
                e,
            )
        })?;

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Get the path of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write data to the temporary file.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| Error::FileSystem {
            code: ErrorCode::FILE_WRITE_ERROR,
            message: "temporary file has been consumed".to_string(),
            path: Some(path.clone()),
            source: None,
        })?;

        file.write_all(data).map_err(|e| {
            io_error(
                ErrorCode::FILE_WRITE_ERROR,
                format!("failed to write to temporary file: {}", path.display()),
                path,
                e,
            )
        })
    }

    /// Consume the temporary file and move it to `target`.
    ///
    /// Falls back to copy + remove when the rename crosses filesystems.
    pub fn persist(mut self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        if let Some(file) = self.file.take() {
            file.sync_all().map_err(|e| {
                io_error(
                    ErrorCode::FILE_WRITE_ERROR,
                    format!("failed to sync temporary file: {}", self.path.display()),
                    &self.path,
                    e,
                )
            })?;
        }

        if let Err(rename_err) = fs::rename(&self.path, target) {
            debug!(
                from = %self.path.display(),
                to = %target.display(),
                error = %rename_err,
                "rename failed, copying instead"
            );
            fs::copy(&self.path, target).map_err(|e| {
                io_error(
                    ErrorCode::FILE_WRITE_ERROR,
                    format!("failed to persist temporary file to: {}", target.display()),
                    target,
                    e,
                )
            })?;
            // Drop removes the source copy.
            return Ok(());
        }

        // Already moved, nothing left for drop to clean.
        std::mem::forget(self);
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        self.file.take();
        let _ = fs::remove_file(&self.path);
    }
}
