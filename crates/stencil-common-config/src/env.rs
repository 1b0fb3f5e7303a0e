//! Environment variable handling.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    /// Manifest path used when none is passed on the command line.
    pub const STENCIL_MANIFEST: &str = "STENCIL_MANIFEST";
    /// Selects an extra `.env.<name>` file.
    pub const STENCIL_ENV: &str = "STENCIL_ENV";
}

/// Load `.env` files from the current directory.
///
/// Variables already set in the process are never replaced. Among the files,
/// `.env.<STENCIL_ENV>` beats `.env.local`, which beats `.env`. Missing files
/// are skipped; malformed ones are an error. Returns the files that were read.
pub fn load_dotenv() -> Result<Vec<PathBuf>, EnvError> {
    let mut files = Vec::new();
    if let Ok(name) = env::var(vars::STENCIL_ENV) {
        files.push(format!(".env.{name}"));
    }
    files.push(".env.local".to_string());
    files.push(".env".to_string());

    let mut loaded = Vec::new();
    for file in files {
        match dotenvy::from_filename(&file) {
            Ok(path) => loaded.push(path),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(loaded)
}
