//! Manifest loading and parsing.

use crate::types::{GenerationManifest, SEAL_FIELDS};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up when no manifest path is given.
pub const DEFAULT_MANIFEST: &str = "stencil.yaml";

const ENV_PATTERN: &str = r"\$\{([^}:]+)(?::-([^}]*))?\}";

/// Manifest loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("manifest not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read manifest: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error("invalid expansion pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Reads a manifest file, expands `${VAR}` references and resolves
/// relative directories against the manifest's own directory.
pub struct ManifestLoader {
    path: PathBuf,
}

impl ManifestLoader {
    /// Create a loader for the manifest at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Manifest path this loader reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative paths in the manifest are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Load, expand, parse, resolve and validate the manifest.
    pub fn load(&self) -> Result<GenerationManifest, ConfigError> {
        if !self.path.is_file() {
            return Err(ConfigError::NotFound {
                path: self.path.clone(),
            });
        }

        let contents = std::fs::read_to_string(&self.path)?;
        self.parse(&contents)
    }

    /// Parse manifest text as if it had been read from this loader's path.
    pub fn parse(&self, contents: &str) -> Result<GenerationManifest, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let mut manifest: GenerationManifest =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        self.resolve_paths(&mut manifest);
        validate(&manifest)?;
        Ok(manifest)
    }

    fn resolve_paths(&self, manifest: &mut GenerationManifest) {
        let base = self.base_dir();
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        let generator = &mut manifest.generator;
        generator.template_dirs.iter_mut().for_each(resolve);
        generator.scratch_root.iter_mut().for_each(resolve);
        generator.output_dir.iter_mut().for_each(resolve);

        for builder in &mut manifest.builders {
            builder.template_dirs.iter_mut().for_each(resolve);
        }
    }
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST)
    }
}

/// Expand `${VAR}` or `${VAR:-default}` using the process environment.
pub fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    expand_with(content, |var| std::env::var(var).ok())
}

/// Expand `${VAR}` or `${VAR:-default}` using an arbitrary lookup.
pub fn expand_with(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let re = regex::Regex::new(ENV_PATTERN)?;
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for cap in re.captures_iter(content) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match lookup(var_name) {
            Some(v) => v,
            None => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result.push_str(&content[last..full_match.start()]);
        result.push_str(&value);
        last = full_match.end();
    }

    result.push_str(&content[last..]);
    Ok(result)
}

/// Validate manifest values.
pub fn validate(manifest: &GenerationManifest) -> Result<(), ConfigError> {
    if manifest.builders.is_empty() {
        return Err(ConfigError::ValidationError {
            message: "builders must contain at least one entry".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for (index, builder) in manifest.builders.iter().enumerate() {
        if builder.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: format!("builders[{index}].name must not be empty"),
            });
        }

        if !seen.insert(builder.name.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!("builders[{index}].name '{}' is declared twice", builder.name),
            });
        }

        if builder.output.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: format!("builders[{index}].output must not be empty"),
            });
        }

        if let Some(field) = builder
            .sealed
            .iter()
            .find(|f| !SEAL_FIELDS.contains(&f.as_str()))
        {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "builders[{index}].sealed has unknown field '{field}' (expected one of: {})",
                    SEAL_FIELDS.join(", ")
                ),
            });
        }
    }

    Ok(())
}
