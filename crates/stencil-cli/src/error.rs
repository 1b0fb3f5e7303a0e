//! CLI error handling and formatting.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::io;
use std::process::ExitCode;

use stencil_common_config::{ConfigError, EnvError};
use thiserror::Error;

use crate::Exit;

/// CLI error type with rich context
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
        hint: Option<String>,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Generation(#[from] stencil_core::Error),

    #[error("{message}")]
    Validation { message: String, failures: Vec<String> },

    #[error("{message}")]
    NotFound {
        message: String,
        resource_type: String,
        resource_name: String,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    User { message: String, hint: Option<String> },
}

impl CliError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E001",
            Self::Io { .. } => "E002",
            Self::Generation(e) if is_filesystem(e) => "E002",
            Self::Generation(_) => "E003",
            Self::Validation { .. } => "E004",
            Self::NotFound { .. } => "E005",
            Self::User { .. } => "E010",
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        self.exit().into()
    }

    fn exit(&self) -> Exit {
        match self {
            Self::Config { .. } => Exit::ConfigError,
            Self::Io { .. } => Exit::IoError,
            Self::Generation(e) if is_filesystem(e) => Exit::IoError,
            Self::Generation(_) => Exit::GenerationError,
            Self::Validation { .. } => Exit::ValidationError,
            Self::NotFound { .. } => Exit::NotFound,
            Self::User { .. } => Exit::GeneralError,
        }
    }

    /// Get hint for this error if available
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { hint, .. } | Self::User { hint, .. } => hint.as_deref(),
            Self::Generation(e) => match e.root() {
                stencil_core::Error::UndefinedVariable { .. } => {
                    Some("declare the variable under `generator.variables` or the builder's `variables`")
                }
                stencil_core::Error::TemplateNotFound { .. } => {
                    Some("check `template_dirs` and the builder's `template` entry")
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Get suggestions for this error
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::NotFound { suggestions, .. } => suggestions,
            Self::Validation { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a not found error
    pub fn not_found(
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_name = resource_name.into();
        Self::NotFound {
            message: format!("{resource_type} '{resource_name}' not found"),
            resource_type,
            resource_name,
            suggestions,
        }
    }

    /// Create a user error with hint
    pub fn user_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

fn is_filesystem(e: &stencil_core::Error) -> bool {
    matches!(e.root(), stencil_core::Error::FileSystem(_))
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        let hint = match &e {
            ConfigError::NotFound { .. } => {
                Some("create a stencil.yaml or pass --manifest (or set STENCIL_MANIFEST)".to_string())
            }
            ConfigError::EnvVarNotFound { var } => {
                Some(format!("export {var} or give it a default with ${{{var}:-value}}"))
            }
            _ => None,
        };
        Self::Config {
            message: e.to_string(),
            source: Some(Box::new(e)),
            hint,
        }
    }
}

impl From<EnvError> for CliError {
    fn from(e: EnvError) -> Self {
        Self::Config {
            message: e.to_string(),
            source: Some(Box::new(e)),
            hint: None,
        }
    }
}

/// Render an error the way it is printed on stderr.
///
/// The source chain is only listed in verbose mode.
pub fn format(error: &CliError, verbose: bool) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "error[{}]: {error}", error.code());

    if verbose {
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = writeln!(output, "  caused by: {cause}");
            source = cause.source();
        }
    }

    if let Some(hint) = error.hint() {
        let _ = writeln!(output, "hint: {hint}");
    }

    let suggestions = error.suggestions();
    if !suggestions.is_empty() {
        for suggestion in suggestions {
            let _ = writeln!(output, "  - {suggestion}");
        }
    }

    output
}

pub fn report(error: &CliError, verbose: bool) {
    tracing::debug!(code = error.code(), "command failed");
    eprint!("{}", format(error, verbose));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(CliError::from(ConfigError::ValidationError { message: "x".into() }).code(), "E001");
        assert_eq!(CliError::not_found("builder", "Foo", vec![]).code(), "E005");
        assert_eq!(CliError::user_with_hint("x", "y").code(), "E010");
    }

    #[test]
    fn test_missing_manifest_is_config_error_with_hint() {
        let err = CliError::from(ConfigError::NotFound {
            path: PathBuf::from("stencil.yaml"),
        });
        assert_eq!(err.code(), "E001");
        assert!(err.hint().unwrap().contains("--manifest"));
        assert!(format(&err, false).starts_with("error[E001]: manifest not found"));
    }

    #[test]
    fn test_format_lists_suggestions() {
        let err = CliError::not_found(
            "builder",
            "Modle",
            vec!["ModelBuilder".to_string(), "RepositoryBuilder".to_string()],
        );
        let text = format(&err, false);
        assert!(text.contains("builder 'Modle' not found"));
        assert!(text.contains("  - ModelBuilder\n"));
        assert!(text.contains("  - RepositoryBuilder\n"));
    }

    #[test]
    fn test_verbose_format_shows_causes() {
        let err = CliError::io("cannot print", io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert!(!format(&err, false).contains("caused by"));
        assert!(format(&err, true).contains("caused by: pipe closed"));
    }

    #[test]
    fn test_filesystem_failures_exit_as_io() {
        let fs_error = stencil_common_fs::read_to_string("/nonexistent/stencil/Model.hbs", 16).unwrap_err();
        let err = CliError::from(stencil_core::Error::Builder {
            builder: "ModelBuilder".to_string(),
            source: Box::new(stencil_core::Error::FileSystem(fs_error)),
        });
        assert_eq!(err.code(), "E002");
        assert_eq!(err.exit(), Exit::IoError);

        let err = CliError::from(stencil_core::Error::MissingOutputName {
            builder: "ModelBuilder".to_string(),
        });
        assert_eq!(err.exit(), Exit::GenerationError);
    }

    #[test]
    fn test_generation_error_hint_follows_root_cause() {
        let err = CliError::from(stencil_core::Error::Builder {
            builder: "ModelBuilder".to_string(),
            source: Box::new(stencil_core::Error::UndefinedVariable {
                template: "Model.hbs".to_string(),
                message: "missing".to_string(),
            }),
        });
        assert_eq!(err.code(), "E003");
        assert!(err.hint().unwrap().contains("variables"));
    }
}
