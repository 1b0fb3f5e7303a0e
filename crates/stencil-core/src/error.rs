//! Error types for template resolution, rendering and generation.

use std::path::PathBuf;

use handlebars::RenderErrorReason;

/// Errors raised by builders and the generator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("template '{name}' not found in: {}", display_dirs(.searched))]
    TemplateNotFound { name: String, searched: Vec<PathBuf> },

    #[error("invalid template name '{name}': must be a relative path without '..'")]
    InvalidTemplateName { name: String },

    #[error("undefined variable in template '{template}': {message}")]
    UndefinedVariable { template: String, message: String },

    #[error("syntax error in template '{template}': {source}")]
    TemplateSyntax {
        template: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("failed to render template '{template}': {source}")]
    Render {
        template: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    #[error("builder '{builder}' has no output name")]
    MissingOutputName { builder: String },

    #[error(transparent)]
    FileSystem(#[from] stencil_common_fs::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("builder '{builder}' failed: {source}")]
    Builder {
        builder: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            Self::InvalidTemplateName { .. } => "INVALID_TEMPLATE_NAME",
            Self::UndefinedVariable { .. } => "UNDEFINED_VARIABLE",
            Self::TemplateSyntax { .. } => "TEMPLATE_SYNTAX",
            Self::Render { .. } => "RENDER_ERROR",
            Self::UnknownFilter(_) => "UNKNOWN_FILTER",
            Self::UnknownExtension(_) => "UNKNOWN_EXTENSION",
            Self::MissingOutputName { .. } => "MISSING_OUTPUT_NAME",
            Self::FileSystem(e) => e.code().as_str(),
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Builder { source, .. } => source.code(),
        }
    }

    /// The innermost error, looking through [`Error::Builder`] wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Builder { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn syntax(template: &str, source: handlebars::TemplateError) -> Self {
        Self::TemplateSyntax {
            template: template.to_string(),
            source: Box::new(source),
        }
    }

    /// Classify an engine render failure.
    pub(crate) fn from_render(template: &str, source: handlebars::RenderError) -> Self {
        match source.reason() {
            RenderErrorReason::MissingVariable(_) => Self::UndefinedVariable {
                template: template.to_string(),
                message: source.to_string(),
            },
            _ => Self::Render {
                template: template.to_string(),
                source: Box::new(source),
            },
        }
    }
}

fn display_dirs(dirs: &[PathBuf]) -> String {
    if dirs.is_empty() {
        return "(no template directories)".to_string();
    }
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_searched_dirs() {
        let err = Error::TemplateNotFound {
            name: "Model.hbs".to_string(),
            searched: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        assert_eq!(err.to_string(), "template 'Model.hbs' not found in: /a, /b");
        assert_eq!(err.code(), "TEMPLATE_NOT_FOUND");

        let err = Error::TemplateNotFound {
            name: "Model.hbs".to_string(),
            searched: vec![],
        };
        assert!(err.to_string().contains("no template directories"));
    }

    #[test]
    fn test_builder_wrapper_keeps_inner_code() {
        let err = Error::Builder {
            builder: "ModelBuilder".to_string(),
            source: Box::new(Error::MissingOutputName {
                builder: "ModelBuilder".to_string(),
            }),
        };
        assert_eq!(err.code(), "MISSING_OUTPUT_NAME");
        assert!(matches!(err.root(), Error::MissingOutputName { .. }));
        assert!(err.to_string().starts_with("builder 'ModelBuilder' failed"));
    }
}
