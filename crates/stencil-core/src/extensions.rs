//! Pluggable additions to the template environment.

use std::fmt;
use std::sync::Arc;

use handlebars::Handlebars;
use indexmap::IndexMap;
use stencil_common_fs as fs;
use tracing::trace;

use crate::error::{Error, Result};
use crate::loader::{TemplateLoader, MAX_TEMPLATE_SIZE};

/// Something that installs helpers, partials or settings into a template
/// environment before a builder renders.
pub trait Extension: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Install into `hb`. `loader` is the rendering builder's loader.
    fn register(&self, hb: &mut Handlebars<'_>, loader: &TemplateLoader) -> Result<()>;
}

/// Names of the extensions that can be enabled by name.
pub const BUILTIN_EXTENSIONS: &[&str] = &["partials"];

/// Look up a built-in extension by name.
pub fn builtin(name: &str) -> Option<Arc<dyn Extension>> {
    match name {
        "partials" => Some(Arc::new(PartialsExtension)),
        _ => None,
    }
}

/// Registers every template under the search directories as a partial,
/// so templates can include each other with `{{> macros/header}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialsExtension;

impl Extension for PartialsExtension {
    fn name(&self) -> &str {
        "partials"
    }

    fn register(&self, hb: &mut Handlebars<'_>, loader: &TemplateLoader) -> Result<()> {
        for (name, path) in loader.templates()? {
            let source = fs::read_to_string(&path, MAX_TEMPLATE_SIZE)?;
            hb.register_partial(&name, source)
                .map_err(|e| Error::syntax(&name, e))?;
            trace!(partial = %name, path = %path.display(), "registered partial");
        }
        Ok(())
    }
}

/// Extensions applied to a builder's environment, in insertion order.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: IndexMap<String, Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an extension under its own name.
    pub fn add(&mut self, extension: Arc<dyn Extension>) {
        self.extensions
            .insert(extension.name().to_string(), extension);
    }

    /// Enable a built-in extension by name.
    pub fn enable(&mut self, name: &str) -> Result<()> {
        let extension = builtin(name).ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        self.add(extension);
        Ok(())
    }

    /// Remove an extension.
    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn Extension>> {
        self.extensions
            .shift_remove(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Extension>> {
        self.extensions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Add the entries of `defaults` this registry does not define itself.
    pub fn merge_defaults(&mut self, defaults: &ExtensionRegistry) {
        for (name, extension) in &defaults.extensions {
            self.extensions
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(extension));
        }
    }

    /// Run every extension against `hb`.
    pub fn install(&self, hb: &mut Handlebars<'_>, loader: &TemplateLoader) -> Result<()> {
        for extension in self.extensions.values() {
            extension.register(hb, loader)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
