//! Aggregates builders, stamps them with shared defaults and writes them out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use stencil_common_fs as fs;
use tracing::{debug, info, warn};

use crate::builder::{Builder, Variables, WriteOutcome};
use crate::error::{Error, Result};
use crate::extensions::{Extension, ExtensionRegistry};
use crate::filters::{FilterFn, FilterRegistry};
use crate::loader::push_unique;

/// Name of the scratch directory created under the scratch root.
pub const SCRATCH_DIR_NAME: &str = "stencil";

/// Per-session working directory.
///
/// Removed when the last owner drops it, if auto-clean is on. Removal is
/// best effort and tolerates the directory being gone already.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    auto_clean: AtomicBool,
}

impl ScratchDir {
    fn create(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)?;
        let path = root.join(SCRATCH_DIR_NAME);
        fs::ensure_dir(&path)?;
        debug!(path = %path.display(), "scratch directory ready");

        Ok(Self {
            path,
            auto_clean: AtomicBool::new(true),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn auto_clean(&self) -> bool {
        self.auto_clean.load(Ordering::Relaxed)
    }

    fn set_auto_clean(&self, enabled: bool) {
        self.auto_clean.store(enabled, Ordering::Relaxed);
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.auto_clean() {
            return;
        }
        match fs::remove_dir_all_if_exists(&self.path) {
            Ok(true) => debug!(path = %self.path.display(), "removed scratch directory"),
            Ok(false) => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove scratch directory"
            ),
        }
    }
}

/// Drives a generation session.
///
/// Defaults set on the generator are copied into each builder when it is
/// registered; changing them later does not affect builders already added.
#[derive(Debug)]
pub struct Generator {
    scratch: Arc<ScratchDir>,
    builders: IndexMap<String, Builder>,
    template_dirs: Vec<PathBuf>,
    overwrite_if_exists: bool,
    variables: Variables,
    filters: FilterRegistry,
    extensions: ExtensionRegistry,
}

impl Generator {
    /// Create a generator whose scratch directory lives in the system temp dir.
    pub fn new() -> Result<Self> {
        Self::with_scratch_root(std::env::temp_dir())
    }

    /// Create a generator whose scratch directory is `<root>/stencil`.
    ///
    /// `root` must exist. Generators sharing a root share the scratch
    /// directory, so concurrent sessions need distinct roots.
    pub fn with_scratch_root(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            scratch: Arc::new(ScratchDir::create(root.as_ref())?),
            builders: IndexMap::new(),
            template_dirs: Vec::new(),
            overwrite_if_exists: false,
            variables: Variables::new(),
            filters: FilterRegistry::new(),
            extensions: ExtensionRegistry::new(),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Remove the scratch directory when the generator is dropped.
    pub fn set_auto_remove_scratch_dir(&mut self, enabled: bool) -> &mut Self {
        self.scratch.set_auto_clean(enabled);
        self
    }

    pub fn auto_remove_scratch_dir(&self) -> bool {
        self.scratch.auto_clean()
    }

    // ===== Defaults =====

    pub fn set_template_dirs<I, P>(&mut self, dirs: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.template_dirs.clear();
        for dir in dirs {
            push_unique(&mut self.template_dirs, dir.into());
        }
        self
    }

    pub fn add_template_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        push_unique(&mut self.template_dirs, dir.into());
        self
    }

    pub fn template_dirs(&self) -> &[PathBuf] {
        &self.template_dirs
    }

    pub fn set_overwrite_if_exists(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite_if_exists = overwrite;
        self
    }

    pub fn overwrite_if_exists(&self) -> bool {
        self.overwrite_if_exists
    }

    /// Replace the shared variables.
    pub fn set_variables(&mut self, variables: Variables) -> &mut Self {
        self.variables = variables;
        self
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Add a filter every registered builder receives unless it defines its own.
    pub fn register_filter(&mut self, name: impl Into<String>, filter: FilterFn) -> &mut Self {
        self.filters.register(name, filter);
        self
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Add an extension every registered builder receives unless it defines its own.
    pub fn add_extension(&mut self, extension: Arc<dyn Extension>) -> &mut Self {
        self.extensions.add(extension);
        self
    }

    /// Enable a built-in extension by name for every registered builder.
    pub fn enable_extension(&mut self, name: &str) -> Result<&mut Self> {
        self.extensions.enable(name)?;
        Ok(self)
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    // ===== Builders =====

    /// Register a builder under its short type name.
    ///
    /// The builder receives the current search directories and overwrite
    /// policy (unless sealed) and the shared variables, filters and
    /// extensions; its own entries win on conflict. A builder registered
    /// under an existing name replaces the old one in place.
    pub fn add_builder(&mut self, mut builder: Builder) -> &mut Builder {
        builder.attach(&self.scratch);
        builder.set_template_dirs(self.template_dirs.iter().cloned());
        builder.set_overwrite_if_exists(self.overwrite_if_exists);

        let mut variables = self.variables.clone();
        for (key, value) in builder.variables() {
            variables.insert(key.clone(), value.clone());
        }
        builder.set_variables(variables);

        builder.filters_mut().merge_defaults(&self.filters);
        builder.extensions_mut().merge_defaults(&self.extensions);

        let name = builder.short_type_name().to_string();
        debug!(builder = %name, "registered builder");
        let (index, _) = self.builders.insert_full(name, builder);
        &mut self.builders[index]
    }

    /// Registered builders in registration order.
    pub fn builders(&self) -> &IndexMap<String, Builder> {
        &self.builders
    }

    pub fn builder(&self, name: &str) -> Option<&Builder> {
        self.builders.get(name)
    }

    pub fn builder_mut(&mut self, name: &str) -> Option<&mut Builder> {
        self.builders.get_mut(name)
    }

    /// Write every builder into `output_dir`, in registration order.
    ///
    /// Stops at the first failure; files written before it stay on disk.
    pub fn write_on_disk(&self, output_dir: impl AsRef<Path>) -> Result<Vec<WriteOutcome>> {
        let output_dir = output_dir.as_ref();
        let mut outcomes = Vec::with_capacity(self.builders.len());

        for (name, builder) in &self.builders {
            let outcome = builder
                .write_to_disk(output_dir)
                .map_err(|e| Error::Builder {
                    builder: name.clone(),
                    source: Box::new(e),
                })?;
            outcomes.push(outcome);
        }

        let written = outcomes.iter().filter(|o| o.is_written()).count();
        info!(
            output_dir = %output_dir.display(),
            written,
            skipped = outcomes.len() - written,
            "generation finished"
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_dir_created_and_removed() {
        let root = tempdir().unwrap();
        let generator = Generator::with_scratch_root(root.path()).unwrap();
        let scratch = generator.scratch_dir().to_path_buf();

        assert!(scratch.is_dir());
        assert!(scratch.ends_with(SCRATCH_DIR_NAME));
        assert!(generator.auto_remove_scratch_dir());

        drop(generator);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_scratch_dir_kept_when_auto_remove_off() {
        let root = tempdir().unwrap();
        let mut generator = Generator::with_scratch_root(root.path()).unwrap();
        generator.set_auto_remove_scratch_dir(false);
        let scratch = generator.scratch_dir().to_path_buf();

        drop(generator);
        assert!(scratch.is_dir());
    }

    #[test]
    fn test_cleanup_tolerates_missing_dir() {
        let root = tempdir().unwrap();
        let generator = Generator::with_scratch_root(root.path()).unwrap();
        std::fs::remove_dir_all(generator.scratch_dir()).unwrap();
        drop(generator);
    }

    #[test]
    fn test_missing_scratch_root_fails() {
        let root = tempdir().unwrap();
        let err = Generator::with_scratch_root(root.path().join("absent")).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_registration_attaches_and_detaches() {
        let root = tempdir().unwrap();
        let mut generator = Generator::with_scratch_root(root.path()).unwrap();
        generator.add_builder(Builder::named("app::Demo"));

        let detached = generator.builder("Demo").unwrap().clone();
        assert!(detached.is_attached());
        drop(generator);
        assert!(!detached.is_attached());
    }

    #[test]
    fn test_sealed_builder_keeps_its_settings() {
        let root = tempdir().unwrap();
        let mut generator = Generator::with_scratch_root(root.path()).unwrap();
        generator
            .set_template_dirs(["/shared"])
            .set_overwrite_if_exists(true)
            .set_variables(json!({"a": 1}).as_object().cloned().unwrap());

        let mut builder = Builder::named("Locked");
        builder
            .add_template_dir("/own")
            .seal(crate::Field::TemplateDirs)
            .seal(crate::Field::OverwriteIfExists)
            .seal(crate::Field::Variables);

        let builder = generator.add_builder(builder);
        assert_eq!(builder.template_dirs(), [PathBuf::from("/own")]);
        assert!(!builder.must_overwrite_if_exists());
        assert!(!builder.has_variable("a"));
    }

    #[test]
    fn test_generator_filters_and_extensions_merge() {
        fn shout(_: &[serde_json::Value]) -> std::result::Result<serde_json::Value, crate::FilterError> {
            Ok(json!("!"))
        }

        let root = tempdir().unwrap();
        let mut generator = Generator::with_scratch_root(root.path()).unwrap();
        generator.register_filter("shout", shout);
        generator.enable_extension("partials").unwrap();
        assert!(generator.enable_extension("nope").is_err());

        let builder = generator.add_builder(Builder::named("Demo"));
        assert!(builder.filters().contains("shout"));
        assert!(builder.filters().contains("ucfirst"));
        assert!(builder.extensions().contains("partials"));
    }

    #[test]
    fn test_replacing_builder_keeps_position() {
        let root = tempdir().unwrap();
        let mut generator = Generator::with_scratch_root(root.path()).unwrap();
        generator.add_builder(Builder::named("a::First"));
        generator.add_builder(Builder::named("a::Second"));
        generator
            .add_builder(Builder::named("b::First"))
            .set_variable("replaced", true);

        let names: Vec<_> = generator.builders().keys().cloned().collect();
        assert_eq!(names, ["First", "Second"]);
        assert_eq!(generator.builder("First").unwrap().type_name(), "b::First");
        assert!(generator.builder("First").unwrap().has_variable("replaced"));
        assert!(generator.builder_mut("Missing").is_none());
    }
}
