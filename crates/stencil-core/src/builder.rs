//! A single template-driven generation target.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use stencil_common_fs as fs;
use stencil_common_fs::path::strip_root;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::extensions::ExtensionRegistry;
use crate::filters::FilterRegistry;
use crate::generator::ScratchDir;
use crate::loader::{push_unique, TemplateLoader, TEMPLATE_EXTENSION};
use crate::strict;

/// Variables handed to a template.
pub type Variables = serde_json::Map<String, Value>;

/// Context key under which a builder exposes itself to its template.
pub const BUILDER_KEY: &str = "builder";

/// A kind of builder.
///
/// Implementors name the builder (its short type name becomes the default
/// template name and the generator's registry key) and may preconfigure it.
pub trait BuilderKind: Send + Sync + 'static {
    /// Fully qualified type name.
    fn type_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    /// Search directories a new builder starts with.
    fn default_template_dirs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Adjust a freshly created builder, e.g. set its output name.
    fn configure(&self, _builder: &mut Builder) {}
}

/// Configuration fields that can be sealed against further changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    TemplateDirs,
    TemplateName,
    OutputName,
    OverwriteIfExists,
    Variables,
}

impl Field {
    /// Every sealable field.
    pub const ALL: [Field; 5] = [
        Field::TemplateDirs,
        Field::TemplateName,
        Field::OutputName,
        Field::OverwriteIfExists,
        Field::Variables,
    ];

    /// Parse a snake_case field name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "template_dirs" => Some(Self::TemplateDirs),
            "template_name" => Some(Self::TemplateName),
            "output_name" => Some(Self::OutputName),
            "overwrite_if_exists" => Some(Self::OverwriteIfExists),
            "variables" => Some(Self::Variables),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateDirs => "template_dirs",
            Self::TemplateName => "template_name",
            Self::OutputName => "output_name",
            Self::OverwriteIfExists => "overwrite_if_exists",
            Self::Variables => "variables",
        }
    }
}

/// What [`Builder::write_to_disk`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was rendered and written.
    Written(PathBuf),
    /// The file already existed and overwriting is off.
    Skipped(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(p) | Self::Skipped(p) => p,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Return the last path segment of a type name, without generic arguments.
///
/// Both `::` and `\` separators are understood.
pub fn short_type_name(type_name: &str) -> &str {
    let base = match type_name.find('<') {
        Some(idx) => &type_name[..idx],
        None => type_name,
    };
    let base = base.rsplit("::").next().unwrap_or(base);
    base.rsplit('\\').next().unwrap_or(base)
}

/// One generation target: a template, where to find it, the variables to
/// render it with and where to write the result.
#[derive(Debug, Clone)]
pub struct Builder {
    type_name: Cow<'static, str>,
    default_template_dirs: Vec<PathBuf>,
    template_dirs: Vec<PathBuf>,
    template_name: String,
    output_name: Option<PathBuf>,
    overwrite_if_exists: bool,
    variables: Variables,
    filters: FilterRegistry,
    extensions: ExtensionRegistry,
    sealed: HashSet<Field>,
    scratch: Weak<ScratchDir>,
}

#[derive(Serialize)]
struct BuilderView<'a> {
    type_name: &'a str,
    short_type_name: &'a str,
    template_name: &'a str,
    output_name: Option<&'a Path>,
    template_dirs: &'a [PathBuf],
    overwrite_if_exists: bool,
}

impl Builder {
    /// Create a builder of the given kind.
    pub fn new<K: BuilderKind>(kind: K) -> Self {
        let mut builder = Self::named(kind.type_name());
        builder.default_template_dirs = kind.default_template_dirs();
        builder.template_dirs.clear();
        for dir in builder.default_template_dirs.clone() {
            push_unique(&mut builder.template_dirs, dir);
        }
        kind.configure(&mut builder);
        builder
    }

    /// Create a builder for a type known only by name.
    pub fn named(type_name: impl Into<Cow<'static, str>>) -> Self {
        let type_name = type_name.into();
        let template_name = format!("{}{}", short_type_name(&type_name), TEMPLATE_EXTENSION);
        Self {
            type_name,
            default_template_dirs: Vec::new(),
            template_dirs: Vec::new(),
            template_name,
            output_name: None,
            overwrite_if_exists: false,
            variables: Variables::new(),
            filters: FilterRegistry::with_builtins(),
            extensions: ExtensionRegistry::new(),
            sealed: HashSet::new(),
            scratch: Weak::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type name without its path, used as the generator's registry key.
    pub fn short_type_name(&self) -> &str {
        short_type_name(&self.type_name)
    }

    // ===== Sealing =====

    /// Lock `field`; later changes to it are ignored.
    pub fn seal(&mut self, field: Field) -> &mut Self {
        self.sealed.insert(field);
        self
    }

    pub fn unseal(&mut self, field: Field) -> &mut Self {
        self.sealed.remove(&field);
        self
    }

    pub fn is_sealed(&self, field: Field) -> bool {
        self.sealed.contains(&field)
    }

    fn guard(&self, field: Field) -> bool {
        if self.is_sealed(field) {
            debug!(
                builder = %self.short_type_name(),
                field = field.as_str(),
                "ignoring change to sealed field"
            );
            return false;
        }
        true
    }

    // ===== Template resolution =====

    /// Replace the search directories. Repeats are dropped.
    pub fn set_template_dirs<I, P>(&mut self, dirs: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if self.guard(Field::TemplateDirs) {
            self.template_dirs.clear();
            for dir in dirs {
                push_unique(&mut self.template_dirs, dir.into());
            }
        }
        self
    }

    /// Append a search directory unless it is already present.
    pub fn add_template_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        if self.guard(Field::TemplateDirs) {
            push_unique(&mut self.template_dirs, dir.into());
        }
        self
    }

    pub fn template_dirs(&self) -> &[PathBuf] {
        &self.template_dirs
    }

    /// Search directories supplied by the builder's kind.
    pub fn default_template_dirs(&self) -> &[PathBuf] {
        &self.default_template_dirs
    }

    pub fn set_template_name(&mut self, name: impl Into<String>) -> &mut Self {
        if self.guard(Field::TemplateName) {
            self.template_name = name.into();
        }
        self
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// `<ShortTypeName>.hbs`.
    pub fn default_template_name(&self) -> String {
        format!("{}{}", self.short_type_name(), TEMPLATE_EXTENSION)
    }

    /// Loader over this builder's search directories.
    pub fn loader(&self) -> TemplateLoader {
        TemplateLoader::new(self.template_dirs.iter().cloned())
    }

    // ===== Output =====

    pub fn set_output_name(&mut self, name: impl Into<PathBuf>) -> &mut Self {
        if self.guard(Field::OutputName) {
            self.output_name = Some(name.into());
        }
        self
    }

    pub fn output_name(&self) -> Option<&Path> {
        self.output_name.as_deref()
    }

    pub fn set_overwrite_if_exists(&mut self, overwrite: bool) -> &mut Self {
        if self.guard(Field::OverwriteIfExists) {
            self.overwrite_if_exists = overwrite;
        }
        self
    }

    pub fn must_overwrite_if_exists(&self) -> bool {
        self.overwrite_if_exists
    }

    // ===== Variables =====

    /// Replace every variable.
    pub fn set_variables(&mut self, variables: Variables) -> &mut Self {
        if self.guard(Field::Variables) {
            self.variables = variables;
        }
        self
    }

    /// Insert or replace one variable.
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if self.guard(Field::Variables) {
            self.variables.insert(key.into(), value.into());
        }
        self
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// The stored value, or `default` when `key` was never set.
    ///
    /// A stored `false`, `null` or empty string counts as set.
    pub fn variable_or(&self, key: &str, default: impl Into<Value>) -> Value {
        match self.variables.get(key) {
            Some(value) => value.clone(),
            None => default.into(),
        }
    }

    pub fn has_variable(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    // ===== Environment =====

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    // ===== Generator attachment =====

    pub(crate) fn attach(&mut self, scratch: &Arc<ScratchDir>) {
        self.scratch = Arc::downgrade(scratch);
    }

    /// Whether the builder belongs to a generator that is still alive.
    pub fn is_attached(&self) -> bool {
        self.scratch.strong_count() > 0
    }

    // ===== Rendering =====

    fn context(&self) -> Result<Value> {
        let view = BuilderView {
            type_name: &self.type_name,
            short_type_name: self.short_type_name(),
            template_name: &self.template_name,
            output_name: self.output_name.as_deref(),
            template_dirs: &self.template_dirs,
            overwrite_if_exists: self.overwrite_if_exists,
        };

        let mut context = self.variables.clone();
        context.insert(BUILDER_KEY.to_string(), serde_json::to_value(view)?);
        Ok(Value::Object(context))
    }

    /// Render the template with the builder's variables.
    ///
    /// Undefined variables are errors. The builder itself is visible to the
    /// template as `builder`.
    pub fn render(&self) -> Result<String> {
        let loader = self.loader();
        let source = loader.load(&self.template_name)?;

        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);
        hb.register_escape_fn(handlebars::no_escape);
        strict::install(&mut hb);
        self.filters.install(&mut hb);
        self.extensions.install(&mut hb, &loader)?;

        hb.register_template_string(&self.template_name, source)
            .map_err(|e| Error::syntax(&self.template_name, e))?;

        let context = self.context()?;
        hb.render(&self.template_name, &context)
            .map_err(|e| Error::from_render(&self.template_name, e))
    }

    /// Render into `output_dir`/`output_name`.
    ///
    /// An existing file is left untouched unless overwriting is on; the
    /// template is not rendered in that case.
    pub fn write_to_disk(&self, output_dir: impl AsRef<Path>) -> Result<WriteOutcome> {
        let output_name = self
            .output_name
            .as_deref()
            .ok_or_else(|| Error::MissingOutputName {
                builder: self.short_type_name().to_string(),
            })?;
        let path = output_dir.as_ref().join(strip_root(output_name));

        if let Some(parent) = path.parent() {
            fs::ensure_dir(parent)?;
        }

        if path.exists() && !self.overwrite_if_exists {
            debug!(
                builder = %self.short_type_name(),
                path = %path.display(),
                "file exists, skipping"
            );
            return Ok(WriteOutcome::Skipped(path));
        }

        let content = self.render()?;
        match self.scratch.upgrade() {
            Some(scratch) if scratch.path().is_dir() => {
                let mut staged = fs::TempFile::new_in(scratch.path())?;
                staged.write(content.as_bytes())?;
                staged.persist(&path)?;
            }
            _ => fs::write_string_atomic(&path, &content)?,
        }

        info!(
            builder = %self.short_type_name(),
            path = %path.display(),
            bytes = content.len(),
            "wrote generated file"
        );
        Ok(WriteOutcome::Written(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs as stdfs;
    use tempfile::tempdir;

    struct ModelBuilder;
    impl BuilderKind for ModelBuilder {}

    struct PresetBuilder;
    impl BuilderKind for PresetBuilder {
        fn type_name(&self) -> Cow<'static, str> {
            Cow::Borrowed("app::builders::PresetBuilder")
        }

        fn default_template_dirs(&self) -> Vec<PathBuf> {
            vec![PathBuf::from("/preset"), PathBuf::from("/preset")]
        }

        fn configure(&self, builder: &mut Builder) {
            builder.set_output_name("preset.txt").set_variable("kind", "preset");
        }
    }

    fn builder_with_template(source: &str) -> (tempfile::TempDir, Builder) {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Page.hbs"), source).unwrap();
        let mut builder = Builder::named("site::Page");
        builder.add_template_dir(dir.path());
        (dir, builder)
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::ModelBuilder"), "ModelBuilder");
        assert_eq!(short_type_name("ModelBuilder"), "ModelBuilder");
        assert_eq!(short_type_name("a::Wrapper<b::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Acme\\Builder\\ListBuilder"), "ListBuilder");
    }

    #[test]
    fn test_kind_defaults() {
        let builder = Builder::new(ModelBuilder);
        assert!(builder.type_name().ends_with("::ModelBuilder"));
        assert_eq!(builder.short_type_name(), "ModelBuilder");
        assert_eq!(builder.template_name(), "ModelBuilder.hbs");
        assert_eq!(builder.default_template_name(), "ModelBuilder.hbs");
        assert!(builder.template_dirs().is_empty());
        assert!(!builder.must_overwrite_if_exists());
        assert!(builder.output_name().is_none());
        assert!(!builder.is_attached());
        assert!(builder.extensions().is_empty());
        assert!(!builder.filters().is_empty());
    }

    #[test]
    fn test_kind_configure_and_default_dirs() {
        let builder = Builder::new(PresetBuilder);
        assert_eq!(builder.short_type_name(), "PresetBuilder");
        assert_eq!(builder.template_dirs(), [PathBuf::from("/preset")]);
        assert_eq!(builder.default_template_dirs().len(), 2);
        assert_eq!(builder.output_name(), Some(Path::new("preset.txt")));
        assert_eq!(builder.variable("kind"), Some(&json!("preset")));
    }

    #[test]
    fn test_variable_membership_not_truthiness() {
        let mut builder = Builder::named("Demo");
        builder.set_variable("flag", false).set_variable("empty", "");
        builder.set_variable("nothing", Value::Null);

        assert_eq!(builder.variable_or("flag", true), json!(false));
        assert_eq!(builder.variable_or("empty", "d"), json!(""));
        assert_eq!(builder.variable_or("nothing", "d"), Value::Null);
        assert_eq!(builder.variable_or("missing", "d"), json!("d"));
        assert!(builder.has_variable("nothing"));
        assert!(!builder.has_variable("missing"));
    }

    #[test]
    fn test_set_variables_replaces_everything() {
        let mut builder = Builder::named("Demo");
        builder.set_variable("old", 1);

        let mut fresh = Variables::new();
        fresh.insert("new".to_string(), json!(2));
        builder.set_variables(fresh);

        assert!(!builder.has_variable("old"));
        assert_eq!(builder.variable("new"), Some(&json!(2)));
    }

    #[test]
    fn test_sealed_fields_ignore_changes() {
        let mut builder = Builder::named("Demo");
        builder.set_output_name("a.txt").set_variable("k", "v");

        for field in Field::ALL {
            builder.seal(field);
            assert!(builder.is_sealed(field));
        }

        builder
            .set_template_dirs(["/x"])
            .add_template_dir("/y")
            .set_template_name("Other.hbs")
            .set_output_name("b.txt")
            .set_overwrite_if_exists(true)
            .set_variable("k", "changed")
            .set_variables(Variables::new());

        assert!(builder.template_dirs().is_empty());
        assert_eq!(builder.template_name(), "Demo.hbs");
        assert_eq!(builder.output_name(), Some(Path::new("a.txt")));
        assert!(!builder.must_overwrite_if_exists());
        assert_eq!(builder.variable("k"), Some(&json!("v")));

        builder.unseal(Field::OverwriteIfExists);
        builder.set_overwrite_if_exists(true);
        assert!(builder.must_overwrite_if_exists());
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::parse(field.as_str()), Some(field));
        }
        assert_eq!(Field::parse("colour"), None);
    }

    #[test]
    fn test_template_dirs_are_deduplicated() {
        let mut builder = Builder::named("Demo");
        builder.set_template_dirs(["/a", "/b", "/a"]).add_template_dir("/b");
        assert_eq!(builder.template_dirs(), [PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_render_exposes_builder() {
        let (_dir, mut builder) =
            builder_with_template("{{builder.short_type_name}} -> {{builder.output_name}}");
        builder.set_output_name("out/page.html");

        assert_eq!(builder.render().unwrap(), "Page -> out/page.html");
        assert!(!builder.has_variable(BUILDER_KEY));
    }

    #[test]
    fn test_render_does_not_escape() {
        let (_dir, mut builder) = builder_with_template("{{code}}");
        builder.set_variable("code", "<?php echo \"a & b\"; ?>");
        assert_eq!(builder.render().unwrap(), "<?php echo \"a & b\"; ?>");
    }

    #[test]
    fn test_render_undefined_variable_is_error() {
        let (_dir, builder) = builder_with_template("Hello {{ name }} !");
        match builder.render().unwrap_err() {
            Error::UndefinedVariable { template, .. } => assert_eq!(template, "Page.hbs"),
            other => panic!("Expected UndefinedVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_render_undefined_condition_is_error() {
        let (_dir, mut builder) = builder_with_template("{{#if missing}}yes{{else}}no{{/if}}");
        assert!(matches!(
            builder.render().unwrap_err(),
            Error::UndefinedVariable { .. }
        ));

        builder.set_variable("missing", false);
        assert_eq!(builder.render().unwrap(), "no");
    }

    #[test]
    fn test_render_syntax_error() {
        let (_dir, builder) = builder_with_template("{{#each items}}");
        assert!(matches!(
            builder.render().unwrap_err(),
            Error::TemplateSyntax { .. }
        ));
    }

    #[test]
    fn test_render_missing_template() {
        let builder = Builder::named("Nowhere");
        assert!(matches!(
            builder.render().unwrap_err(),
            Error::TemplateNotFound { .. }
        ));
    }

    #[test]
    fn test_render_with_removed_filter_fails() {
        let (_dir, mut builder) = builder_with_template("{{ucfirst name}}");
        builder.set_variable("name", "user");
        assert_eq!(builder.render().unwrap(), "User");

        builder.filters_mut().remove("ucfirst").unwrap();
        assert!(builder.render().is_err());
    }

    #[test]
    fn test_write_requires_output_name() {
        let (_dir, builder) = builder_with_template("x");
        let out = tempdir().unwrap();
        assert!(matches!(
            builder.write_to_disk(out.path()).unwrap_err(),
            Error::MissingOutputName { .. }
        ));
    }

    #[test]
    fn test_absolute_output_name_stays_under_output_dir() {
        let (_dir, mut builder) = builder_with_template("x");
        builder.set_output_name("/etc/generated.txt");

        let out = tempdir().unwrap();
        let outcome = builder.write_to_disk(out.path()).unwrap();
        assert_eq!(outcome, WriteOutcome::Written(out.path().join("etc/generated.txt")));
        assert!(outcome.path().starts_with(out.path()));
    }

    #[test]
    fn test_skip_does_not_render() {
        // A broken template proves the skip happens before rendering.
        let (_dir, mut builder) = builder_with_template("{{#if}}");
        builder.set_output_name("kept.txt");

        let out = tempdir().unwrap();
        stdfs::write(out.path().join("kept.txt"), "original").unwrap();

        let outcome = builder.write_to_disk(out.path()).unwrap();
        assert!(!outcome.is_written());
        assert_eq!(stdfs::read_to_string(out.path().join("kept.txt")).unwrap(), "original");
    }
}
