//! Command implementations.

mod check;
mod generate;
mod render;

pub use check::CheckCommand;
pub use generate::GenerateCommand;
pub use render::RenderCommand;

use stencil_common_config::GenerationManifest;
use stencil_core::{Builder, Field, Generator};
use tracing::{debug, warn};

use crate::error::CliError;

/// Overrides a command applies on top of the manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Overwrite existing files whatever the manifest says.
    pub force: bool,
    /// Leave the scratch directory behind.
    pub keep_scratch: bool,
}

/// Build a generator holding every builder declared in `manifest`.
///
/// Generator defaults are applied first so registration stamps them onto
/// each builder. A builder's own overwrite policy and search directories are
/// set and its `sealed` fields locked before registration, so the generator
/// cannot replace them. They are applied again afterwards for unsealed
/// fields, since registration replaces search directories and the overwrite
/// policy. A sealed overwrite policy also ignores `--force`.
pub fn build_generator(
    manifest: &GenerationManifest,
    options: SessionOptions,
) -> Result<Generator, CliError> {
    let settings = &manifest.generator;

    let mut generator = match &settings.scratch_root {
        Some(root) => Generator::with_scratch_root(root)?,
        None => Generator::new()?,
    };
    generator
        .set_auto_remove_scratch_dir(settings.auto_remove_scratch_dir && !options.keep_scratch)
        .set_template_dirs(settings.template_dirs.iter().cloned())
        .set_overwrite_if_exists(settings.overwrite_if_exists || options.force)
        .set_variables(settings.variables.clone());

    for name in &settings.extensions {
        generator.enable_extension(name)?;
    }

    for spec in &manifest.builders {
        let mut builder = Builder::named(spec.name.clone());
        if let Some(template) = &spec.template {
            builder.set_template_name(template.clone());
        }
        builder
            .set_output_name(&spec.output)
            .set_variables(spec.variables.clone());
        if !settings.filters.is_empty() {
            builder.filters_mut().retain_only(&settings.filters)?;
        }
        if let Some(overwrite) = spec.overwrite_if_exists {
            builder.set_overwrite_if_exists(overwrite);
        }
        builder.set_template_dirs(spec.template_dirs.iter().cloned());

        for name in &spec.sealed {
            match Field::parse(name) {
                Some(field) => {
                    builder.seal(field);
                }
                None => warn!(builder = %spec.name, field = %name, "ignoring unknown sealed field"),
            }
        }

        // Setters below are no-ops on sealed fields.
        let builder = generator.add_builder(builder);
        if let Some(overwrite) = spec.overwrite_if_exists {
            builder.set_overwrite_if_exists(overwrite || options.force);
        }
        for dir in &spec.template_dirs {
            builder.add_template_dir(dir.clone());
        }
        debug!(builder = %spec.name, template = builder.template_name(), "configured builder");
    }

    Ok(generator)
}

/// Names of the declared builders, for "did you mean" output.
pub(crate) fn builder_names(manifest: &GenerationManifest) -> Vec<String> {
    manifest.builders.iter().map(|b| b.name.clone()).collect()
}
