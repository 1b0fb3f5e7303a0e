//! Manifest types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Field names accepted in a builder's `sealed` list.
pub const SEAL_FIELDS: &[&str] = &[
    "template_dirs",
    "template_name",
    "output_name",
    "overwrite_if_exists",
    "variables",
];

/// Root of a `stencil.yaml` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationManifest {
    /// Defaults shared by every builder.
    #[serde(default)]
    pub generator: GeneratorSettings,

    /// Generation targets, in registration order.
    #[serde(default)]
    pub builders: Vec<BuilderSpec>,
}

impl GenerationManifest {
    /// Look up a builder entry by name.
    pub fn builder(&self, name: &str) -> Option<&BuilderSpec> {
        self.builders.iter().find(|b| b.name == name)
    }
}

/// Generator-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Template search directories handed to every builder.
    pub template_dirs: Vec<PathBuf>,

    /// Default overwrite policy.
    pub overwrite_if_exists: bool,

    /// Root under which the scratch directory is created.
    pub scratch_root: Option<PathBuf>,

    /// Remove the scratch directory when generation ends.
    pub auto_remove_scratch_dir: bool,

    /// Where generated files land, unless the caller overrides it.
    pub output_dir: Option<PathBuf>,

    /// Variables shared by every builder.
    pub variables: Map<String, Value>,

    /// Built-in filters to keep; empty keeps all of them.
    pub filters: Vec<String>,

    /// Extensions enabled on every builder.
    pub extensions: Vec<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            template_dirs: Vec::new(),
            overwrite_if_exists: false,
            scratch_root: None,
            auto_remove_scratch_dir: true,
            output_dir: None,
            variables: Map::new(),
            filters: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

/// One generation target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderSpec {
    /// Short type name, also the registry key.
    pub name: String,

    /// Template file name; `<name>.hbs` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Output path, relative to the output directory.
    pub output: String,

    /// Overrides the generator's overwrite policy after registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_if_exists: Option<bool>,

    /// Extra search directories added after the generator's ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_dirs: Vec<PathBuf>,

    /// Builder-specific variables; these win over the generator's.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,

    /// Fields locked once the builder is registered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sealed: Vec<String>,
}
