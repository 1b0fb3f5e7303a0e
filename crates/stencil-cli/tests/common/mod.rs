//! Common test utilities for CLI testing.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

pub const MODEL_TEMPLATE: &str =
    "<?php\nnamespace {{namespace}};\n\nclass {{ucfirst class}}\n{\n    const TABLE = {{var_export table}};\n}\n";

/// A manifest using the scratch root and output dir of the test directory.
pub const DEFAULT_MANIFEST: &str = r#"
generator:
  template_dirs: [templates]
  scratch_root: .
  output_dir: out
  variables:
    namespace: App\Model
    table: users
builders:
  - name: ModelBuilder
    template: Model.hbs
    output: src/Model/User.php
    variables:
      class: user
  - name: ReadmeBuilder
    output: README.md
    variables:
      title: Generated models
"#;

/// Test context with temporary directory
pub struct TestContext {
    pub temp_dir: TempDir,
    pub manifest_path: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let manifest_path = temp_dir.path().join("stencil.yaml");
        fs::create_dir_all(temp_dir.path().join("templates")).expect("Failed to create templates");

        Self {
            temp_dir,
            manifest_path,
        }
    }

    /// Write the manifest file
    pub fn with_manifest(self, manifest: &str) -> Self {
        fs::write(&self.manifest_path, manifest).expect("Failed to write manifest");
        self
    }

    /// Write a template under `templates/`
    pub fn with_template(self, name: &str, contents: &str) -> Self {
        let path = self.path().join("templates").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create template dir");
        }
        fs::write(path, contents).expect("Failed to write template");
        self
    }

    /// The default manifest with both of its templates
    pub fn with_default_project(self) -> Self {
        self.with_manifest(DEFAULT_MANIFEST)
            .with_template("Model.hbs", MODEL_TEMPLATE)
            .with_template("ReadmeBuilder.hbs", "# {{title}}\n")
    }

    /// Get path to temp directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path().join(relative)).expect("Failed to read generated file")
    }

    /// Create a command configured for this context
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stencil").expect("Binary not found");
        cmd.current_dir(self.path())
            .env("STENCIL_MANIFEST", &self.manifest_path)
            .env_remove("STENCIL_LOG_LEVEL")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
