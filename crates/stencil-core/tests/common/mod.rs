//! Shared fixtures for stencil-core integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use stencil_core::{Builder, BuilderKind, Variables};

/// Directory holding the template fixtures.
pub fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/templates")
}

/// Builder kind whose template is `DemoBuilder.hbs`: `Hello {{ name }} !`.
pub struct DemoBuilder;

impl BuilderKind for DemoBuilder {
    fn default_template_dirs(&self) -> Vec<PathBuf> {
        vec![templates_dir()]
    }
}

/// Builder kind rendering `Model.hbs`.
pub struct ModelBuilder;

impl BuilderKind for ModelBuilder {
    fn configure(&self, builder: &mut Builder) {
        builder.set_template_name("Model.hbs");
    }
}

/// Build a variable map from JSON object syntax.
pub fn vars(value: serde_json::Value) -> Variables {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A demo builder set up the way most tests want it.
pub fn demo_builder(name: &str) -> Builder {
    let mut builder = Builder::new(DemoBuilder);
    builder
        .set_overwrite_if_exists(true)
        .set_output_name("test.php")
        .set_variables(vars(serde_json::json!({ "name": name })));
    builder
}
