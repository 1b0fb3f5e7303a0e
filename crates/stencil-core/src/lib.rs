//! Template-driven code generation.
//!
//! A [`Builder`] is one generation target: a handlebars template looked up
//! in an ordered list of search directories, the variables to render it
//! with, and the path to write the result to. A [`Generator`] collects
//! builders, hands each of them its shared defaults at registration time and
//! writes them all into an output directory.
//!
//! ```no_run
//! use stencil_core::{Builder, BuilderKind, Generator};
//!
//! struct ModelBuilder;
//! impl BuilderKind for ModelBuilder {}
//!
//! # fn main() -> stencil_core::Result<()> {
//! let mut generator = Generator::new()?;
//! generator.set_template_dirs(["templates"]);
//!
//! let mut builder = Builder::new(ModelBuilder);
//! builder.set_output_name("src/Model/User.php").set_variable("class", "User");
//! generator.add_builder(builder);
//!
//! generator.write_on_disk("generated")?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod extensions;
pub mod filters;
pub mod generator;
pub mod loader;
mod strict;

pub use builder::{short_type_name, Builder, BuilderKind, Field, Variables, WriteOutcome, BUILDER_KEY};
pub use error::{Error, Result};
pub use extensions::{Extension, ExtensionRegistry, PartialsExtension};
pub use filters::{FilterError, FilterFn, FilterRegistry};
pub use generator::{Generator, ScratchDir};
pub use loader::{TemplateLoader, TEMPLATE_EXTENSION};
