//! `stencil render`: print one builder's output.

use std::io::Write;

use clap::Parser;

use super::{build_generator, builder_names, SessionOptions};
use crate::cli::CommandContext;
use crate::error::CliError;

#[derive(Debug, Parser)]
pub struct RenderCommand {
    /// Builder name as declared in the manifest
    pub builder: String,
}

impl RenderCommand {
    pub fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let generator = build_generator(&ctx.manifest, SessionOptions::default())?;
        let builder = generator.builder(&self.builder).ok_or_else(|| {
            CliError::not_found("builder", &self.builder, builder_names(&ctx.manifest))
        })?;

        let code = builder.render()?;
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(code.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| CliError::io("failed to write to stdout", e))
    }
}
