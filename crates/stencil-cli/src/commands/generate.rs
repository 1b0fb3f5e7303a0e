//! `stencil generate`: write every builder into the output directory.

use std::path::PathBuf;

use clap::{Parser, ValueHint};
use serde::Serialize;
use stencil_core::WriteOutcome;

use super::{build_generator, SessionOptions};
use crate::cli::{CommandContext, OutputFormat};
use crate::error::CliError;

#[derive(Debug, Parser)]
pub struct GenerateCommand {
    /// Output directory (overrides `generator.output_dir`)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Overwrite files that already exist, except for builders that seal
    /// `overwrite_if_exists`
    #[arg(long)]
    pub force: bool,

    /// Keep the scratch directory after the run
    #[arg(long)]
    pub keep_scratch: bool,
}

#[derive(Debug, Serialize)]
struct OutcomeRecord<'a> {
    builder: &'a str,
    status: &'static str,
    path: String,
}

impl GenerateCommand {
    pub fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let output_dir = self
            .output
            .clone()
            .or_else(|| ctx.manifest.generator.output_dir.clone())
            .ok_or_else(|| {
                CliError::user_with_hint(
                    "no output directory",
                    "pass --output or set `generator.output_dir` in the manifest",
                )
            })?;

        let options = SessionOptions {
            force: self.force,
            keep_scratch: self.keep_scratch,
        };
        let generator = build_generator(&ctx.manifest, options)?;
        let outcomes = generator.write_on_disk(&output_dir)?;

        if self.keep_scratch && !ctx.quiet {
            eprintln!("scratch directory kept at {}", generator.scratch_dir().display());
        }

        let records: Vec<_> = generator
            .builders()
            .keys()
            .zip(&outcomes)
            .map(|(name, outcome)| OutcomeRecord {
                builder: name,
                status: status(outcome),
                path: outcome.path().display().to_string(),
            })
            .collect();

        match ctx.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&records)
                    .map_err(|e| CliError::io("failed to encode output", e.into()))?;
                println!("{json}");
            }
            OutputFormat::Text if !ctx.quiet => {
                for record in &records {
                    println!("{:<8} {:<24} {}", record.status, record.builder, record.path);
                }
            }
            OutputFormat::Text => {}
        }

        Ok(())
    }
}

fn status(outcome: &WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Written(_) => "written",
        WriteOutcome::Skipped(_) => "skipped",
    }
}
