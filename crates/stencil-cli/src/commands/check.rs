//! `stencil check`: validate the manifest without writing anything.

use clap::Parser;
use serde::Serialize;

use super::{build_generator, SessionOptions};
use crate::cli::{CommandContext, OutputFormat};
use crate::error::CliError;

#[derive(Debug, Parser)]
pub struct CheckCommand {}

#[derive(Debug, Serialize)]
struct CheckRecord {
    builder: String,
    template: String,
    resolved: Option<String>,
    error: Option<String>,
}

impl CheckCommand {
    pub fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let generator = build_generator(&ctx.manifest, SessionOptions::default())?;

        let records: Vec<CheckRecord> = generator
            .builders()
            .iter()
            .map(|(name, builder)| {
                let resolved = builder.loader().resolve(builder.template_name());
                CheckRecord {
                    builder: name.clone(),
                    template: builder.template_name().to_string(),
                    resolved: resolved.as_ref().ok().map(|p| p.display().to_string()),
                    error: resolved.err().map(|e| e.to_string()),
                }
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
                    match (&record.resolved, &record.error) {
                        (Some(path), _) => println!("ok       {:<24} {path}", record.builder),
                        (None, Some(error)) => println!("missing  {:<24} {error}", record.builder),
                        (None, None) => {}
                    }
                }
            }
            OutputFormat::Text => {}
        }

        let failures: Vec<String> = records
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {e}", r.builder)))
            .collect();
        if failures.is_empty() {
            return Ok(());
        }

        Err(CliError::Validation {
            message: format!(
                "{} of {} builders in {} cannot be generated",
                failures.len(),
                records.len(),
                ctx.manifest_path.display()
            ),
            failures,
        })
    }
}
