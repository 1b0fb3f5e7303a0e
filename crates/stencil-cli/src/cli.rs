//! CLI argument definitions using clap derive macros.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use stencil_common_config::{GenerationManifest, ManifestLoader, DEFAULT_MANIFEST};
use tracing::debug;

use crate::commands::{CheckCommand, GenerateCommand, RenderCommand};
use crate::error::CliError;

/// Stencil - template-driven code generation
///
/// Renders the builders declared in a manifest with handlebars templates.
#[derive(Debug, Parser)]
#[command(
    name = "stencil",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the generation manifest
    #[arg(
        short,
        long,
        global = true,
        env = "STENCIL_MANIFEST",
        default_value = DEFAULT_MANIFEST,
        value_hint = ValueHint::FilePath
    )]
    pub manifest: PathBuf,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render every builder and write the results
    #[command(visible_alias = "gen")]
    Generate(GenerateCommand),

    /// Render one builder to standard output
    Render(RenderCommand),

    /// Validate the manifest and resolve every template
    Check(CheckCommand),
}

/// Shared state handed to every command.
#[derive(Debug)]
pub struct CommandContext {
    pub manifest: GenerationManifest,
    pub manifest_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn load(manifest_path: &Path, format: OutputFormat, quiet: bool) -> Result<Self, CliError> {
        let loader = ManifestLoader::new(manifest_path);
        let manifest = loader.load()?;
        debug!(
            path = %manifest_path.display(),
            builders = manifest.builders.len(),
            "loaded manifest"
        );

        Ok(Self {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            format,
            quiet,
        })
    }
}

impl Cli {
    /// Load the manifest and run the selected command.
    pub fn execute(&self) -> Result<(), CliError> {
        let ctx = CommandContext::load(&self.manifest, self.format, self.quiet)?;

        match &self.command {
            Command::Generate(cmd) => cmd.execute(&ctx),
            Command::Render(cmd) => cmd.execute(&ctx),
            Command::Check(cmd) => cmd.execute(&ctx),
        }
    }
}
