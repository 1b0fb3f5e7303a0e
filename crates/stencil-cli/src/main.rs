//! Stencil CLI
//!
//! Main entry point for the `stencil` binary.

use std::process::ExitCode;

use clap::Parser;
use stencil_common_log::{LogConfig, LogLevel};
use tracing::debug;

mod cli;
mod commands;
mod error;

use cli::Cli;
use error::CliError;

/// Application exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    IoError = 3,
    GenerationError = 4,
    ValidationError = 5,
    NotFound = 6,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    // `.env` files may carry STENCIL_MANIFEST, so load them before parsing.
    let dotenv = stencil_common_config::load_dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_error(&e),
    };
    init_tracing(&cli);

    let result = dotenv
        .map_err(CliError::from)
        .and_then(|files| {
            for file in &files {
                debug!(path = %file.display(), "loaded environment file");
            }
            cli.execute()
        });

    match result {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error::report(&e, cli.verbose > 0);
            e.exit_code()
        }
    }
}

/// Print a clap error; usage mistakes exit as general errors.
fn usage_error(e: &clap::Error) -> ExitCode {
    // Help and version requests also arrive as errors.
    let _ = e.print();
    if e.use_stderr() {
        Exit::GeneralError.into()
    } else {
        Exit::Success.into()
    }
}

fn init_tracing(cli: &Cli) {
    // -v/-q win, then STENCIL_LOG_LEVEL, then RUST_LOG, then warn.
    let mut config = LogConfig::from_env();
    let from_env = config.explicit_level || config.directives.is_some();
    if cli.verbose > 0 || cli.quiet || !from_env {
        config = config.with_level(LogLevel::from_verbosity(cli.verbose, cli.quiet));
    }

    if let Err(e) = stencil_common_log::init(config) {
        eprintln!("warning: logging disabled: {e}");
    }
}
