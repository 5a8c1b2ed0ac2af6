//! Command-line transport: one command per process, JSON on stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;

use crate::app::commands::{Context, Registry};
use crate::infra::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "goscribe",
    author,
    version,
    about = "Position-exact Go source edits for editor plugins",
    long_about = None
)]
pub struct Cli {
    /// Extra configuration file layered over the user config.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Command to run: add_comments, add_import, imports, gotest, version.
    pub command: String,

    /// JSON payload for the command.
    pub data: Option<String>,
}

/// Parse process arguments and run the requested command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let registry = Registry::with_defaults();
    let ctx = Context::new(config);

    let data = cli.data.unwrap_or_default();
    let out = registry.run(&ctx, &cli.command, data.as_bytes())?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &out).context("failed to encode result")?;
    writeln!(stdout)?;
    Ok(())
}
