//! cpdigest - classpath dependency change detection
//!
//! Runs a digest pass over the given dependencies against the build state
//! stored in `.cpdigest/` and reports whether anything changed.

use anyhow::Result;
use clap::Parser;

use cpdigest::cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbose);
    cli::run(cli)
}
