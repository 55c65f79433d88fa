//! CLI entry point for the topology inspector.

use clap::Parser;
use topology_cli::CliConfig;

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    config.run()
}
