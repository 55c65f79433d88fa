//! Command line configuration.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use topology::{NetworkTopology, TopologyConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;
use crate::hosts;

/// Load a host listing into a network topology and query it.
#[derive(Debug, Parser)]
#[command(name = "topology", version, about)]
pub struct CliConfig {
    /// Host listing, one `<rack-location> <host-name>` per line.
    #[arg(long)]
    pub hosts: PathBuf,

    /// JSON file holding a `TopologyConfig`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated master racks, appended to those from `--config`.
    #[arg(long, value_delimiter = ',')]
    pub master_racks: Vec<String>,

    /// Seed for random choices, for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log at debug level (otherwise `RUST_LOG`, defaulting to warn).
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(&self) -> Result<()> {
        self.init_logging();

        let topology = self.build_topology()?;
        let listing = fs::read_to_string(&self.hosts)
            .with_context(|| format!("cannot read host listing {}", self.hosts.display()))?;
        let added = hosts::load(&topology, &listing)?;
        debug!(hosts = added, racks = topology.num_racks(), "Loaded topology");

        print!("{}", self.command.execute(&topology)?);
        Ok(())
    }

    pub fn topology_config(&self) -> Result<TopologyConfig> {
        let config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("cannot read config {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?
            }
            None => TopologyConfig::default(),
        };
        Ok(config.with_master_racks(self.master_racks.iter().cloned()))
    }

    fn build_topology(&self) -> Result<NetworkTopology> {
        let config = self.topology_config()?;
        Ok(match self.seed {
            Some(seed) => NetworkTopology::with_rng(config, StdRng::seed_from_u64(seed)),
            None => NetworkTopology::with_config(config),
        })
    }

    fn init_logging(&self) {
        let filter = if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
