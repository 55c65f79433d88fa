//! Commands run against a loaded topology.

use std::collections::HashSet;
use std::fmt::Write as _;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use topology::{NetworkTopology, NodeId, UNREACHABLE};

/// Text printed by a command.
pub type CommandResult = Result<String>;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print rack and host counts followed by every host path.
    Dump,
    /// List racks in the order they were first populated.
    Racks,
    /// Hop count between two hosts.
    Distance { a: String, b: String },
    /// Whether two hosts share a rack.
    SameRack { a: String, b: String },
    /// Hosts in SCOPE (or outside it, for ~SCOPE) not in the excluded set.
    Count {
        scope: String,
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Pick a random host in SCOPE (~SCOPE picks outside it).
    ChooseRandom {
        scope: String,
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Pick a random rack not in the excluded set.
    ChooseRack {
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Order replica candidates for a reader.
    Sort { reader: String, candidates: Vec<String> },
    /// Order write targets as a pipeline starting at the writer.
    Pipeline { writer: String, nodes: Vec<String> },
}

impl Command {
    pub fn execute(&self, topology: &NetworkTopology) -> CommandResult {
        match self {
            Command::Dump => Ok(topology.to_string()),
            Command::Racks => Ok(lines(topology.get_racks())),
            Command::Distance { a, b } => {
                let distance = topology.distance(lookup(topology, a)?, lookup(topology, b)?);
                if distance == UNREACHABLE {
                    Ok("unreachable\n".to_string())
                } else {
                    Ok(format!("{}\n", distance))
                }
            }
            Command::SameRack { a, b } => {
                let same = topology.same_rack(Some(lookup(topology, a)?), Some(lookup(topology, b)?));
                Ok(format!("{}\n", same))
            }
            Command::Count { scope, exclude } => {
                let excluded = exclude
                    .iter()
                    .map(|path| lookup(topology, path))
                    .collect::<Result<HashSet<_>>>()?;
                Ok(format!("{}\n", topology.count_available(scope, &excluded)?))
            }
            Command::ChooseRandom { scope, exclude } => {
                let picked = match exclude {
                    Some(excluded) => topology.choose_random_excluding(scope, Some(excluded.as_str())),
                    None => topology.choose_random(scope),
                };
                Ok(paths(topology, picked.into_iter()))
            }
            Command::ChooseRack { exclude } => {
                let excluded: HashSet<String> = exclude.iter().cloned().collect();
                Ok(topology
                    .choose_rack(&excluded)
                    .map(|rack| format!("{}\n", rack))
                    .unwrap_or_default())
            }
            Command::Sort { reader, candidates } => {
                let reader = lookup(topology, reader)?;
                let mut nodes = lookup_all(topology, candidates)?;
                topology.sort_by_distance(Some(reader), &mut nodes);
                Ok(paths(topology, nodes.into_iter()))
            }
            Command::Pipeline { writer, nodes } => {
                let writer = lookup(topology, writer)?;
                let mut nodes = lookup_all(topology, nodes)?;
                topology.build_pipeline(Some(writer), &mut nodes);
                Ok(paths(topology, nodes.into_iter()))
            }
        }
    }
}

fn lookup(topology: &NetworkTopology, path: &str) -> Result<NodeId> {
    topology
        .resolve(path)
        .ok_or_else(|| anyhow!("no node at {}", path))
}

fn lookup_all(topology: &NetworkTopology, paths: &[String]) -> Result<Vec<NodeId>> {
    paths.iter().map(|path| lookup(topology, path)).collect()
}

fn paths(topology: &NetworkTopology, ids: impl Iterator<Item = NodeId>) -> String {
    lines(ids.filter_map(|id| topology.path_of(id)))
}

fn lines(items: impl IntoIterator<Item = String>) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "{}", item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts;

    fn topology() -> NetworkTopology {
        let topology = NetworkTopology::new();
        hosts::load(&topology, "/dc1/r1 h1\n/dc1/r1 h2\n/dc1/r2 h3\n/dc2/r3 h4\n").unwrap();
        topology
    }

    #[test]
    fn test_dump_and_racks() {
        let topology = topology();
        let dump = Command::Dump.execute(&topology).unwrap();
        assert!(dump.starts_with("Number of racks: 3\nExpected number of leaves:4\n"));
        assert_eq!(
            Command::Racks.execute(&topology).unwrap(),
            "/dc1/r1\n/dc1/r2\n/dc2/r3\n"
        );
    }

    #[test]
    fn test_distance() {
        let topology = topology();
        let cmd = Command::Distance {
            a: "/dc1/r1/h1".to_string(),
            b: "/dc2/r3/h4".to_string(),
        };
        assert_eq!(cmd.execute(&topology).unwrap(), "6\n");

        let missing = Command::Distance {
            a: "/dc1/r1/h1".to_string(),
            b: "/dc9/r9/h9".to_string(),
        };
        assert!(missing.execute(&topology).is_err());
    }

    #[test]
    fn test_count_and_choose() {
        let topology = topology();
        let count = Command::Count {
            scope: "~/dc1".to_string(),
            exclude: vec![],
        };
        assert_eq!(count.execute(&topology).unwrap(), "1\n");

        let pick = Command::ChooseRandom {
            scope: "~/dc1".to_string(),
            exclude: None,
        };
        assert_eq!(pick.execute(&topology).unwrap(), "/dc2/r3/h4\n");

        let rack = Command::ChooseRack {
            exclude: vec!["/dc1/r1".to_string(), "/dc1/r2".to_string()],
        };
        assert_eq!(rack.execute(&topology).unwrap(), "/dc2/r3\n");
    }

    #[test]
    fn test_pipeline() {
        let topology = topology();
        let cmd = Command::Pipeline {
            writer: "/dc1/r1/h1".to_string(),
            nodes: vec!["/dc2/r3/h4".to_string(), "/dc1/r2/h3".to_string(), "/dc1/r1/h2".to_string()],
        };
        assert_eq!(cmd.execute(&topology).unwrap(), "/dc1/r1/h2\n/dc1/r2/h3\n/dc2/r3/h4\n");
    }
}
