//! Host listing loader.
//!
//! One host per line: `<rack-location> <host-name>`. Blank lines and lines
//! starting with `#` are ignored.
//!
//! ```text
//! # rack        host
//! /dc1/rack1    10.0.0.1:50010
//! /dc1/rack2    10.0.0.2:50010
//! ```

use anyhow::{bail, Context, Result};
use topology::{NetworkTopology, Node};

/// Parse a listing into `(location, name)` pairs.
pub fn parse(text: &str) -> Result<Vec<(String, String)>> {
    let mut hosts = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(location), Some(name), None) => hosts.push((location.to_string(), name.to_string())),
            _ => bail!("line {}: expected `<rack-location> <host-name>`, got {:?}", number + 1, line),
        }
    }
    Ok(hosts)
}

/// Add every host in the listing to `topology`; returns how many were added.
pub fn load(topology: &NetworkTopology, text: &str) -> Result<usize> {
    let hosts = parse(text)?;
    for (location, name) in &hosts {
        topology
            .add(Node::leaf(name.as_str(), location.as_str()))
            .with_context(|| format!("cannot add {} at {}", name, location))?;
    }
    Ok(hosts.len())
}
