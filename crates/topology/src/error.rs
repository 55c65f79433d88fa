//! Error types for the topology library.

use thiserror::Error;

/// Result type alias for the topology library.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors that can occur while mutating or querying a topology.
///
/// Lookups that simply miss are not errors; they return `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The requested mutation would break the shape of the tree
    /// (branch passed where a leaf is required, leaf at a rack location,
    /// node outside the expected subtree, ...).
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// A location string is not a valid slash-delimited path.
    #[error("Invalid network location: {0}")]
    InvalidPath(String),
}

impl TopologyError {
    pub(crate) fn invalid_topology(msg: impl Into<String>) -> Self {
        TopologyError::InvalidTopology(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TopologyError::invalid_topology("Not allow to add an inner node: /r1");
        assert_eq!(err.to_string(), "Invalid topology: Not allow to add an inner node: /r1");

        let err = TopologyError::InvalidPath("r1".to_string());
        assert_eq!(err.to_string(), "Invalid network location: r1");
    }
}
