//! Core identifier types for workflow graphs.
//!
//! [`NodeKind`] names the vertices of a workflow graph. `Start` and `End` are
//! virtual endpoints: they carry no executable logic and exist only so edges
//! can express where execution enters and leaves the graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `Start` and `End` are virtual; they must never be registered with
/// [`GraphBuilder::add_node`](crate::graph::GraphBuilder::add_node). Every
/// executable node is a `Custom` kind with a name unique within its graph.
///
/// # Examples
///
/// ```
/// use stepgraph::types::NodeKind;
///
/// let planner = NodeKind::Custom("planner".to_string());
/// assert!(planner.is_custom());
/// assert_eq!(planner.to_string(), "planner");
///
/// // String literals convert directly; endpoint names are recognized.
/// assert_eq!(NodeKind::from("End"), NodeKind::End);
/// assert_eq!(NodeKind::from("tools"), NodeKind::Custom("tools".into()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point; edges from `Start` form the initial frontier.
    Start,
    /// Virtual exit point; a frontier of only `End` entries completes the run.
    End,
    /// An executable node identified by a graph-unique name.
    Custom(String),
}

impl NodeKind {
    /// Returns `true` if this is the virtual [`Start`](Self::Start) endpoint.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) endpoint.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns `true` if this is an executable custom node.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        NodeKind::from(s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_names_round_trip() {
        assert_eq!(NodeKind::from("Start"), NodeKind::Start);
        assert_eq!(NodeKind::from("End"), NodeKind::End);
        assert_eq!(NodeKind::Start.to_string(), "Start");
        assert_eq!(NodeKind::End.to_string(), "End");
    }

    #[test]
    fn custom_kind_displays_bare_name() {
        let kind = NodeKind::from("gather");
        assert!(kind.is_custom());
        assert_eq!(kind.to_string(), "gather");
    }
}
