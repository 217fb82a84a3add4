use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeKind;
use crate::workflow::Workflow;

use super::builder::GraphBuilder;

/// Structural graph problems. Fatal and never retried: raised at compile
/// time for static definitions and at dispatch time for dynamic routing
/// targets the compiler cannot see.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphDefinitionError {
    #[error("no edges from Start: the graph has no entry point")]
    #[diagnostic(
        code(stepgraph::graph::no_entry),
        help("Add at least one edge from Start to an executable node.")
    )]
    NoEntryEdges,

    #[error("edge references unknown node: {from} -> {to}")]
    #[diagnostic(code(stepgraph::graph::unknown_edge_target))]
    UnknownEdgeTarget { from: String, to: String },

    #[error("invalid edge {from} -> {to}: {reason}")]
    #[diagnostic(code(stepgraph::graph::invalid_edge))]
    InvalidEdge {
        from: String,
        to: String,
        reason: &'static str,
    },

    #[error("node {node} routed to unknown target: {target}")]
    #[diagnostic(
        code(stepgraph::graph::unknown_route_target),
        help("Dynamic routing targets must name registered nodes (or End).")
    )]
    UnknownRouteTarget { node: String, target: String },

    #[error("sub-workflow {node} exports field {field} not declared in the parent registry")]
    #[diagnostic(code(stepgraph::graph::unknown_export_field))]
    UnknownExportField { node: String, field: String },

    #[error("sub-workflow {node} projects or seeds field {field} not declared in its own registry")]
    #[diagnostic(code(stepgraph::graph::unknown_child_field))]
    UnknownChildField { node: String, field: String },
}

impl GraphBuilder {
    /// Validates the definition and compiles it into an executable
    /// [`Workflow`].
    ///
    /// Checks performed here:
    /// - at least one edge leaves `Start`;
    /// - every static edge endpoint is `Start`/`End` or a registered node,
    ///   `End` has no outgoing edges, and nothing routes back into `Start`;
    /// - sub-workflow export fields exist in the parent registry, and their
    ///   projected/seeded fields exist in the child registry.
    pub fn compile(self) -> Result<Workflow, GraphDefinitionError> {
        if let Some(err) = self.deferred_errors.into_iter().next() {
            return Err(err);
        }

        let entry = self.edges.get(&NodeKind::Start);
        if entry.is_none_or(|targets| targets.is_empty()) {
            return Err(GraphDefinitionError::NoEntryEdges);
        }

        for (from, targets) in &self.edges {
            if from.is_end() {
                let to = targets.first().map(ToString::to_string).unwrap_or_default();
                return Err(GraphDefinitionError::InvalidEdge {
                    from: from.to_string(),
                    to,
                    reason: "End is terminal and has no outgoing edges",
                });
            }
            if from.is_custom() && !self.nodes.contains_key(from) {
                let to = targets.first().map(ToString::to_string).unwrap_or_default();
                return Err(GraphDefinitionError::UnknownEdgeTarget {
                    from: from.to_string(),
                    to,
                });
            }
            for to in targets {
                if to.is_start() {
                    return Err(GraphDefinitionError::InvalidEdge {
                        from: from.to_string(),
                        to: to.to_string(),
                        reason: "Start is virtual and cannot be a target",
                    });
                }
                if to.is_custom() && !self.nodes.contains_key(to) {
                    return Err(GraphDefinitionError::UnknownEdgeTarget {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
            }
        }

        for (node, exports) in &self.export_requirements {
            for field in exports {
                if !self.registry.contains(field) {
                    return Err(GraphDefinitionError::UnknownExportField {
                        node: node.clone(),
                        field: field.clone(),
                    });
                }
            }
        }

        Ok(Workflow::from_parts(self.nodes, self.edges, self.registry))
    }
}
