use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::node::Node;
use crate::reducers::{ChannelRegistry, Reducer};
use crate::subgraph::{EmbeddedWorkflow, SubGraphSpec};
use crate::types::NodeKind;
use crate::workflow::Workflow;

use super::compile::GraphDefinitionError;

/// Builder for workflow graphs.
///
/// A graph needs at least one executable node, an edge from `Start`, and a
/// channel declaration for every field its nodes write. `Start`/`End` are
/// virtual endpoints: attempts to register them as nodes are ignored with a
/// warning.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stepgraph::graph::GraphBuilder;
/// use stepgraph::reducers::Append;
///
/// # struct Step;
/// # #[async_trait::async_trait]
/// # impl stepgraph::node::Node for Step {
/// #     async fn run(
/// #         &self,
/// #         _: stepgraph::state::StateSnapshot,
/// #         _: stepgraph::node::NodeContext,
/// #     ) -> Result<stepgraph::node::NodeOutcome, stepgraph::node::NodeError> {
/// #         Ok(stepgraph::node::NodeOutcome::default())
/// #     }
/// # }
/// let workflow = GraphBuilder::new()
///     .add_channel("log", Arc::new(Append))
///     .add_node("step", Step)
///     .add_edge("Start", "step")
///     .add_edge("step", "End")
///     .compile()
///     .unwrap();
/// ```
pub struct GraphBuilder {
    pub(super) nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    pub(super) edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    pub(super) registry: ChannelRegistry,
    /// Parent-registry export requirements recorded by `add_subgraph`,
    /// checked at compile time.
    pub(super) export_requirements: Vec<(String, Vec<String>)>,
    /// Child-side definition errors detected while adding sub-workflows.
    pub(super) deferred_errors: Vec<GraphDefinitionError>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            registry: ChannelRegistry::new(),
            export_requirements: Vec::new(),
            deferred_errors: Vec::new(),
        }
    }

    /// Declares a state field and its merge strategy.
    #[must_use]
    pub fn add_channel(mut self, field: impl Into<String>, reducer: Arc<dyn Reducer>) -> Self {
        self.registry.register(field, reducer);
        self
    }

    /// Registers an executable node under a graph-unique name.
    ///
    /// `Start` and `End` are virtual and cannot carry logic; registering
    /// either is ignored with a warning.
    #[must_use]
    pub fn add_node(mut self, id: impl Into<NodeKind>, node: impl Node + 'static) -> Self {
        let id = id.into();
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(?id, "ignoring registration of virtual node kind");
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Embeds a compiled workflow as a node of this graph.
    ///
    /// The child executes in its own state namespace: the parent passes a
    /// read-only input projection plus any per-instance seed; only the
    /// child's declared export fields are merged back through the parent's
    /// reducers. See [`SubGraphSpec`].
    #[must_use]
    pub fn add_subgraph(
        mut self,
        id: impl Into<NodeKind>,
        workflow: Workflow,
        spec: SubGraphSpec,
    ) -> Self {
        let id = id.into();
        let name = id.to_string();

        // Child-side checks are possible right now: projected and seeded
        // fields must exist in the child's own registry.
        let child_registry = workflow.registry();
        for field in spec.inputs.iter().chain(spec.seed_field.iter()) {
            if !child_registry.contains(field) {
                self.deferred_errors
                    .push(GraphDefinitionError::UnknownChildField {
                        node: name.clone(),
                        field: field.clone(),
                    });
            }
        }
        self.export_requirements
            .push((name.clone(), spec.exports.clone()));

        self.add_node(id, EmbeddedWorkflow::new(name, workflow, spec))
    }

    /// Adds a static edge. When the `from` node finishes without a routing
    /// decision, the executor schedules every static successor.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<NodeKind>, to: impl Into<NodeKind>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }
}
