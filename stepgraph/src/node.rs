//! Node execution contract.
//!
//! A [`Node`] is the unit of executable workflow logic: a pure-ish async
//! function of a state snapshot to a [`NodeOutcome`] — a partial state delta
//! plus an optional routing decision. Nodes never mutate shared state
//! directly; the barrier merges their deltas through declared reducers.
//!
//! # Error Handling
//!
//! Returning `Err(NodeError)` is fatal and aborts the run. Recoverable
//! conditions (e.g. an action argument the model can fix) belong in the
//! delta as transcript content, not in the error channel.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::command::{RoutingDecision, SendTo};
use crate::events::{Event, ProgressEmitter, ProgressEvent};
use crate::state::{StateDelta, StateError, StateSnapshot};
use crate::types::NodeKind;

/// Executable workflow node.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::json;
/// use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
/// use stepgraph::state::StateSnapshot;
///
/// struct CountDown;
///
/// #[async_trait]
/// impl Node for CountDown {
///     async fn run(
///         &self,
///         snapshot: StateSnapshot,
///         ctx: NodeContext,
///     ) -> Result<NodeOutcome, NodeError> {
///         let remaining: u32 = snapshot.get_as("remaining")?;
///         if remaining == 0 {
///             return Ok(NodeOutcome::end());
///         }
///         // Self-loop until the counter runs out.
///         Ok(NodeOutcome::goto(ctx.node_id.as_str())
///             .update("remaining", json!(remaining - 1)))
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against an immutable state snapshot.
    async fn run(&self, snapshot: StateSnapshot, ctx: NodeContext)
    -> Result<NodeOutcome, NodeError>;
}

/// Per-invocation execution context.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// The graph name of this node instance.
    pub node_id: String,
    /// Superstep number of the enclosing run.
    pub step: u64,
    seed: Option<Value>,
    emitter: ProgressEmitter,
}

impl NodeContext {
    pub(crate) fn new(
        node_id: String,
        step: u64,
        seed: Option<Value>,
        emitter: ProgressEmitter,
    ) -> Self {
        Self {
            node_id,
            step,
            seed,
            emitter,
        }
    }

    /// The per-instance seed, if this invocation was scheduled with one.
    /// Seeds are private: sibling fan-out instances never see each other's.
    #[must_use]
    pub fn seed(&self) -> Option<&Value> {
        self.seed.as_ref()
    }

    /// Deserialize the seed into a typed value.
    pub fn seed_as<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        let seed = self.seed.as_ref().ok_or(NodeError::MissingInput {
            what: "instance seed",
        })?;
        Ok(serde_json::from_value(seed.clone())?)
    }

    /// Emit a raw event, best-effort.
    pub fn emit(&self, event: Event) {
        self.emitter.emit(event);
    }

    /// Emit a progress event, filling in this node's id when unset.
    pub fn emit_progress(&self, event: ProgressEvent) {
        let event = if event.node.is_none() {
            event.with_node(self.node_id.clone())
        } else {
            event
        };
        self.emitter.emit(Event::Progress(event));
    }

    /// The underlying emitter, for handing to embedded sub-workflows.
    #[must_use]
    pub fn emitter(&self) -> &ProgressEmitter {
        &self.emitter
    }
}

/// Partial result of one node invocation: a state delta plus an optional
/// routing decision (`None` = follow the static edges).
#[derive(Clone, Debug, Default)]
pub struct NodeOutcome {
    pub delta: StateDelta,
    pub route: Option<RoutingDecision>,
}

impl NodeOutcome {
    /// An empty outcome: no writes, follow static edges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one field write to the delta.
    #[must_use]
    pub fn update(mut self, field: impl Into<String>, value: Value) -> Self {
        self.delta.insert(field.into(), value);
        self
    }

    /// Merge a prepared delta into this outcome.
    #[must_use]
    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta.extend(delta);
        self
    }

    /// Route to a single node.
    #[must_use]
    pub fn goto(target: impl Into<NodeKind>) -> Self {
        Self {
            delta: StateDelta::default(),
            route: Some(RoutingDecision::Goto {
                target: target.into(),
                seed: None,
            }),
        }
    }

    /// Route to a single node, handing it a per-invocation seed.
    #[must_use]
    pub fn goto_with_seed(target: impl Into<NodeKind>, seed: Value) -> Self {
        Self {
            delta: StateDelta::default(),
            route: Some(RoutingDecision::Goto {
                target: target.into(),
                seed: Some(seed),
            }),
        }
    }

    /// Schedule concurrent instances and join at the barrier.
    #[must_use]
    pub fn fan_out(sends: Vec<SendTo>) -> Self {
        Self {
            delta: StateDelta::default(),
            route: Some(RoutingDecision::FanOut(sends)),
        }
    }

    /// Terminal marker for this branch.
    #[must_use]
    pub fn end() -> Self {
        Self {
            delta: StateDelta::default(),
            route: Some(RoutingDecision::End),
        }
    }
}

/// Fatal node-execution failures.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input is missing from the snapshot or context.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(stepgraph::node::missing_input),
        help("Check that an upstream node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// An external collaborator failed after its own retries.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(stepgraph::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON (de)serialization failure.
    #[error(transparent)]
    #[diagnostic(code(stepgraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Typed snapshot access failure.
    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),

    /// Input validation failed in a way the workflow cannot recover from.
    #[error("validation failed: {0}")]
    #[diagnostic(code(stepgraph::node::validation))]
    ValidationFailed(String),

    /// An embedded sub-workflow run failed.
    #[error("embedded workflow {workflow} failed: {message}")]
    #[diagnostic(code(stepgraph::node::embedded))]
    Embedded { workflow: String, message: String },
}
