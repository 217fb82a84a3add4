//! Routing decisions returned by nodes.
//!
//! Routing is dynamic: a node's return value can override the statically
//! declared edges for the step that just ran. Decisions are interpreted by
//! the executor's dispatch loop; there is no dynamic dispatch beyond this
//! tagged union.

use serde_json::Value;

use crate::types::NodeKind;

/// One parallel fan-out instance: a target node plus its private seed.
///
/// The seed is visible only to that instance (as
/// [`NodeContext::seed`](crate::node::NodeContext::seed)), never to siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct SendTo {
    pub target: NodeKind,
    pub seed: Option<Value>,
}

impl SendTo {
    #[must_use]
    pub fn new(target: impl Into<NodeKind>) -> Self {
        Self {
            target: target.into(),
            seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(target: impl Into<NodeKind>, seed: Value) -> Self {
        Self {
            target: target.into(),
            seed: Some(seed),
        }
    }
}

/// A node's routing directive for the next step.
///
/// `None` (the absence of a decision on
/// [`NodeOutcome`](crate::node::NodeOutcome)) means "follow the static
/// edges". A node naming itself in [`Goto`](Self::Goto) is legal and is the
/// mechanism behind self-correcting retry loops.
#[derive(Clone, Debug, PartialEq)]
pub enum RoutingDecision {
    /// Route to a single next node. The optional seed covers handing a
    /// sub-workflow its per-invocation input (e.g. a delegated task).
    Goto {
        target: NodeKind,
        seed: Option<Value>,
    },
    /// Schedule every entry concurrently and wait for all of them at the
    /// barrier. Multiple entries always imply parallel execution; sequential
    /// fan-out does not exist.
    FanOut(Vec<SendTo>),
    /// Terminal marker: this branch of execution is finished.
    End,
}
