//! Embedding compiled workflows as parent-graph nodes.
//!
//! A compiled [`Workflow`] can run as a single node of a parent workflow.
//! The parent sees none of the child's internals: it passes a read-only
//! input projection plus an optional per-instance seed, the child executes
//! to completion in its own state namespace, and only the declared export
//! fields come back — merged through the *parent's* reducers. Everything
//! else (scratch transcripts, retry counters) is discarded.
//!
//! This isolation is what lets many instances of the same sub-workflow run
//! concurrently without cross-contaminating scratch state while still
//! converging shared results into the parent.

use async_trait::async_trait;
use std::sync::Arc;

use crate::node::{Node, NodeContext, NodeError, NodeOutcome};
use crate::runtime::Executor;
use crate::state::StateSnapshot;
use crate::workflow::Workflow;

/// Projection contract between a parent graph and an embedded child.
///
/// - `inputs`: parent fields copied into the child's initial state. Read-only
///   from the parent's perspective; the child may overwrite its copy freely.
/// - `exports`: child fields merged back into the parent at the barrier.
/// - `seed_field`: where the per-instance seed lands in the child state.
///
/// An exported `Append`/`Accumulate` field must not also be projected in, or
/// the projected prefix would be re-appended on export. `MergeMap` fields may
/// be both projected and exported; re-merging an unchanged map is a no-op.
#[derive(Clone, Debug, Default)]
pub struct SubGraphSpec {
    pub inputs: Vec<String>,
    pub exports: Vec<String>,
    pub seed_field: Option<String>,
}

impl SubGraphSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_exports(mut self, exports: &[&str]) -> Self {
        self.exports = exports.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_seed_field(mut self, field: &str) -> Self {
        self.seed_field = Some(field.to_string());
        self
    }
}

/// A compiled workflow wrapped as a parent-graph [`Node`].
///
/// Constructed by
/// [`GraphBuilder::add_subgraph`](crate::graph::GraphBuilder::add_subgraph).
pub struct EmbeddedWorkflow {
    name: String,
    workflow: Arc<Workflow>,
    spec: SubGraphSpec,
}

impl EmbeddedWorkflow {
    pub(crate) fn new(name: String, workflow: Workflow, spec: SubGraphSpec) -> Self {
        Self {
            name,
            workflow: Arc::new(workflow),
            spec,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &SubGraphSpec {
        &self.spec
    }
}

#[async_trait]
impl Node for EmbeddedWorkflow {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let mut child_state = self.workflow.initial_state();
        for field in &self.spec.inputs {
            if let Some(value) = snapshot.get(field) {
                child_state.set(field.clone(), value.clone());
            }
        }
        if let Some(seed_field) = &self.spec.seed_field
            && let Some(seed) = ctx.seed()
        {
            child_state.set(seed_field.clone(), seed.clone());
        }

        tracing::debug!(workflow = %self.name, step = ctx.step, "entering sub-workflow");
        let executor = Executor::new(self.workflow.clone(), child_state, ctx.emitter().clone());
        let final_state =
            executor
                .run_until_complete()
                .await
                .map_err(|err| NodeError::Embedded {
                    workflow: self.name.clone(),
                    message: err.to_string(),
                })?;
        tracing::debug!(workflow = %self.name, step = ctx.step, "sub-workflow completed");

        let mut outcome = NodeOutcome::new();
        for field in &self.spec.exports {
            if let Some(value) = final_state.get(field) {
                outcome.delta.insert(field.clone(), value.clone());
            }
        }
        Ok(outcome)
    }
}
