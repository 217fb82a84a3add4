//! The superstep executor.
//!
//! One run is a loop over supersteps: snapshot the state, invoke every
//! frontier entry concurrently, merge all deltas at the barrier, then compute
//! the next frontier from routing decisions and static edges. The run
//! completes when the frontier is empty or holds only `End`.

use std::fmt;

use futures_util::future::join_all;
use miette::Diagnostic;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::command::RoutingDecision;
use crate::events::ProgressEmitter;
use crate::graph::GraphDefinitionError;
use crate::node::{NodeContext, NodeError, NodeOutcome};
use crate::reducers::ChannelError;
use crate::state::WorkflowState;
use crate::types::NodeKind;
use crate::workflow::Workflow;

/// One scheduled node invocation: the node plus its private seed.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierEntry {
    pub node: NodeKind,
    pub seed: Option<Value>,
}

impl FrontierEntry {
    #[must_use]
    pub fn new(node: NodeKind) -> Self {
        Self { node, seed: None }
    }

    #[must_use]
    pub fn with_seed(node: NodeKind, seed: Value) -> Self {
        Self {
            node,
            seed: Some(seed),
        }
    }
}

impl From<NodeKind> for FrontierEntry {
    fn from(node: NodeKind) -> Self {
        Self::new(node)
    }
}

/// Result of one superstep.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub step: u64,
    pub ran_nodes: Vec<NodeKind>,
    pub updated_fields: Vec<String>,
    pub next_frontier: Vec<FrontierEntry>,
    pub completed: bool,
}

/// Fatal mid-run failures.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    #[error("node {node} failed at step {step}: {source}")]
    #[diagnostic(code(stepgraph::executor::node_run))]
    NodeRun {
        node: String,
        step: u64,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphDefinitionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Barrier(#[from] ChannelError),
}

/// A failed run: the triggering node and step, the underlying error, and the
/// partially updated state for diagnostics (plan entries and notes written
/// before the failure stay readable).
#[derive(Debug)]
pub struct RunError {
    pub node: Option<String>,
    pub step: u64,
    pub source: ExecutorError,
    pub partial: Box<WorkflowState>,
}

impl RunError {
    /// State accumulated up to the failure.
    #[must_use]
    pub fn partial_state(&self) -> &WorkflowState {
        &self.partial
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workflow run failed at step {}", self.step)?;
        if let Some(node) = &self.node {
            write!(f, " in node {node}")?;
        }
        write!(f, ": {}", self.source)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Drives one workflow instance to completion.
///
/// The executor exclusively owns the [`WorkflowState`] for the lifetime of
/// the run; embedded sub-workflows get their own executor over their own
/// state namespace.
pub struct Executor {
    workflow: Arc<Workflow>,
    emitter: ProgressEmitter,
    state: WorkflowState,
    frontier: Vec<FrontierEntry>,
    step: u64,
}

impl Executor {
    /// Creates an executor positioned at the graph's entry frontier
    /// (the static successors of `Start`).
    #[must_use]
    pub fn new(workflow: Arc<Workflow>, initial: WorkflowState, emitter: ProgressEmitter) -> Self {
        let frontier = workflow
            .edges()
            .get(&NodeKind::Start)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(FrontierEntry::new)
            .collect();
        Self {
            workflow,
            emitter,
            state: initial,
            frontier,
            step: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    #[must_use]
    pub fn frontier(&self) -> &[FrontierEntry] {
        &self.frontier
    }

    /// True once the frontier is empty or contains only `End`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.frontier.is_empty() || self.frontier.iter().all(|entry| entry.node.is_end())
    }

    /// Execute exactly one superstep.
    #[instrument(skip(self), fields(step = self.step + 1, frontier = self.frontier.len()))]
    pub async fn run_step(&mut self) -> Result<StepReport, ExecutorError> {
        self.step += 1;
        let step = self.step;

        // End entries carry no work; drain them while collecting runnables.
        let entries: Vec<FrontierEntry> = std::mem::take(&mut self.frontier)
            .into_iter()
            .filter(|entry| !entry.node.is_end())
            .collect();

        let snapshot = self.state.snapshot();

        let mut jobs = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(node) = self.workflow.nodes().get(&entry.node).cloned() else {
                return Err(GraphDefinitionError::UnknownRouteTarget {
                    node: "frontier".to_string(),
                    target: entry.node.to_string(),
                }
                .into());
            };
            let ctx = NodeContext::new(
                entry.node.to_string(),
                step,
                entry.seed.clone(),
                self.emitter.clone(),
            );
            let snap = snapshot.clone();
            jobs.push(async move { node.run(snap, ctx).await });
        }

        let results = join_all(jobs).await;

        let mut outcomes: Vec<(NodeKind, NodeOutcome)> = Vec::with_capacity(results.len());
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push((entry.node.clone(), outcome)),
                Err(source) => {
                    return Err(ExecutorError::NodeRun {
                        node: entry.node.to_string(),
                        step,
                        source,
                    });
                }
            }
        }

        let deltas = outcomes
            .iter()
            .map(|(_, outcome)| outcome.delta.clone())
            .collect();
        let updated_fields = self.workflow.apply_barrier(&mut self.state, deltas)?;

        let next_frontier = self.compute_next_frontier(step, &outcomes)?;
        self.frontier = next_frontier.clone();
        let completed = self.is_complete();

        tracing::debug!(
            step,
            updated = ?updated_fields,
            next = self.frontier.len(),
            completed,
            "superstep finished"
        );

        Ok(StepReport {
            step,
            ran_nodes: outcomes.into_iter().map(|(kind, _)| kind).collect(),
            updated_fields,
            next_frontier,
            completed,
        })
    }

    /// Run supersteps until the frontier terminates, returning the final
    /// state or a [`RunError`] with the partial state attached.
    pub async fn run_until_complete(mut self) -> Result<WorkflowState, RunError> {
        loop {
            if self.is_complete() {
                return Ok(self.state);
            }
            match self.run_step().await {
                Ok(report) => {
                    if report.completed {
                        return Ok(self.state);
                    }
                }
                Err(source) => {
                    let node = match &source {
                        ExecutorError::NodeRun { node, .. } => Some(node.clone()),
                        _ => None,
                    };
                    return Err(RunError {
                        node,
                        step: self.step,
                        source,
                        partial: Box::new(self.state),
                    });
                }
            }
        }
    }

    /// Translate routing decisions and static edges into the next frontier.
    ///
    /// A single-entry superstep honors the node's decision; in a multi-entry
    /// superstep (fan-out branches or a parallel entry frontier) branch
    /// directives are ignored with a warning and the frontier is the
    /// deduplicated union of static successors — which is exactly the join
    /// semantics: a successor shared by all branches runs once, after the
    /// barrier.
    fn compute_next_frontier(
        &self,
        step: u64,
        outcomes: &[(NodeKind, NodeOutcome)],
    ) -> Result<Vec<FrontierEntry>, ExecutorError> {
        if outcomes.is_empty() {
            return Ok(Vec::new());
        }

        if outcomes.len() == 1 {
            let (origin, outcome) = &outcomes[0];
            return match &outcome.route {
                Some(RoutingDecision::Goto { target, seed }) => {
                    self.require_target(origin, target)?;
                    Ok(vec![FrontierEntry {
                        node: target.clone(),
                        seed: seed.clone(),
                    }])
                }
                Some(RoutingDecision::FanOut(sends)) => {
                    if sends.is_empty() {
                        tracing::warn!(step, origin = %origin, "empty fan-out; treating as End");
                        return Ok(Vec::new());
                    }
                    let mut next = Vec::with_capacity(sends.len());
                    for send in sends {
                        self.require_target(origin, &send.target)?;
                        next.push(FrontierEntry {
                            node: send.target.clone(),
                            seed: send.seed.clone(),
                        });
                    }
                    Ok(next)
                }
                Some(RoutingDecision::End) => Ok(Vec::new()),
                None => Ok(self.static_successors(std::slice::from_ref(origin))),
            };
        }

        for (origin, outcome) in outcomes {
            if outcome.route.is_some() {
                tracing::warn!(
                    step,
                    origin = %origin,
                    "routing decision from a fan-out branch is ignored; \
                     branch-local control flow belongs in an embedded sub-workflow"
                );
            }
        }
        let distinct: Vec<NodeKind> = {
            let mut seen = Vec::new();
            for (origin, _) in outcomes {
                if !seen.contains(origin) {
                    seen.push(origin.clone());
                }
            }
            seen
        };
        Ok(self.static_successors(&distinct))
    }

    fn static_successors(&self, origins: &[NodeKind]) -> Vec<FrontierEntry> {
        let mut next: Vec<FrontierEntry> = Vec::new();
        let mut seen: Vec<NodeKind> = Vec::new();
        for origin in origins {
            for target in self
                .workflow
                .edges()
                .get(origin)
                .map(Vec::as_slice)
                .unwrap_or_default()
            {
                if !seen.contains(target) {
                    seen.push(target.clone());
                    next.push(FrontierEntry::new(target.clone()));
                }
            }
        }
        next
    }

    fn require_target(&self, origin: &NodeKind, target: &NodeKind) -> Result<(), ExecutorError> {
        let known = match target {
            NodeKind::End => true,
            NodeKind::Start => false,
            NodeKind::Custom(_) => self.workflow.nodes().contains_key(target),
        };
        if known {
            Ok(())
        } else {
            Err(GraphDefinitionError::UnknownRouteTarget {
                node: origin.to_string(),
                target: target.to_string(),
            }
            .into())
        }
    }
}
