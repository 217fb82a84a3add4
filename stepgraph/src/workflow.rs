//! Compiled workflows and barrier merges.
//!
//! A [`Workflow`] is the executable form of a graph: node and edge
//! registries plus the channel registry that governs how partial updates
//! merge. `invoke*` methods drive one run to completion through the
//! [`Executor`](crate::runtime::Executor).

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::events::{ChannelSink, Event, EventSink, ProgressBus, RUN_END_SCOPE};
use crate::node::Node;
use crate::reducers::{ChannelError, ChannelRegistry};
use crate::runtime::{Executor, RunError};
use crate::state::{StateDelta, WorkflowState};
use crate::types::NodeKind;

/// An executable workflow graph.
///
/// Cloning is cheap enough for embedding: nodes are shared behind `Arc`.
#[derive(Clone)]
pub struct Workflow {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    registry: ChannelRegistry,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes: Vec<String> = self.nodes.keys().map(ToString::to_string).collect();
        nodes.sort_unstable();
        f.debug_struct("Workflow")
            .field("nodes", &nodes)
            .field("edges", &self.edges.len())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Workflow {
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
        edges: FxHashMap<NodeKind, Vec<NodeKind>>,
        registry: ChannelRegistry,
    ) -> Self {
        Self {
            nodes,
            edges,
            registry,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &FxHashMap<NodeKind, Vec<NodeKind>> {
        &self.edges
    }

    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// A fresh state with every declared field at its zero value. Seed the
    /// run's inputs with [`WorkflowState::set`] before invoking.
    #[must_use]
    pub fn initial_state(&self) -> WorkflowState {
        WorkflowState::for_registry(&self.registry)
    }

    /// Execute the workflow to completion with no observer attached.
    ///
    /// Progress events are silently dropped; the final state (or a
    /// [`RunError`] carrying the partial state) is identical to an observed
    /// run.
    #[instrument(skip(self, initial_state))]
    pub async fn invoke(&self, initial_state: WorkflowState) -> Result<WorkflowState, RunError> {
        self.invoke_with_bus(initial_state, ProgressBus::new()).await
    }

    /// Execute with the given sinks attached to a fresh bus.
    pub async fn invoke_with_sinks(
        &self,
        initial_state: WorkflowState,
        sinks: Vec<Box<dyn EventSink>>,
    ) -> Result<WorkflowState, RunError> {
        self.invoke_with_bus(initial_state, ProgressBus::with_sinks(sinks))
            .await
    }

    /// Execute while streaming every event to a channel.
    ///
    /// Returns the run result together with the receiving half; the channel
    /// closes after the [`RUN_END_SCOPE`] diagnostic.
    pub async fn invoke_with_channel(
        &self,
        initial_state: WorkflowState,
    ) -> (
        Result<WorkflowState, RunError>,
        tokio::sync::mpsc::UnboundedReceiver<Event>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bus = ProgressBus::with_sink(ChannelSink::new(tx));
        let result = self.invoke_with_bus(initial_state, bus).await;
        (result, rx)
    }

    /// Execute on a caller-configured bus. The bus is consumed: it is shut
    /// down (drained) once the run finishes.
    pub async fn invoke_with_bus(
        &self,
        initial_state: WorkflowState,
        bus: ProgressBus,
    ) -> Result<WorkflowState, RunError> {
        bus.listen_for_events();
        let run_id = uuid::Uuid::new_v4();
        let emitter = bus.emitter();

        tracing::info!(%run_id, "workflow run started");
        let executor = Executor::new(Arc::new(self.clone()), initial_state, emitter.clone());
        let result = executor.run_until_complete().await;

        let end_message = match &result {
            Ok(_) => format!("run={run_id} status=completed"),
            Err(err) => format!("run={run_id} status=error error={err}"),
        };
        emitter.emit(Event::diagnostic(RUN_END_SCOPE, end_message));
        match &result {
            Ok(_) => tracing::info!(%run_id, "workflow run completed"),
            Err(err) => tracing::error!(%run_id, error = %err, "workflow run failed"),
        }

        drop(emitter);
        bus.shutdown().await;
        result
    }

    /// Merge node deltas into the state at a barrier.
    ///
    /// Deltas arrive in superstep scheduling order, but channels receiving
    /// concurrent branch output must be commutative, so the merged result is
    /// independent of branch completion order. Versions bump once per field
    /// whose content changed. Returns the changed field names.
    #[instrument(skip_all, fields(deltas = deltas.len()))]
    pub(crate) fn apply_barrier(
        &self,
        state: &mut WorkflowState,
        deltas: Vec<StateDelta>,
    ) -> Result<Vec<String>, ChannelError> {
        let mut originals: FxHashMap<String, serde_json::Value> = FxHashMap::default();
        let mut touched: Vec<String> = Vec::new();

        for delta in deltas {
            // Sort keys so barrier application order is stable across runs.
            let mut entries: Vec<(String, serde_json::Value)> = delta.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            for (field, new_value) in entries {
                let old = state
                    .get(&field)
                    .cloned()
                    .or_else(|| self.registry.zero(&field))
                    .unwrap_or(serde_json::Value::Null);
                if !originals.contains_key(&field) {
                    originals.insert(field.clone(), old.clone());
                    touched.push(field.clone());
                }
                let combined = self.registry.combine(&field, old, new_value)?;
                state.set(field, combined);
            }
        }

        let mut updated = Vec::new();
        for field in touched {
            let changed = state.get(&field) != originals.get(&field);
            if changed {
                state.bump_version(&field);
                tracing::debug!(
                    field = %field,
                    version = state.version(&field),
                    "channel updated"
                );
                updated.push(field);
            }
        }
        Ok(updated)
    }
}
