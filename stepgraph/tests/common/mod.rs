//! Shared test nodes and helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};

use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::state::StateSnapshot;

/// Appends one string to an `Append`/`Accumulate` array field.
pub struct AppendValue {
    pub field: &'static str,
    pub value: &'static str,
}

#[async_trait]
impl Node for AppendValue {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        Ok(NodeOutcome::new().update(self.field, json!([self.value])))
    }
}

/// Routes to a fixed target, appending a marker on the way.
pub struct GotoValue {
    pub field: &'static str,
    pub value: &'static str,
    pub target: &'static str,
}

#[async_trait]
impl Node for GotoValue {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        Ok(NodeOutcome::goto(self.target).update(self.field, json!([self.value])))
    }
}

/// Always fails.
pub struct Failing;

#[async_trait]
impl Node for Failing {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        Err(NodeError::ValidationFailed("boom".into()))
    }
}

/// Sleeps for the duration named in its seed, then appends the seed id to an
/// output field. Used to force fan-out branches to complete out of dispatch
/// order.
pub struct DelayedWorker {
    pub output_field: &'static str,
}

#[async_trait]
impl Node for DelayedWorker {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let seed = ctx.seed().cloned().unwrap_or(Value::Null);
        let delay_ms = seed.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
        let id = seed.get("id").cloned().unwrap_or(Value::Null);
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        Ok(NodeOutcome::new().update(self.output_field, json!([id])))
    }
}
