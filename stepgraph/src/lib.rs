//! # Stepgraph: Graph-driven Workflow Engine
//!
//! Stepgraph executes graph-structured workflows over reducer-merged channel
//! state. A workflow is a set of named nodes connected by static edges and
//! dynamic routing decisions; the engine drives supersteps over the current
//! frontier, merges every node's partial state update through declared
//! channel reducers at a barrier, and follows routing until a terminal
//! frontier is reached.
//!
//! ## Core Concepts
//!
//! - **Channels**: every state field is declared with a merge strategy
//!   (`Replace`, `Append`, `MergeMap`, `Accumulate`) before anything writes it
//! - **Nodes**: async units of work that read a [`state::StateSnapshot`] and
//!   return a [`node::NodeOutcome`] (state delta + optional routing decision)
//! - **Fan-out / join**: a node can schedule many concurrent instances, each
//!   with a private seed; the barrier waits for all of them before merging
//! - **Sub-workflows**: a compiled [`workflow::Workflow`] can be embedded as a
//!   node of a parent graph with explicit input/export projections
//! - **Progress events**: nodes emit fire-and-forget [`events::ProgressEvent`]s;
//!   with no sink attached they are silently dropped
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::json;
//! use stepgraph::graph::GraphBuilder;
//! use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
//! use stepgraph::reducers::Append;
//! use stepgraph::state::StateSnapshot;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Node for Greeter {
//!     async fn run(
//!         &self,
//!         _snapshot: StateSnapshot,
//!         _ctx: NodeContext,
//!     ) -> Result<NodeOutcome, NodeError> {
//!         Ok(NodeOutcome::new().update("log", json!(["hello"])))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = GraphBuilder::new()
//!     .add_channel("log", Arc::new(Append))
//!     .add_node("greet", Greeter)
//!     .add_edge("Start", "greet")
//!     .add_edge("greet", "End")
//!     .compile()?;
//!
//! let final_state = workflow.invoke(workflow.initial_state()).await?;
//! assert_eq!(final_state.get("log"), Some(&json!(["hello"])));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`message`] - Conversation message primitive for Append channels
//! - [`state`] - Channel-backed state container and snapshots
//! - [`reducers`] - Merge strategies and the per-field channel registry
//! - [`node`] - Node trait, execution context, and outcomes
//! - [`command`] - Routing decisions returned by nodes
//! - [`graph`] - Workflow definition and compile-time validation
//! - [`workflow`] - Compiled workflows and barrier merges
//! - [`runtime`] - The superstep executor
//! - [`subgraph`] - Embedding compiled workflows as parent nodes
//! - [`events`] - Progress event bus and sinks

pub mod channels;
pub mod command;
pub mod events;
pub mod graph;
pub mod message;
pub mod node;
pub mod reducers;
pub mod runtime;
pub mod state;
pub mod subgraph;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod workflow;
