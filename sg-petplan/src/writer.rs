//! The note-writing step.
//!
//! Two branches run from the entry frontier in parallel: `write` forces a
//! `write_note` action out of the write model and `write_tool` executes it
//! into the shared note store, while `summary` digests the task result into a
//! tool message for the parent transcript. Only the notes and the summary
//! message are exported; the forced-action scratch is discarded.

use std::sync::Arc;

use async_trait::async_trait;

use stepgraph::graph::{GraphBuilder, GraphDefinitionError};
use stepgraph::message::Message;
use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::reducers::{Append, MergeMap, Replace};
use stepgraph::state::StateSnapshot;
use stepgraph::subgraph::SubGraphSpec;
use stepgraph::workflow::Workflow;

use crate::actions::{
    ActionError, ActionRegistry, UpdateNote, WRITE_NOTE, WriteNote, action_message,
};
use crate::config::AgentConfig;
use crate::fields;
use crate::llm::{ActionRequest, ChatRequest, ModelClient, ModelReply};
use crate::progress::{ProgressStage, progress};
use crate::prompts;

pub const WRITE: &str = "write";
pub const WRITE_TOOL: &str = "write_tool";
pub const SUMMARY: &str = "summary";

fn latest_task_result(snapshot: &StateSnapshot) -> Result<String, NodeError> {
    let history = fields::messages(snapshot, fields::TASK_HISTORY)?;
    history
        .last()
        .map(|message| message.content.clone())
        .ok_or(NodeError::MissingInput {
            what: "task_history",
        })
}

/// Forces a `write_note` action recording the latest task result.
pub struct WriteNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    actions: Vec<crate::llm::ActionSpec>,
}

impl WriteNode {
    #[must_use]
    pub fn new(
        config: Arc<AgentConfig>,
        model: Arc<dyn ModelClient>,
        registry: &ActionRegistry,
    ) -> Self {
        Self {
            config,
            model,
            actions: registry.specs(),
        }
    }
}

#[async_trait]
impl Node for WriteNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let task_result = latest_task_result(&snapshot)?;
        ctx.emit_progress(progress(ProgressStage::NoteSaving, "recording task result"));

        let request = ChatRequest::new(
            &self.config.write_model,
            vec![Message::user(prompts::write_note_prompt(&task_result))],
        )
        .with_actions(self.actions.clone())
        .with_forced_action(WRITE_NOTE);

        let reply = self
            .model
            .invoke(request)
            .await
            .map_err(|err| NodeError::Provider {
                provider: "model",
                message: err.to_string(),
            })?;

        let ModelReply::Action(action) = reply else {
            return Err(NodeError::ValidationFailed(
                "write model ignored the forced write_note action".into(),
            ));
        };

        Ok(NodeOutcome::new()
            .update(
                fields::SCRATCH,
                serde_json::to_value(vec![action_message(&action)])?,
            )
            .update(fields::PENDING_ACTION, serde_json::to_value(&action)?))
    }
}

/// Executes the pending note write into the shared store.
pub struct WriteToolNode {
    registry: Arc<ActionRegistry>,
}

impl WriteToolNode {
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Node for WriteToolNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let pending: Option<ActionRequest> = snapshot.get_as_opt(fields::PENDING_ACTION)?;
        let Some(request) = pending else {
            return Err(NodeError::MissingInput {
                what: "pending_action",
            });
        };

        match self
            .registry
            .execute(&request.name, request.arguments.clone(), &snapshot)
            .await
        {
            Ok(outcome) => {
                ctx.emit_progress(progress(ProgressStage::NoteSaved, outcome.reply.clone()));
                let mut result = NodeOutcome::new().with_delta(outcome.delta);
                result.delta.insert(
                    fields::SCRATCH.into(),
                    serde_json::to_value(vec![Message::tool(outcome.reply)])?,
                );
                result
                    .delta
                    .insert(fields::PENDING_ACTION.into(), serde_json::Value::Null);
                Ok(result)
            }
            Err(ActionError::Invalid(message)) => Err(NodeError::ValidationFailed(format!(
                "forced note write failed: {message}"
            ))),
            Err(ActionError::Unknown(name)) => Err(NodeError::ValidationFailed(format!(
                "unknown action: {name}"
            ))),
            Err(ActionError::Provider { provider, message }) => {
                Err(NodeError::Provider { provider, message })
            }
        }
    }
}

/// Digests the task result into the parent transcript.
pub struct SummaryNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
}

impl SummaryNode {
    #[must_use]
    pub fn new(config: Arc<AgentConfig>, model: Arc<dyn ModelClient>) -> Self {
        Self { config, model }
    }
}

#[async_trait]
impl Node for SummaryNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let task_result = latest_task_result(&snapshot)?;
        ctx.emit_progress(progress(
            ProgressStage::SummaryGenerating,
            "summarizing task result",
        ));

        let request = ChatRequest::new(
            &self.config.summary_model,
            vec![Message::user(prompts::summary_prompt(&task_result))],
        );
        let reply = self
            .model
            .invoke(request)
            .await
            .map_err(|err| NodeError::Provider {
                provider: "model",
                message: err.to_string(),
            })?;

        let summary = match reply {
            ModelReply::Text(text) => text,
            ModelReply::Action(_) => {
                return Err(NodeError::ValidationFailed(
                    "summary model requested an action".into(),
                ));
            }
        };

        ctx.emit_progress(progress(ProgressStage::SummaryGenerated, "summary ready"));
        Ok(NodeOutcome::new().update(
            fields::TRANSCRIPT,
            serde_json::to_value(vec![Message::tool(format!(
                "Task complete! Result summary: {summary}"
            ))])?,
        ))
    }
}

/// Compiles the note-writing workflow.
pub fn build_writer_workflow(
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
) -> Result<Workflow, GraphDefinitionError> {
    let registry = Arc::new(ActionRegistry::new().register(WriteNote).register(UpdateNote));

    GraphBuilder::new()
        .add_channel(fields::TASK_HISTORY, Arc::new(Append))
        .add_channel(fields::NOTES, Arc::new(MergeMap))
        .add_channel(fields::TRANSCRIPT, Arc::new(Append))
        .add_channel(fields::SCRATCH, Arc::new(Append))
        .add_channel(fields::PENDING_ACTION, Arc::new(Replace))
        .add_node(WRITE, WriteNode::new(config.clone(), model.clone(), &registry))
        .add_node(WRITE_TOOL, WriteToolNode::new(registry))
        .add_node(SUMMARY, SummaryNode::new(config, model))
        .add_edge("Start", WRITE)
        .add_edge("Start", SUMMARY)
        .add_edge(WRITE, WRITE_TOOL)
        .add_edge(SUMMARY, "End")
        .add_edge(WRITE_TOOL, "End")
        .compile()
}

/// Embedding contract: the task history and existing notes come in; the
/// updated note store and the summary message go back.
#[must_use]
pub fn writer_spec() -> SubGraphSpec {
    SubGraphSpec::new()
        .with_inputs(&[fields::TASK_HISTORY, fields::NOTES])
        .with_exports(&[fields::NOTES, fields::TRANSCRIPT])
}
