//! The delegated sub-task execution loop.
//!
//! `Start → executor`, `sub_tools → executor`. The executor prompts the sub
//! model with the delegated task; every requested action is executed and its
//! result appended to a private scratch transcript, looping until the model
//! replies with a final answer. The full exchange plus the answer is then
//! exported to the parent's task-history channel.

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
    ActionExecNode, ActionRegistry, QueryNote, WEB_SEARCH, Weather, WebSearch, action_message,
};
use crate::config::AgentConfig;
use crate::fields;
use crate::llm::{ChatRequest, ModelClient, ModelReply};
use crate::progress::{ProgressStage, progress};
use crate::prompts;
use crate::providers::Providers;

pub const EXECUTOR: &str = "executor";
pub const SUB_TOOLS: &str = "sub_tools";

/// The task execution loop node.
pub struct SubTaskNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    actions: Vec<crate::llm::ActionSpec>,
}

impl SubTaskNode {
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
impl Node for SubTaskNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let task: String = snapshot
            .get_as_opt(fields::TASK)?
            .ok_or(NodeError::MissingInput { what: "task" })?;
        let scratch = fields::messages(&snapshot, fields::SCRATCH)?;

        if scratch.is_empty() {
            ctx.emit_progress(
                progress(
                    ProgressStage::TaskExecuting,
                    format!("executing task: {task}"),
                )
                .with_task(task.clone()),
            );
        }

        let notes = fields::notes(&snapshot)?;
        let note_listing = if notes.is_empty() {
            "(no notes yet)".to_string()
        } else {
            notes
                .keys()
                .map(|name| format!("- {name}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let transcript = fields::messages(&snapshot, fields::TRANSCRIPT)?;
        let user_requirement = transcript
            .iter()
            .find(|m| m.has_role(stepgraph::message::Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut messages = vec![
            Message::system(prompts::subtask_prompt(
                &task,
                &note_listing,
                &user_requirement,
            )),
            Message::user(format!("My task is: {task}. Please complete it.")),
        ];
        messages.extend(scratch.iter().cloned());

        let request = ChatRequest::new(&self.config.sub_model, messages)
            .with_actions(self.actions.clone());
        let reply = self
            .model
            .invoke(request)
            .await
            .map_err(|err| NodeError::Provider {
                provider: "model",
                message: err.to_string(),
            })?;

        match reply {
            ModelReply::Action(request) => {
                let stage = match request.name.as_str() {
                    WEB_SEARCH => Some((ProgressStage::TaskSearching, "searching the web")),
                    crate::actions::QUERY_NOTE => {
                        Some((ProgressStage::TaskQueryingNote, "reading notes"))
                    }
                    _ => None,
                };
                if let Some((stage, message)) = stage {
                    ctx.emit_progress(progress(stage, message).with_task(task.clone()));
                }
                Ok(NodeOutcome::goto(SUB_TOOLS)
                    .update(
                        fields::SCRATCH,
                        serde_json::to_value(vec![action_message(&request)])?,
                    )
                    .update(fields::PENDING_ACTION, serde_json::to_value(&request)?))
            }
            ModelReply::Text(answer) => {
                ctx.emit_progress(
                    progress(ProgressStage::TaskCompleted, "task completed")
                        .with_task(task.clone()),
                );
                let mut history = scratch;
                history.push(Message::assistant(answer));
                let mut outcome = NodeOutcome::end();
                outcome.delta.insert(
                    fields::TASK_HISTORY.into(),
                    serde_json::to_value(&history)?,
                );
                Ok(outcome)
            }
        }
    }
}

/// Compiles the sub-task workflow.
pub fn build_subtask_workflow(
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    providers: &Providers,
) -> Result<Workflow, GraphDefinitionError> {
    let registry = Arc::new(
        ActionRegistry::new()
            .register(WebSearch::new(providers.search.clone()))
            .register(Weather::new(providers.weather.clone()))
            .register(QueryNote::new()),
    );

    GraphBuilder::new()
        .add_channel(fields::TASK, Arc::new(Replace))
        .add_channel(fields::SCRATCH, Arc::new(Append))
        .add_channel(fields::TASK_HISTORY, Arc::new(Append))
        .add_channel(fields::TRANSCRIPT, Arc::new(Append))
        .add_channel(fields::NOTES, Arc::new(MergeMap))
        .add_channel(fields::PET_INFORMATION, Arc::new(Replace))
        .add_channel(fields::PENDING_ACTION, Arc::new(Replace))
        .add_node(EXECUTOR, SubTaskNode::new(config, model, &registry))
        .add_node(
            SUB_TOOLS,
            ActionExecNode::new(registry).with_transcript_field(fields::SCRATCH),
        )
        .add_edge("Start", EXECUTOR)
        .add_edge(SUB_TOOLS, EXECUTOR)
        .compile()
}

/// Embedding contract: the parent projects its transcript, notes, and pet
/// profile in (read-only context); only the task history comes back.
#[must_use]
pub fn subtask_spec() -> SubGraphSpec {
    SubGraphSpec::new()
        .with_inputs(&[fields::TRANSCRIPT, fields::NOTES, fields::PET_INFORMATION])
        .with_exports(&[fields::TASK_HISTORY])
        .with_seed_field(fields::TASK)
}
