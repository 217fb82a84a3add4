//! The top-level planner/delegator workflow.
//!
//! `Start → planner`; `tools → planner`; `subagent → write_note`;
//! `write_note → planner`; `structure_report → gather`.
//!
//! The planner loops: manage the plan and notes through actions, delegate
//! each task to the embedded sub-task workflow (followed by the note-writing
//! workflow), and — once it answers without requesting an action — fan out
//! one structuring instance per stored note. The gather node closes the
//! barrier exactly once and assembles the final report.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use stepgraph::command::SendTo;
use stepgraph::graph::{GraphBuilder, GraphDefinitionError};
use stepgraph::message::Message;
use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::reducers::{Accumulate, Append, MergeMap, Replace};
use stepgraph::state::StateSnapshot;
use stepgraph::workflow::Workflow;

use crate::actions::{
    ActionExecNode, ActionRegistry, DELEGATE_TASK, ListNotes, QueryNote, UPDATE_PLAN, UpdatePlan,
    WRITE_PLAN, WritePlan, action_message, delegate_task_spec,
};
use crate::config::AgentConfig;
use crate::fields;
use crate::llm::{ActionSpec, ChatRequest, ModelClient, ModelReply};
use crate::notes::Note;
use crate::plan::estimate_progress;
use crate::progress::{ProgressStage, progress};
use crate::prompts;
use crate::providers::Providers;
use crate::report::{MonthlyDietPlan, PetDietPlan, WeeklyDietPlan};
use crate::structuring::{AssignedNote, build_structuring_workflow, structuring_spec};
use crate::subtask::{build_subtask_workflow, subtask_spec};
use crate::writer::{build_writer_workflow, writer_spec};

pub const PLANNER: &str = "planner";
pub const TOOLS: &str = "tools";
pub const SUBAGENT: &str = "subagent";
pub const WRITE_NOTE_NODE: &str = "write_note";
pub const STRUCTURE_REPORT: &str = "structure_report";
pub const GATHER: &str = "gather";

/// One structuring fan-out instance per stored note.
#[must_use]
pub fn structure_fan_out(
    target: &str,
    notes: &BTreeMap<String, Note>,
) -> Result<Vec<SendTo>, serde_json::Error> {
    notes
        .iter()
        .map(|(name, note)| {
            Ok(SendTo::with_seed(
                target,
                serde_json::to_value(AssignedNote {
                    name: name.clone(),
                    note: note.clone(),
                })?,
            ))
        })
        .collect()
}

fn model_failure(err: crate::llm::ModelError) -> NodeError {
    NodeError::Provider {
        provider: "model",
        message: err.to_string(),
    }
}

/// The planning loop node.
pub struct PlannerNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    actions: Vec<ActionSpec>,
}

impl PlannerNode {
    #[must_use]
    pub fn new(
        config: Arc<AgentConfig>,
        model: Arc<dyn ModelClient>,
        registry: &ActionRegistry,
    ) -> Self {
        let mut actions = registry.specs();
        actions.push(delegate_task_spec());
        Self {
            config,
            model,
            actions,
        }
    }
}

#[async_trait]
impl Node for PlannerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let plan = fields::plan(&snapshot)?;
        if plan.is_empty() {
            ctx.emit_progress(
                progress(
                    ProgressStage::PlanCreating,
                    "analyzing pet information and drafting the task plan",
                )
                .with_progress(5),
            );
        }

        let pet = fields::pet_information(&snapshot)?.ok_or(NodeError::MissingInput {
            what: "pet_information",
        })?;
        let pet_text = serde_json::to_string(&pet)?;
        let transcript = fields::messages(&snapshot, fields::TRANSCRIPT)?;

        let mut messages = vec![Message::system(prompts::planner_prompt(&pet_text))];
        messages.extend(transcript.iter().cloned());

        let request = ChatRequest::new(&self.config.plan_model, messages)
            .with_actions(self.actions.clone());
        let reply = self.model.invoke(request).await.map_err(model_failure)?;

        match reply {
            ModelReply::Action(action) if action.name == DELEGATE_TASK => {
                let task = action
                    .arguments
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                if task.is_empty() {
                    // Recoverable: tell the model and plan again.
                    return Ok(NodeOutcome::goto(PLANNER).update(
                        fields::TRANSCRIPT,
                        serde_json::to_value(vec![
                            action_message(&action),
                            Message::tool("action error: delegate_task requires a `content` argument"),
                        ])?,
                    ));
                }
                ctx.emit_progress(
                    progress(
                        ProgressStage::TaskDelegating,
                        format!("delegating task: {task}"),
                    )
                    .with_task(task.clone())
                    .with_progress(estimate_progress(&plan)),
                );
                Ok(NodeOutcome::goto_with_seed(SUBAGENT, json!(task)).update(
                    fields::TRANSCRIPT,
                    serde_json::to_value(vec![action_message(&action)])?,
                ))
            }
            ModelReply::Action(action) => {
                match action.name.as_str() {
                    WRITE_PLAN => ctx.emit_progress(
                        progress(ProgressStage::PlanCreated, "task plan created")
                            .with_progress(10),
                    ),
                    UPDATE_PLAN => ctx.emit_progress(
                        progress(ProgressStage::PlanUpdated, "task plan updated")
                            .with_progress(estimate_progress(&plan)),
                    ),
                    _ => {}
                }
                Ok(NodeOutcome::goto(TOOLS)
                    .update(
                        fields::TRANSCRIPT,
                        serde_json::to_value(vec![action_message(&action)])?,
                    )
                    .update(fields::PENDING_ACTION, serde_json::to_value(&action)?))
            }
            ModelReply::Text(answer) => {
                let notes = fields::notes(&snapshot)?;
                ctx.emit_progress(
                    progress(
                        ProgressStage::Gathering,
                        "all tasks complete, moving to structured parsing",
                    )
                    .with_progress(80),
                );
                let transcript_delta =
                    serde_json::to_value(vec![Message::assistant(answer)])?;
                if notes.is_empty() {
                    // Nothing to structure; close the run with an empty report.
                    return Ok(NodeOutcome::goto(GATHER)
                        .update(fields::TRANSCRIPT, transcript_delta));
                }
                let sends = structure_fan_out(STRUCTURE_REPORT, &notes)?;
                let mut outcome = NodeOutcome::fan_out(sends);
                outcome
                    .delta
                    .insert(fields::TRANSCRIPT.into(), transcript_delta);
                Ok(outcome)
            }
        }
    }
}

/// Assembles the final report after the structuring barrier closes.
pub struct GatherNode;

#[async_trait]
impl Node for GatherNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let weekly_plans: Vec<WeeklyDietPlan> = snapshot
            .get_as_opt(fields::WEEKLY_PLANS)?
            .unwrap_or_default();
        let pet = fields::pet_information(&snapshot)?.ok_or(NodeError::MissingInput {
            what: "pet_information",
        })?;
        let transcript = fields::messages(&snapshot, fields::TRANSCRIPT)?;
        let ai_suggestions = transcript
            .iter()
            .rev()
            .find(|m| m.has_role(stepgraph::message::Role::Assistant))
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "The diet plan has been generated; see the full report.".into());

        ctx.emit_progress(
            progress(
                ProgressStage::Completed,
                format!(
                    "monthly diet plan complete: {} weekly plans",
                    weekly_plans.len()
                ),
            )
            .with_detail(json!({ "total_weeks": weekly_plans.len() }))
            .with_progress(100),
        );

        let report = PetDietPlan {
            pet_information: pet,
            ai_suggestions,
            diet_plan: MonthlyDietPlan {
                weeks: weekly_plans,
            },
        };
        Ok(NodeOutcome::new().update(fields::REPORT, serde_json::to_value(report)?))
    }
}

/// Compiles the top-level planner/delegator workflow.
pub fn build_planner_workflow(
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    providers: &Providers,
) -> Result<Workflow, GraphDefinitionError> {
    let plan_registry = Arc::new(
        ActionRegistry::new()
            .register(WritePlan)
            .register(UpdatePlan)
            .register(ListNotes)
            .register(QueryNote::new()),
    );

    let subtask = build_subtask_workflow(config.clone(), model.clone(), providers)?;
    let writer = build_writer_workflow(config.clone(), model.clone())?;
    let structuring = build_structuring_workflow(config.clone(), model.clone())?;

    GraphBuilder::new()
        .add_channel(fields::TRANSCRIPT, Arc::new(Append))
        .add_channel(fields::TASK_HISTORY, Arc::new(Append))
        .add_channel(fields::PLAN, Arc::new(Replace))
        .add_channel(fields::NOTES, Arc::new(MergeMap))
        .add_channel(fields::PET_INFORMATION, Arc::new(Replace))
        .add_channel(fields::PENDING_ACTION, Arc::new(Replace))
        .add_channel(fields::WEEKLY_PLANS, Arc::new(Accumulate))
        .add_channel(fields::STRUCTURING_FAILURES, Arc::new(Accumulate))
        .add_channel(fields::REPORT, Arc::new(Replace))
        .add_node(
            PLANNER,
            PlannerNode::new(config.clone(), model.clone(), &plan_registry),
        )
        .add_node(TOOLS, ActionExecNode::new(plan_registry))
        .add_subgraph(SUBAGENT, subtask, subtask_spec())
        .add_subgraph(WRITE_NOTE_NODE, writer, writer_spec())
        .add_subgraph(STRUCTURE_REPORT, structuring, structuring_spec())
        .add_node(GATHER, GatherNode)
        .add_edge("Start", PLANNER)
        .add_edge(TOOLS, PLANNER)
        .add_edge(SUBAGENT, WRITE_NOTE_NODE)
        .add_edge(WRITE_NOTE_NODE, PLANNER)
        .add_edge(STRUCTURE_REPORT, GATHER)
        .compile()
}
