//! The batch coordination variant.
//!
//! Phase 1 (sequential): a research-only planning loop delegates research
//! tasks and, on `finalize_research`, distills a [`CoordinationGuide`] from
//! the notes. Phase 2 (parallel): `dispatch_weeks` emits exactly
//! [`WEEK_COUNT`] seeds — one per assignment — into the week-worker
//! sub-workflow. Phase 3: after the join, every stored note goes through the
//! structuring workflow and `gather` assembles the report.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use stepgraph::command::SendTo;
use stepgraph::graph::{GraphBuilder, GraphDefinitionError};
use stepgraph::message::Message;
use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::reducers::{Accumulate, Append, MergeMap, Replace};
use stepgraph::state::StateSnapshot;
use stepgraph::subgraph::SubGraphSpec;
use stepgraph::workflow::Workflow;

use crate::actions::{
    Action, ActionError, ActionExecNode, ActionOutcome, ActionRegistry, DELEGATE_TASK,
    FINALIZE_RESEARCH, ListNotes, QueryNote, UPDATE_PLAN, UpdatePlan, WEB_SEARCH, WRITE_PLAN,
    WebSearch, WritePlan, action_message, delegate_task_spec, finalize_research_spec, note_entry,
};
use crate::config::AgentConfig;
use crate::coordination::{CoordinationGuide, WeekAssignment, coordination_guide_schema};
use crate::fields;
use crate::llm::{ActionRequest, ActionSpec, ChatRequest, ModelClient, ModelError, ModelReply};
use crate::notes::Note;
use crate::plan::{PlanItem, PlanStatus};
use crate::planner::{GatherNode, structure_fan_out};
use crate::progress::{ProgressStage, progress};
use crate::prompts;
use crate::providers::Providers;
use crate::structuring::{build_structuring_workflow, structuring_spec};
use crate::subtask::{build_subtask_workflow, subtask_spec};
use crate::writer::{build_writer_workflow, writer_spec};

pub const RESEARCH_PLANNER: &str = "research_planner";
pub const RESEARCH_TOOLS: &str = "research_tools";
pub const RESEARCH_SUBAGENT: &str = "research_subagent";
pub const RESEARCH_WRITE: &str = "research_write";
pub const DISPATCH_WEEKS: &str = "dispatch_weeks";
pub const WEEK_AGENT: &str = "week_agent";
pub const COLLECT_WEEKS: &str = "collect_weeks";
pub const STRUCTURE_REPORT: &str = "structure_report";
pub const GATHER: &str = "gather";

pub const WEEK_PLANNER: &str = "week_planner";
pub const WEEK_TOOLS: &str = "week_tools";
pub const WEEK_WRITE: &str = "week_write";
pub const WEEK_WRITE_TOOL: &str = "week_write_tool";
pub const WEEK_WRITE_NOTE: &str = "week_write_note";

/// Everything one week worker needs, bundled into its seed. Workers never
/// see sibling assignments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeekSeed {
    pub assignment: WeekAssignment,
    pub shared_constraints: Vec<String>,
    pub ingredient_rotation_strategy: String,
    pub age_adaptation_note: String,
}

/// Research-phase progress estimate (5–25 band).
#[must_use]
pub fn estimate_research_progress(plan: &[PlanItem]) -> u8 {
    if plan.is_empty() {
        return 5;
    }
    let total = plan.len() as u64;
    let done = plan
        .iter()
        .filter(|item| item.status == PlanStatus::Done)
        .count() as u64;
    (5 + (20 * done / total)).clamp(5, 25) as u8
}

fn week_base_progress(week_number: u32) -> u8 {
    (30 + week_number.saturating_sub(1) * 12).min(78) as u8
}

fn model_failure(err: ModelError) -> NodeError {
    NodeError::Provider {
        provider: "model",
        message: err.to_string(),
    }
}

/// Phase-1 planning loop: research only, terminated by `finalize_research`.
pub struct ResearchPlannerNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    actions: Vec<ActionSpec>,
}

impl ResearchPlannerNode {
    #[must_use]
    pub fn new(
        config: Arc<AgentConfig>,
        model: Arc<dyn ModelClient>,
        registry: &ActionRegistry,
    ) -> Self {
        let mut actions = registry.specs();
        actions.push(delegate_task_spec());
        actions.push(finalize_research_spec());
        Self {
            config,
            model,
            actions,
        }
    }

    /// One-shot structured extraction of the coordination guide from the
    /// accumulated research notes. No retry loop here: a malformed guide is
    /// fatal, unlike per-note structuring.
    async fn generate_guide(
        &self,
        snapshot: &StateSnapshot,
        pet_text: &str,
    ) -> Result<CoordinationGuide, NodeError> {
        let notes = fields::notes(snapshot)?;
        let mut research_notes = String::new();
        for (name, note) in &notes {
            research_notes.push_str(&format!("\n### {name}\n{}\n", note.content));
        }
        if research_notes.is_empty() {
            research_notes = "(no research notes)".to_string();
        }

        let request = ChatRequest::new(
            &self.config.plan_model,
            vec![
                Message::system(prompts::coordination_guide_prompt(pet_text, &research_notes)),
                Message::user(
                    "Generate the four-week differentiated diet plan coordination guide \
                     from the research above.",
                ),
            ],
        )
        .with_response_schema(coordination_guide_schema());

        let raw = match self.model.invoke(request).await.map_err(model_failure)? {
            ModelReply::Text(raw) => raw,
            ModelReply::Action(_) => {
                return Err(NodeError::ValidationFailed(
                    "coordination extraction returned an action instead of JSON".into(),
                ));
            }
        };
        let guide: CoordinationGuide = serde_json::from_str(&raw)?;
        guide.validate().map_err(NodeError::ValidationFailed)?;
        Ok(guide)
    }
}

#[async_trait]
impl Node for ResearchPlannerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let plan = fields::plan(&snapshot)?;
        if plan.is_empty() {
            ctx.emit_progress(
                progress(
                    ProgressStage::ResearchStarting,
                    "analyzing pet information and drafting the research plan",
                )
                .with_progress(2),
            );
        }

        let pet = fields::pet_information(&snapshot)?.ok_or(NodeError::MissingInput {
            what: "pet_information",
        })?;
        let pet_text = serde_json::to_string(&pet)?;
        let transcript = fields::messages(&snapshot, fields::TRANSCRIPT)?;

        let mut messages = vec![Message::system(prompts::research_planner_prompt(&pet_text))];
        messages.extend(transcript.iter().cloned());

        let request = ChatRequest::new(&self.config.plan_model, messages)
            .with_actions(self.actions.clone());
        let reply = self.model.invoke(request).await.map_err(model_failure)?;

        match reply {
            ModelReply::Action(action) if action.name == FINALIZE_RESEARCH => {
                ctx.emit_progress(
                    progress(
                        ProgressStage::ResearchFinalizing,
                        "research complete, deriving the four-week coordination guide",
                    )
                    .with_progress(25),
                );
                let guide = self.generate_guide(&snapshot, &pet_text).await?;
                Ok(NodeOutcome::goto(DISPATCH_WEEKS)
                    .update(
                        fields::TRANSCRIPT,
                        serde_json::to_value(vec![
                            action_message(&action),
                            Message::tool("research phase finalized"),
                        ])?,
                    )
                    .update(fields::COORDINATION_GUIDE, serde_json::to_value(guide)?))
            }
            ModelReply::Action(action) if action.name == DELEGATE_TASK => {
                let task = action
                    .arguments
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                if task.is_empty() {
                    return Ok(NodeOutcome::goto(RESEARCH_PLANNER).update(
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
                        format!("delegating research task: {task}"),
                    )
                    .with_task(task.clone())
                    .with_progress(estimate_research_progress(&plan)),
                );
                Ok(NodeOutcome::goto_with_seed(RESEARCH_SUBAGENT, json!(task)).update(
                    fields::TRANSCRIPT,
                    serde_json::to_value(vec![action_message(&action)])?,
                ))
            }
            ModelReply::Action(action) => {
                match action.name.as_str() {
                    WRITE_PLAN => ctx.emit_progress(
                        progress(ProgressStage::PlanCreated, "research plan created")
                            .with_progress(5),
                    ),
                    UPDATE_PLAN => ctx.emit_progress(
                        progress(ProgressStage::PlanUpdated, "research progress updated")
                            .with_progress(estimate_research_progress(&plan)),
                    ),
                    _ => {}
                }
                Ok(NodeOutcome::goto(RESEARCH_TOOLS)
                    .update(
                        fields::TRANSCRIPT,
                        serde_json::to_value(vec![action_message(&action)])?,
                    )
                    .update(fields::PENDING_ACTION, serde_json::to_value(&action)?))
            }
            ModelReply::Text(answer) => {
                // Research winding down without an explicit finalize: derive
                // the guide and dispatch anyway.
                ctx.emit_progress(
                    progress(
                        ProgressStage::ResearchFinalizing,
                        "research complete, deriving the four-week coordination guide",
                    )
                    .with_progress(25),
                );
                let guide = self.generate_guide(&snapshot, &pet_text).await?;
                Ok(NodeOutcome::goto(DISPATCH_WEEKS)
                    .update(
                        fields::TRANSCRIPT,
                        serde_json::to_value(vec![Message::assistant(answer)])?,
                    )
                    .update(fields::COORDINATION_GUIDE, serde_json::to_value(guide)?))
            }
        }
    }
}

/// Pure logic node: one seed per assignment, dispatched in parallel.
pub struct DispatchWeeksNode;

#[async_trait]
impl Node for DispatchWeeksNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let guide: CoordinationGuide = snapshot
            .get_as_opt(fields::COORDINATION_GUIDE)?
            .ok_or(NodeError::MissingInput {
                what: "coordination_guide",
            })?;

        ctx.emit_progress(
            progress(
                ProgressStage::Dispatching,
                "dispatching the four weekly plan tasks (parallel)",
            )
            .with_progress(30),
        );

        let mut sends = Vec::with_capacity(guide.weekly_assignments.len());
        for assignment in &guide.weekly_assignments {
            let seed = WeekSeed {
                assignment: assignment.clone(),
                shared_constraints: guide.shared_constraints.clone(),
                ingredient_rotation_strategy: guide.ingredient_rotation_strategy.clone(),
                age_adaptation_note: guide.age_adaptation_note.clone(),
            };
            sends.push(SendTo::with_seed(WEEK_AGENT, serde_json::to_value(seed)?));
        }
        Ok(NodeOutcome::fan_out(sends))
    }
}

/// One week worker's planning loop: query shared notes, search once, then
/// produce the full plan text.
pub struct WeekPlannerNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    actions: Vec<ActionSpec>,
}

impl WeekPlannerNode {
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
impl Node for WeekPlannerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let seed: WeekSeed =
            snapshot
                .get_as_opt(fields::WEEK_SEED)?
                .ok_or(NodeError::MissingInput {
                    what: "week_seed",
                })?;
        let week = seed.assignment.week_number;
        let task_name = format!("week {week} diet plan");

        let history = fields::messages(&snapshot, fields::WEEK_TRANSCRIPT)?;
        if history.is_empty() {
            ctx.emit_progress(
                progress(
                    ProgressStage::WeekPlanning,
                    format!("week {week}: drafting the diet plan"),
                )
                .with_task(task_name.clone())
                .with_progress(week_base_progress(week)),
            );
        }

        let pet = fields::pet_information(&snapshot)?.ok_or(NodeError::MissingInput {
            what: "pet_information",
        })?;
        let pet_text = serde_json::to_string(&pet)?;
        let notes = fields::notes(&snapshot)?;
        let shared_notes_list = if notes.is_empty() {
            "(no shared notes)".to_string()
        } else {
            notes
                .keys()
                .map(|name| format!("- {name}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = prompts::week_planner_prompt(
            &pet_text,
            &seed.assignment,
            &seed.shared_constraints,
            &seed.ingredient_rotation_strategy,
            &seed.age_adaptation_note,
            &shared_notes_list,
        );
        let mut messages = vec![
            Message::system(prompt),
            Message::user(format!(
                "Please write the diet plan for week {week}. Pet information: {pet_text}"
            )),
        ];
        messages.extend(history.iter().cloned());

        let request = ChatRequest::new(&self.config.week_model, messages)
            .with_actions(self.actions.clone());
        let reply = self.model.invoke(request).await.map_err(model_failure)?;

        match reply {
            ModelReply::Action(action) => {
                if action.name == WEB_SEARCH {
                    ctx.emit_progress(
                        progress(
                            ProgressStage::WeekSearching,
                            format!("week {week}: searching ingredient material"),
                        )
                        .with_task(task_name),
                    );
                }
                Ok(NodeOutcome::goto(WEEK_TOOLS)
                    .update(
                        fields::WEEK_TRANSCRIPT,
                        serde_json::to_value(vec![action_message(&action)])?,
                    )
                    .update(fields::PENDING_ACTION, serde_json::to_value(&action)?))
            }
            ModelReply::Text(plan_text) => {
                ctx.emit_progress(
                    progress(
                        ProgressStage::WeekPlanReady,
                        format!("week {week}: plan drafted, saving"),
                    )
                    .with_task(task_name)
                    .with_progress(week_base_progress(week).saturating_add(8).min(78)),
                );
                Ok(NodeOutcome::goto(WEEK_WRITE)
                    .update(
                        fields::WEEK_TRANSCRIPT,
                        serde_json::to_value(vec![Message::assistant(plan_text.clone())])?,
                    )
                    .update(fields::WEEK_DRAFT, json!(plan_text)))
            }
        }
    }
}

/// Forces a `week_write_note` action saving the drafted plan.
pub struct WeekWriteNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    actions: Vec<ActionSpec>,
}

impl WeekWriteNode {
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
impl Node for WeekWriteNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let seed: WeekSeed =
            snapshot
                .get_as_opt(fields::WEEK_SEED)?
                .ok_or(NodeError::MissingInput {
                    what: "week_seed",
                })?;
        let week = seed.assignment.week_number;
        let draft: String = snapshot.get_as_opt(fields::WEEK_DRAFT)?.unwrap_or_default();

        ctx.emit_progress(
            progress(
                ProgressStage::WeekWriting,
                format!("week {week}: saving the diet plan note"),
            )
            .with_task(format!("week {week} diet plan")),
        );

        let request = ChatRequest::new(
            &self.config.write_model,
            vec![Message::user(prompts::week_write_prompt(week, &draft))],
        )
        .with_actions(self.actions.clone())
        .with_forced_action(WEEK_WRITE_NOTE);

        let reply = self.model.invoke(request).await.map_err(model_failure)?;
        let ModelReply::Action(action) = reply else {
            return Err(NodeError::ValidationFailed(
                "write model ignored the forced week_write_note action".into(),
            ));
        };
        Ok(NodeOutcome::new().update(fields::PENDING_ACTION, serde_json::to_value(&action)?))
    }
}

/// Saves one weekly plan note. The note kind is always diet_plan.
pub struct WeekWriteNote;

#[derive(Deserialize)]
struct WeekWriteNoteArgs {
    name: String,
    content: String,
}

#[async_trait]
impl Action for WeekWriteNote {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            WEEK_WRITE_NOTE,
            "Save this week's diet plan note. Arguments: `name` and `content` \
             (Markdown diet plan).",
        )
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: WeekWriteNoteArgs = serde_json::from_value(arguments)
            .map_err(|err| ActionError::Invalid(err.to_string()))?;
        let note = Note::diet_plan(args.content);
        Ok(
            ActionOutcome::reply(format!("note '{}' saved", args.name))
                .with_update(fields::NOTES, note_entry(&args.name, &note)?),
        )
    }
}

/// Executes the forced note write and closes out this week worker.
pub struct WeekWriteToolNode {
    registry: Arc<ActionRegistry>,
}

impl WeekWriteToolNode {
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Node for WeekWriteToolNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let seed: WeekSeed =
            snapshot
                .get_as_opt(fields::WEEK_SEED)?
                .ok_or(NodeError::MissingInput {
                    what: "week_seed",
                })?;
        let week = seed.assignment.week_number;
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
                ctx.emit_progress(
                    progress(
                        ProgressStage::WeekCompleted,
                        format!("week {week}: diet plan complete"),
                    )
                    .with_task(format!("week {week} diet plan"))
                    .with_progress((30 + week * 12).min(78) as u8),
                );
                let mut result = NodeOutcome::new().with_delta(outcome.delta);
                result
                    .delta
                    .insert(fields::PENDING_ACTION.into(), serde_json::Value::Null);
                Ok(result)
            }
            Err(ActionError::Invalid(message)) => Err(NodeError::ValidationFailed(format!(
                "forced week note write failed: {message}"
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

/// Collects all notes after the week join and fans them into structuring.
pub struct CollectWeeksNode;

#[async_trait]
impl Node for CollectWeeksNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let notes = fields::notes(&snapshot)?;
        ctx.emit_progress(
            progress(
                ProgressStage::Gathering,
                "all weekly plans complete, moving to structured parsing",
            )
            .with_progress(80),
        );
        if notes.is_empty() {
            return Ok(NodeOutcome::goto(GATHER));
        }
        let sends = structure_fan_out(STRUCTURE_REPORT, &notes)?;
        Ok(NodeOutcome::fan_out(sends))
    }
}

/// Compiles one week worker's sub-workflow.
pub fn build_week_workflow(
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
    providers: &Providers,
) -> Result<Workflow, GraphDefinitionError> {
    let lookup_registry = Arc::new(
        ActionRegistry::new()
            .register(WebSearch::new(providers.search.clone()))
            .register(QueryNote::named(crate::actions::QUERY_SHARED_NOTE)),
    );
    let write_registry = Arc::new(ActionRegistry::new().register(WeekWriteNote));

    GraphBuilder::new()
        .add_channel(fields::WEEK_SEED, Arc::new(Replace))
        .add_channel(fields::WEEK_TRANSCRIPT, Arc::new(Append))
        .add_channel(fields::WEEK_DRAFT, Arc::new(Replace))
        .add_channel(fields::PENDING_ACTION, Arc::new(Replace))
        .add_channel(fields::NOTES, Arc::new(MergeMap))
        .add_channel(fields::PET_INFORMATION, Arc::new(Replace))
        .add_node(
            WEEK_PLANNER,
            WeekPlannerNode::new(config.clone(), model.clone(), &lookup_registry),
        )
        .add_node(
            WEEK_TOOLS,
            ActionExecNode::new(lookup_registry).with_transcript_field(fields::WEEK_TRANSCRIPT),
        )
        .add_node(
            WEEK_WRITE,
            WeekWriteNode::new(config, model, &write_registry),
        )
        .add_node(WEEK_WRITE_TOOL, WeekWriteToolNode::new(write_registry))
        .add_edge("Start", WEEK_PLANNER)
        .add_edge(WEEK_TOOLS, WEEK_PLANNER)
        .add_edge(WEEK_WRITE, WEEK_WRITE_TOOL)
        .compile()
}

/// Week-worker embedding contract: shared notes and the pet profile come in,
/// the note store (now containing this week's plan) goes back.
#[must_use]
pub fn week_spec() -> SubGraphSpec {
    SubGraphSpec::new()
        .with_inputs(&[fields::NOTES, fields::PET_INFORMATION])
        .with_exports(&[fields::NOTES])
        .with_seed_field(fields::WEEK_SEED)
}

/// Compiles the batch coordination workflow.
pub fn build_batch_workflow(
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
    let week_agent = build_week_workflow(config.clone(), model.clone(), providers)?;
    let structuring = build_structuring_workflow(config.clone(), model.clone())?;

    GraphBuilder::new()
        .add_channel(fields::TRANSCRIPT, Arc::new(Append))
        .add_channel(fields::TASK_HISTORY, Arc::new(Append))
        .add_channel(fields::PLAN, Arc::new(Replace))
        .add_channel(fields::NOTES, Arc::new(MergeMap))
        .add_channel(fields::PET_INFORMATION, Arc::new(Replace))
        .add_channel(fields::PENDING_ACTION, Arc::new(Replace))
        .add_channel(fields::COORDINATION_GUIDE, Arc::new(Replace))
        .add_channel(fields::WEEKLY_PLANS, Arc::new(Accumulate))
        .add_channel(fields::STRUCTURING_FAILURES, Arc::new(Accumulate))
        .add_channel(fields::REPORT, Arc::new(Replace))
        .add_node(
            RESEARCH_PLANNER,
            ResearchPlannerNode::new(config.clone(), model.clone(), &plan_registry),
        )
        .add_node(RESEARCH_TOOLS, ActionExecNode::new(plan_registry))
        .add_subgraph(RESEARCH_SUBAGENT, subtask, subtask_spec())
        .add_subgraph(RESEARCH_WRITE, writer, writer_spec())
        .add_node(DISPATCH_WEEKS, DispatchWeeksNode)
        .add_subgraph(WEEK_AGENT, week_agent, week_spec())
        .add_node(COLLECT_WEEKS, CollectWeeksNode)
        .add_subgraph(STRUCTURE_REPORT, structuring, structuring_spec())
        .add_node(GATHER, GatherNode)
        .add_edge("Start", RESEARCH_PLANNER)
        .add_edge(RESEARCH_TOOLS, RESEARCH_PLANNER)
        .add_edge(RESEARCH_SUBAGENT, RESEARCH_WRITE)
        .add_edge(RESEARCH_WRITE, RESEARCH_PLANNER)
        .add_edge(WEEK_AGENT, COLLECT_WEEKS)
        .add_edge(STRUCTURE_REPORT, GATHER)
        .compile()
}
