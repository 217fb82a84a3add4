//! The self-correcting structured-extraction loop.
//!
//! A single node targets itself until the assigned note parses into a
//! [`WeeklyDietPlan`]. Each failed attempt records `{raw, error}` in a
//! replace channel that the next attempt feeds back to the model as the
//! repair instruction. The loop is bounded: after the attempt budget the
//! instance exports a failure record instead of a plan and terminates, so a
//! malformed note can never hang the run.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use stepgraph::graph::{GraphBuilder, GraphDefinitionError};
use stepgraph::message::Message;
use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::reducers::{Accumulate, Replace};
use stepgraph::state::StateSnapshot;
use stepgraph::subgraph::SubGraphSpec;
use stepgraph::workflow::Workflow;

use crate::config::AgentConfig;
use crate::fields;
use crate::llm::{ChatRequest, ModelClient, ModelReply};
use crate::notes::{Note, NoteKind};
use crate::progress::{ProgressStage, progress};
use crate::prompts;
use crate::report::{WeeklyDietPlan, weekly_plan_schema};

pub const STRUCTURE: &str = "structure";

/// The seed handed to one structuring instance: the note and its store name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignedNote {
    pub name: String,
    pub note: Note,
}

/// A note the loop gave up on, exported for diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructuringFailure {
    pub note: String,
    pub error: String,
    pub raw: String,
}

/// The extraction node.
pub struct StructureNode {
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
}

impl StructureNode {
    #[must_use]
    pub fn new(config: Arc<AgentConfig>, model: Arc<dyn ModelClient>) -> Self {
        Self { config, model }
    }
}

#[async_trait]
impl Node for StructureNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        let assigned: AssignedNote = snapshot
            .get_as_opt(fields::ASSIGNED_NOTE)?
            .ok_or(NodeError::MissingInput {
                what: "assigned_note",
            })?;

        // Research notes carry background material, not a parsable plan.
        if assigned.note.kind == NoteKind::Research {
            return Ok(NodeOutcome::end());
        }

        let attempts: u32 = snapshot.get_as_opt(fields::ATTEMPTS)?.unwrap_or(0);
        let failed_reason: Option<String> = snapshot.get_as_opt(fields::FAILED_REASON)?;

        let (stage, input) = match &failed_reason {
            Some(reason) => (
                progress(
                    ProgressStage::StructuringRetry,
                    "structured extraction failed, retrying",
                ),
                reason.clone(),
            ),
            None => (
                progress(
                    ProgressStage::Structuring,
                    "parsing diet plan into structured data",
                ),
                assigned.note.content.clone(),
            ),
        };
        ctx.emit_progress(stage.with_task(assigned.name.clone()));

        let request = ChatRequest::new(
            &self.config.report_model,
            vec![Message::system(prompts::report_prompt()), Message::user(input)],
        )
        .with_response_schema(weekly_plan_schema());

        let raw = match self.model.invoke(request).await {
            Ok(ModelReply::Text(raw)) => raw,
            Ok(ModelReply::Action(action)) => {
                // Treated as a failed attempt: the schema-bound call must
                // produce text.
                format!("unexpected action request: {}", action.name)
            }
            Err(err) => {
                return Err(NodeError::Provider {
                    provider: "model",
                    message: err.to_string(),
                });
            }
        };

        match serde_json::from_str::<WeeklyDietPlan>(&raw) {
            Ok(plan) => {
                ctx.emit_progress(
                    progress(
                        ProgressStage::Structured,
                        format!("week {} diet plan parsed", plan.week),
                    )
                    .with_task(assigned.name.clone())
                    .with_detail(json!({ "week": plan.week }))
                    .with_progress(85),
                );
                let mut outcome = NodeOutcome::end();
                outcome.delta.insert(
                    fields::WEEKLY_PLANS.into(),
                    serde_json::to_value(vec![plan])?,
                );
                Ok(outcome)
            }
            Err(parse_err) => {
                let spent = attempts + 1;
                if spent >= self.config.max_structuring_attempts {
                    ctx.emit_progress(
                        progress(
                            ProgressStage::Error,
                            format!(
                                "giving up on note '{}' after {spent} attempts",
                                assigned.name
                            ),
                        )
                        .with_task(assigned.name.clone()),
                    );
                    let failure = StructuringFailure {
                        note: assigned.name,
                        error: parse_err.to_string(),
                        raw,
                    };
                    let mut outcome = NodeOutcome::end();
                    outcome.delta.insert(
                        fields::STRUCTURING_FAILURES.into(),
                        serde_json::to_value(vec![failure])?,
                    );
                    return Ok(outcome);
                }

                // Record the failure detail and re-target this node; the
                // next attempt sees it as its repair input.
                Ok(NodeOutcome::goto(STRUCTURE)
                    .update(
                        fields::FAILED_REASON,
                        json!(format!("raw:{raw},error:{parse_err}")),
                    )
                    .update(fields::ATTEMPTS, json!(spent)))
            }
        }
    }
}

/// Compiles the structuring workflow: one node, self-looping until success
/// or attempt exhaustion.
pub fn build_structuring_workflow(
    config: Arc<AgentConfig>,
    model: Arc<dyn ModelClient>,
) -> Result<Workflow, GraphDefinitionError> {
    GraphBuilder::new()
        .add_channel(fields::ASSIGNED_NOTE, Arc::new(Replace))
        .add_channel(fields::FAILED_REASON, Arc::new(Replace))
        .add_channel(fields::ATTEMPTS, Arc::new(Replace))
        .add_channel(fields::WEEKLY_PLANS, Arc::new(Accumulate))
        .add_channel(fields::STRUCTURING_FAILURES, Arc::new(Accumulate))
        .add_node(STRUCTURE, StructureNode::new(config, model))
        .add_edge("Start", STRUCTURE)
        .compile()
}

/// Embedding contract: seeded with one note, exporting only the structured
/// plans and any terminal failures. Scratch (failure detail, attempt count)
/// never leaves the instance.
#[must_use]
pub fn structuring_spec() -> SubGraphSpec {
    SubGraphSpec::new()
        .with_exports(&[fields::WEEKLY_PLANS, fields::STRUCTURING_FAILURES])
        .with_seed_field(fields::ASSIGNED_NOTE)
}
