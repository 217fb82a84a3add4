//! Action execution.
//!
//! Actions are the tools the models can request. Execution happens against a
//! state snapshot and produces a reply (fed back into the transcript) plus a
//! state delta. Two failure classes matter:
//!
//! - [`ActionError::Invalid`] is recoverable: the message goes back into the
//!   transcript so the model can self-correct; the caller never sees it.
//! - Unknown action names and provider failures are fatal.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use stepgraph::message::Message;
use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::state::{StateDelta, StateSnapshot};

use crate::fields;
use crate::llm::{ActionRequest, ActionSpec};
use crate::notes::{Note, NoteKind};
use crate::plan::{self, PlanItem, PlanUpdate};
use crate::providers::{SearchProvider, WeatherProvider};

pub const WRITE_PLAN: &str = "write_plan";
pub const UPDATE_PLAN: &str = "update_plan";
pub const LIST_NOTES: &str = "list_notes";
pub const QUERY_NOTE: &str = "query_note";
pub const QUERY_SHARED_NOTE: &str = "query_shared_note";
pub const WRITE_NOTE: &str = "write_note";
pub const UPDATE_NOTE: &str = "update_note";
pub const WEB_SEARCH: &str = "web_search";
pub const WEATHER: &str = "weather";
pub const DELEGATE_TASK: &str = "delegate_task";
pub const FINALIZE_RESEARCH: &str = "finalize_research";

/// What executing an action produced: a textual reply for the transcript and
/// a state delta merged at the barrier.
#[derive(Clone, Debug, Default)]
pub struct ActionOutcome {
    pub reply: String,
    pub delta: StateDelta,
}

impl ActionOutcome {
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            delta: StateDelta::default(),
        }
    }

    #[must_use]
    pub fn with_update(mut self, field: impl Into<String>, value: Value) -> Self {
        self.delta.insert(field.into(), value);
        self
    }
}

/// Action execution failures.
#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    /// Bad arguments; converted into a transcript message for the model.
    #[error("{0}")]
    #[diagnostic(code(sg_petplan::actions::invalid))]
    Invalid(String),

    /// No such action registered. Fatal.
    #[error("unknown action: {0}")]
    #[diagnostic(code(sg_petplan::actions::unknown))]
    Unknown(String),

    /// A backing collaborator failed. Fatal.
    #[error("provider {provider} failed: {message}")]
    #[diagnostic(code(sg_petplan::actions::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },
}

/// One executable action.
#[async_trait]
pub trait Action: Send + Sync {
    fn spec(&self) -> ActionSpec;

    async fn execute(
        &self,
        arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError>;
}

/// Name-keyed action lookup for one tool-execution node.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: FxHashMap<String, Arc<dyn Action>>,
    order: Vec<String>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, action: impl Action + 'static) -> Self {
        let action: Arc<dyn Action> = Arc::new(action);
        let name = action.spec().name;
        if !self.actions.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.actions.insert(name, action);
        self
    }

    /// Specs in registration order, for advertising to the model.
    #[must_use]
    pub fn specs(&self) -> Vec<ActionSpec> {
        self.order
            .iter()
            .filter_map(|name| self.actions.get(name))
            .map(|action| action.spec())
            .collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| ActionError::Unknown(name.to_string()))?;
        action.execute(arguments, snapshot).await
    }
}

/// Transcript rendering of a requested action.
#[must_use]
pub fn action_message(request: &ActionRequest) -> Message {
    Message::assistant(format!("[action:{}] {}", request.name, request.arguments))
}

/// Spec of the planner's delegation pseudo-action. It is intercepted by the
/// planner itself (routing to the sub-task workflow), never executed by a
/// tool node.
#[must_use]
pub fn delegate_task_spec() -> ActionSpec {
    ActionSpec::new(
        DELEGATE_TASK,
        "Delegate the current in_progress plan entry to the execution agent. \
         Argument `content` must match that entry's content exactly (it may be \
         rephrased only when retrying a previously failed task).",
    )
}

/// Spec of the research-phase termination pseudo-action, intercepted by the
/// research planner.
#[must_use]
pub fn finalize_research_spec() -> ActionSpec {
    ActionSpec::new(
        FINALIZE_RESEARCH,
        "End the research phase once every research task is done. The system then \
         derives the four-week coordination guide and dispatches the week planners.",
    )
}

/// Executes the pending action recorded in the state and appends the result
/// to a transcript channel. Validation failures become tool messages; the
/// model sees them on the next loop iteration and can self-correct.
pub struct ActionExecNode {
    registry: Arc<ActionRegistry>,
    transcript_field: &'static str,
}

impl ActionExecNode {
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            transcript_field: fields::TRANSCRIPT,
        }
    }

    /// Append action replies to a different transcript channel (e.g. a
    /// sub-workflow's private scratch).
    #[must_use]
    pub fn with_transcript_field(mut self, field: &'static str) -> Self {
        self.transcript_field = field;
        self
    }
}

#[async_trait]
impl Node for ActionExecNode {
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

        tracing::debug!(node = %ctx.node_id, action = %request.name, "executing action");
        let reply = match self
            .registry
            .execute(&request.name, request.arguments.clone(), &snapshot)
            .await
        {
            Ok(outcome) => {
                let mut result = NodeOutcome::new().with_delta(outcome.delta);
                result.delta.insert(
                    self.transcript_field.to_string(),
                    serde_json::to_value(vec![Message::tool(outcome.reply)])?,
                );
                result.delta.insert(fields::PENDING_ACTION.into(), Value::Null);
                return Ok(result);
            }
            Err(ActionError::Invalid(message)) => {
                tracing::debug!(action = %request.name, %message, "recoverable action error");
                format!("action error: {message}")
            }
            Err(ActionError::Unknown(name)) => {
                return Err(NodeError::ValidationFailed(format!(
                    "unknown action: {name}"
                )));
            }
            Err(ActionError::Provider { provider, message }) => {
                return Err(NodeError::Provider { provider, message });
            }
        };

        Ok(NodeOutcome::new()
            .update(
                self.transcript_field,
                serde_json::to_value(vec![Message::tool(reply)])?,
            )
            .update(fields::PENDING_ACTION, Value::Null))
    }
}

// ---------------------------------------------------------------------------
// Plan management
// ---------------------------------------------------------------------------

/// Initializes the task plan. Usable once; later calls are rejected.
pub struct WritePlan;

#[derive(Deserialize)]
struct WritePlanArgs {
    plan: Vec<String>,
}

#[async_trait]
impl Action for WritePlan {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            WRITE_PLAN,
            "Initialize the task list. Argument `plan` is a list of task content \
             strings. Call once at the start; use update_plan afterwards.",
        )
    }

    async fn execute(
        &self,
        arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: WritePlanArgs = parse_args(arguments)?;
        if args.plan.is_empty() {
            return Err(ActionError::Invalid("plan must not be empty".into()));
        }
        let existing = fields::plan(snapshot).map_err(state_invalid)?;
        if !existing.is_empty() {
            return Err(ActionError::Invalid(
                "a plan already exists; use update_plan".into(),
            ));
        }
        let items: Vec<PlanItem> = args.plan.into_iter().map(PlanItem::pending).collect();
        let count = items.len();
        let value = serde_json::to_value(&items)
            .map_err(|e| ActionError::Invalid(e.to_string()))?;
        Ok(
            ActionOutcome::reply(format!("plan written with {count} tasks"))
                .with_update(fields::PLAN, value),
        )
    }
}

/// Applies a status update batch to the plan.
pub struct UpdatePlan;

#[derive(Deserialize)]
struct UpdatePlanArgs {
    updates: Vec<PlanUpdate>,
}

#[async_trait]
impl Action for UpdatePlan {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            UPDATE_PLAN,
            "Update plan progress. Argument `updates` is a list of {content, status} \
             entries; content must match an existing plan entry exactly and status is \
             in_progress or done. Mark the finished task done and the next one \
             in_progress in the same batch whenever both apply.",
        )
    }

    async fn execute(
        &self,
        arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: UpdatePlanArgs = parse_args(arguments)?;
        let existing = fields::plan(snapshot).map_err(state_invalid)?;
        let next = plan::apply_plan_update(&existing, &args.updates)
            .map_err(|err| ActionError::Invalid(err.to_string()))?;
        let done = next
            .iter()
            .filter(|item| item.status == crate::plan::PlanStatus::Done)
            .count();
        let value = serde_json::to_value(&next)
            .map_err(|e| ActionError::Invalid(e.to_string()))?;
        Ok(ActionOutcome::reply(format!(
            "plan updated: {done}/{} tasks done",
            next.len()
        ))
        .with_update(fields::PLAN, value))
    }
}

// ---------------------------------------------------------------------------
// Note access
// ---------------------------------------------------------------------------

/// Lists the names of all saved notes.
pub struct ListNotes;

#[async_trait]
impl Action for ListNotes {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(LIST_NOTES, "List the names of all saved notes.")
    }

    async fn execute(
        &self,
        _arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let notes = fields::notes(snapshot).map_err(state_invalid)?;
        if notes.is_empty() {
            return Ok(ActionOutcome::reply("no notes saved yet"));
        }
        let names: Vec<&str> = notes.keys().map(String::as_str).collect();
        Ok(ActionOutcome::reply(names.join("\n")))
    }
}

/// Reads one note by name. A missing note is a normal reply, not an error,
/// so the model can adjust course.
pub struct QueryNote {
    name: &'static str,
}

impl QueryNote {
    #[must_use]
    pub fn new() -> Self {
        Self { name: QUERY_NOTE }
    }

    /// Same behavior under a different advertised name (the week workers see
    /// the shared store as `query_shared_note`).
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self { name }
    }
}

impl Default for QueryNote {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct QueryNoteArgs {
    name: String,
}

#[async_trait]
impl Action for QueryNote {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            self.name,
            "Read a note. Argument `name` is the note name; returns its content.",
        )
    }

    async fn execute(
        &self,
        arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: QueryNoteArgs = parse_args(arguments)?;
        let notes = fields::notes(snapshot).map_err(state_invalid)?;
        match notes.get(&args.name) {
            Some(note) => Ok(ActionOutcome::reply(note.content.clone())),
            None => Ok(ActionOutcome::reply(format!(
                "note '{}' does not exist",
                args.name
            ))),
        }
    }
}

/// Writes a named note into the shared store.
pub struct WriteNote;

#[derive(Deserialize)]
struct WriteNoteArgs {
    name: String,
    content: String,
    kind: NoteKind,
}

#[async_trait]
impl Action for WriteNote {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            WRITE_NOTE,
            "Save a note. Arguments: `name`, `content`, and `kind` — \"diet_plan\" for a \
             concrete weekly plan following the report template, \"research\" otherwise.",
        )
    }

    async fn execute(
        &self,
        arguments: Value,
        _snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: WriteNoteArgs = parse_args(arguments)?;
        let note = Note {
            content: args.content,
            kind: args.kind,
        };
        Ok(
            ActionOutcome::reply(format!("note '{}' saved", args.name))
                .with_update(fields::NOTES, note_entry(&args.name, &note)?),
        )
    }
}

/// Overwrites an existing note under the same name.
pub struct UpdateNote;

#[derive(Deserialize)]
struct UpdateNoteArgs {
    name: String,
    new_content: String,
}

#[async_trait]
impl Action for UpdateNote {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            UPDATE_NOTE,
            "Overwrite an existing note. Arguments: `name` and `new_content`.",
        )
    }

    async fn execute(
        &self,
        arguments: Value,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: UpdateNoteArgs = parse_args(arguments)?;
        let notes: BTreeMap<String, Note> = fields::notes(snapshot).map_err(state_invalid)?;
        let Some(existing) = notes.get(&args.name) else {
            return Err(ActionError::Invalid(format!(
                "note '{}' does not exist",
                args.name
            )));
        };
        let note = Note {
            content: args.new_content,
            kind: existing.kind,
        };
        Ok(
            ActionOutcome::reply(format!("note '{}' updated", args.name))
                .with_update(fields::NOTES, note_entry(&args.name, &note)?),
        )
    }
}

// ---------------------------------------------------------------------------
// External lookups
// ---------------------------------------------------------------------------

/// Internet search through the configured provider.
pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearch {
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
}

#[async_trait]
impl Action for WebSearch {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            WEB_SEARCH,
            "Internet search for up-to-date material. Argument `query` is the search text. \
             To control context length and cost, call at most once per task.",
        )
    }

    async fn execute(
        &self,
        arguments: Value,
        _snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: WebSearchArgs = parse_args(arguments)?;
        let results =
            self.provider
                .search(&args.query)
                .await
                .map_err(|err| ActionError::Provider {
                    provider: err.provider,
                    message: err.message,
                })?;
        Ok(ActionOutcome::reply(results))
    }
}

/// Current weather through the configured provider.
pub struct Weather {
    provider: Arc<dyn WeatherProvider>,
}

impl Weather {
    #[must_use]
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Deserialize)]
struct WeatherArgs {
    city: String,
}

#[async_trait]
impl Action for Weather {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(WEATHER, "Current weather. Argument `city` is the city name.")
    }

    async fn execute(
        &self,
        arguments: Value,
        _snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, ActionError> {
        let args: WeatherArgs = parse_args(arguments)?;
        let report =
            self.provider
                .current(&args.city)
                .await
                .map_err(|err| ActionError::Provider {
                    provider: err.provider,
                    message: err.message,
                })?;
        Ok(ActionOutcome::reply(report))
    }
}

/// A single-entry note-store delta: `{ name: note }`.
pub fn note_entry(name: &str, note: &Note) -> Result<Value, ActionError> {
    let mut map = serde_json::Map::new();
    map.insert(
        name.to_string(),
        serde_json::to_value(note).map_err(|err| ActionError::Invalid(err.to_string()))?,
    );
    Ok(Value::Object(map))
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ActionError> {
    serde_json::from_value(arguments).map_err(|err| ActionError::Invalid(err.to_string()))
}

fn state_invalid(err: stepgraph::state::StateError) -> ActionError {
    ActionError::Invalid(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepgraph::reducers::{ChannelRegistry, MergeMap, Replace};
    use stepgraph::state::WorkflowState;
    use std::sync::Arc as StdArc;

    fn snapshot_with_notes() -> StateSnapshot {
        let registry = ChannelRegistry::new()
            .with_channel(fields::NOTES, StdArc::new(MergeMap))
            .with_channel(fields::PLAN, StdArc::new(Replace));
        let mut state = WorkflowState::for_registry(&registry);
        state.set(
            fields::NOTES,
            json!({"nutrition": {"content": "protein matters", "type": "research"}}),
        );
        state.snapshot()
    }

    #[tokio::test]
    async fn query_note_returns_content_or_polite_miss() {
        let action = QueryNote::new();
        let snap = snapshot_with_notes();

        let hit = action
            .execute(json!({"name": "nutrition"}), &snap)
            .await
            .unwrap();
        assert_eq!(hit.reply, "protein matters");

        let miss = action
            .execute(json!({"name": "absent"}), &snap)
            .await
            .unwrap();
        assert!(miss.reply.contains("does not exist"));
    }

    #[tokio::test]
    async fn write_plan_rejects_a_second_plan() {
        let registry = ChannelRegistry::new().with_channel(fields::PLAN, StdArc::new(Replace));
        let mut state = WorkflowState::for_registry(&registry);
        state.set(
            fields::PLAN,
            json!([{"content": "a", "status": "pending"}]),
        );
        let err = WritePlan
            .execute(json!({"plan": ["b"]}), &state.snapshot())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Invalid(_)));
    }

    #[tokio::test]
    async fn registry_rejects_unknown_names() {
        let registry = ActionRegistry::new().register(ListNotes);
        let err = registry
            .execute("nope", json!({}), &snapshot_with_notes())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unknown(_)));
    }
}
