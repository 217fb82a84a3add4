//! Channel names shared across the workflow graphs, plus typed snapshot
//! accessors.
//!
//! Declared-per-graph in the builders; kept here so parent and child graphs
//! agree on the names that cross sub-workflow boundaries.

use std::collections::BTreeMap;

use stepgraph::message::Message;
use stepgraph::state::{StateError, StateSnapshot};

use crate::notes::Note;
use crate::plan::PlanItem;
use crate::report::PetInformation;

/// Planner conversation transcript (`Append`).
pub const TRANSCRIPT: &str = "transcript";
/// Transcripts exported by completed sub-tasks (`Append`).
pub const TASK_HISTORY: &str = "task_history";
/// Private per-loop scratch transcript (`Append`, never exported).
pub const SCRATCH: &str = "scratch_transcript";
/// The content-keyed task plan (`Replace`).
pub const PLAN: &str = "plan";
/// The shared note store, keyed by note name (`MergeMap`).
pub const NOTES: &str = "notes";
/// The pet profile this run is planning for (`Replace`).
pub const PET_INFORMATION: &str = "pet_information";
/// Structured weekly plans collected from fan-out branches (`Accumulate`).
pub const WEEKLY_PLANS: &str = "weekly_plans";
/// Notes the structuring loop gave up on (`Accumulate`).
pub const STRUCTURING_FAILURES: &str = "structuring_failures";
/// The final report (`Replace`).
pub const REPORT: &str = "report";
/// The action awaiting execution by a tool node (`Replace`).
pub const PENDING_ACTION: &str = "pending_action";
/// Research-phase output coordinating the weekly fan-out (`Replace`).
pub const COORDINATION_GUIDE: &str = "coordination_guide";

/// Sub-task workflow: the delegated task description (seed, `Replace`).
pub const TASK: &str = "task";
/// Structuring workflow: the note under extraction (seed, `Replace`).
pub const ASSIGNED_NOTE: &str = "assigned_note";
/// Structuring workflow: detail of the last failed attempt (`Replace`).
pub const FAILED_REASON: &str = "failed_reason";
/// Structuring workflow: attempts consumed so far (`Replace`).
pub const ATTEMPTS: &str = "attempts";

/// Week workflow: the per-instance assignment bundle (seed, `Replace`).
pub const WEEK_SEED: &str = "week_seed";
/// Week workflow: private planning transcript (`Append`).
pub const WEEK_TRANSCRIPT: &str = "week_transcript";
/// Week workflow: the finished plan text awaiting note write (`Replace`).
pub const WEEK_DRAFT: &str = "week_draft";

/// Messages stored in an `Append` channel.
pub fn messages(snapshot: &StateSnapshot, field: &str) -> Result<Vec<Message>, StateError> {
    Ok(snapshot.get_as_opt(field)?.unwrap_or_default())
}

/// The note store, ordered by name for deterministic iteration.
pub fn notes(snapshot: &StateSnapshot) -> Result<BTreeMap<String, Note>, StateError> {
    Ok(snapshot.get_as_opt(NOTES)?.unwrap_or_default())
}

/// The current plan; empty when none was written yet.
pub fn plan(snapshot: &StateSnapshot) -> Result<Vec<PlanItem>, StateError> {
    Ok(snapshot.get_as_opt(PLAN)?.unwrap_or_default())
}

/// The pet profile, when seeded.
pub fn pet_information(snapshot: &StateSnapshot) -> Result<Option<PetInformation>, StateError> {
    snapshot.get_as_opt(PET_INFORMATION)
}
