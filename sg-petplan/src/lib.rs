//! Pet diet planning workflows on the [`stepgraph`] engine.
//!
//! Four concrete workflows cover the pipeline
//! *plan → delegate → execute → record → structure → aggregate*:
//!
//! - [`planner`] — the top-level planner/delegator loop: iterative planning
//!   with plan-management actions, task delegation to the sub-task workflow,
//!   and a final parallel structuring fan-out
//! - [`subtask`] — the delegated task execution loop (search, weather,
//!   note queries)
//! - [`writer`] — the note-writing step that records a task result as a named
//!   note and summarizes it back into the planner transcript
//! - [`structuring`] — the self-correcting structured-extraction retry loop
//! - [`weekly`] — the batch variant: research phase, a coordination guide,
//!   and a fixed fan-out of per-week worker instances
//!
//! Remote model and search backends stay behind the collaborator traits in
//! [`llm`] and [`providers`]; all model ids and prompts live in an immutable
//! [`config::AgentConfig`] injected at graph construction.

pub mod actions;
pub mod config;
pub mod coordination;
pub mod fields;
pub mod llm;
pub mod notes;
pub mod plan;
pub mod planner;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod report;
pub mod structuring;
pub mod subtask;
pub mod weekly;
pub mod writer;
