//! Business-level progress stages.
//!
//! Each stage maps onto one engine [`ProgressEvent`]; frontends consume the
//! stage strings directly from the stream.

use stepgraph::events::ProgressEvent;

/// Everything the workflows report while running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStage {
    // Planner
    PlanCreating,
    PlanCreated,
    PlanUpdated,
    TaskDelegating,

    // Sub-task execution
    TaskExecuting,
    TaskSearching,
    TaskQueryingNote,
    TaskCompleted,

    // Note writing
    NoteSaving,
    NoteSaved,
    SummaryGenerating,
    SummaryGenerated,

    // Structuring
    Structuring,
    StructuringRetry,
    Structured,

    // Research / batch variant
    ResearchStarting,
    ResearchFinalizing,
    Dispatching,
    WeekPlanning,
    WeekSearching,
    WeekPlanReady,
    WeekWriting,
    WeekCompleted,

    // Aggregation
    Gathering,
    Completed,

    // Generic
    Error,
    Info,
}

impl ProgressStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::PlanCreating => "plan_creating",
            ProgressStage::PlanCreated => "plan_created",
            ProgressStage::PlanUpdated => "plan_updated",
            ProgressStage::TaskDelegating => "task_delegating",
            ProgressStage::TaskExecuting => "task_executing",
            ProgressStage::TaskSearching => "task_searching",
            ProgressStage::TaskQueryingNote => "task_querying_note",
            ProgressStage::TaskCompleted => "task_completed",
            ProgressStage::NoteSaving => "note_saving",
            ProgressStage::NoteSaved => "note_saved",
            ProgressStage::SummaryGenerating => "summary_generating",
            ProgressStage::SummaryGenerated => "summary_generated",
            ProgressStage::Structuring => "structuring",
            ProgressStage::StructuringRetry => "structuring_retry",
            ProgressStage::Structured => "structured",
            ProgressStage::ResearchStarting => "research_starting",
            ProgressStage::ResearchFinalizing => "research_finalizing",
            ProgressStage::Dispatching => "dispatching",
            ProgressStage::WeekPlanning => "week_planning",
            ProgressStage::WeekSearching => "week_searching",
            ProgressStage::WeekPlanReady => "week_plan_ready",
            ProgressStage::WeekWriting => "week_writing",
            ProgressStage::WeekCompleted => "week_completed",
            ProgressStage::Gathering => "gathering",
            ProgressStage::Completed => "completed",
            ProgressStage::Error => "error",
            ProgressStage::Info => "info",
        }
    }
}

/// Shorthand for building a stage-labelled progress event.
#[must_use]
pub fn progress(stage: ProgressStage, message: impl Into<String>) -> ProgressEvent {
    ProgressEvent::new(stage.as_str(), message)
}
