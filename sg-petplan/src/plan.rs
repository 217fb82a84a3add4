//! The content-keyed task plan.
//!
//! A plan is an ordered list of to-do items whose `content` string is the
//! stable identity key. Updates must match an existing entry exactly — no
//! partial or fuzzy matching — and a batch must keep the done/in_progress
//! bookkeeping honest: close out the finished task and open the next one
//! whenever both transitions are available.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one plan entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Done,
}

/// One to-do item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub content: String,
    pub status: PlanStatus,
}

impl PlanItem {
    #[must_use]
    pub fn pending(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: PlanStatus::Pending,
        }
    }
}

/// One entry of an update batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanUpdate {
    pub content: String,
    pub status: PlanStatus,
}

/// Rejected plan updates. These are surfaced to the model as a tool error
/// message so it can self-correct; they never abort the run.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum PlanError {
    #[error("no plan exists yet; write one first")]
    Missing,

    #[error("empty update batch")]
    Empty,

    #[error("plan entry not found (content must match exactly): {0}")]
    UnknownEntry(String),

    #[error("updates may only set in_progress or done")]
    InvalidStatus,

    #[error("a task is underway; the batch must mark at least one entry done")]
    MissingDone,

    #[error("pending work remains; the batch must mark at least one entry in_progress")]
    MissingInProgress,
}

/// Applies an update batch, returning the new plan. The input plan is
/// untouched on rejection.
pub fn apply_plan_update(
    plan: &[PlanItem],
    updates: &[PlanUpdate],
) -> Result<Vec<PlanItem>, PlanError> {
    if plan.is_empty() {
        return Err(PlanError::Missing);
    }
    if updates.is_empty() {
        return Err(PlanError::Empty);
    }

    for update in updates {
        if update.status == PlanStatus::Pending {
            return Err(PlanError::InvalidStatus);
        }
        if !plan.iter().any(|item| item.content == update.content) {
            return Err(PlanError::UnknownEntry(update.content.clone()));
        }
    }

    let mut next: Vec<PlanItem> = plan.to_vec();
    for update in updates {
        for item in next.iter_mut() {
            if item.content == update.content {
                item.status = update.status;
            }
        }
    }

    let had_underway = plan.iter().any(|item| item.status == PlanStatus::InProgress);
    let marks_done = updates.iter().any(|u| u.status == PlanStatus::Done);
    if had_underway && !marks_done {
        return Err(PlanError::MissingDone);
    }

    let still_pending = next.iter().any(|item| item.status == PlanStatus::Pending);
    let marks_in_progress = updates.iter().any(|u| u.status == PlanStatus::InProgress);
    if still_pending && !marks_in_progress {
        return Err(PlanError::MissingInProgress);
    }

    Ok(next)
}

/// Overall progress derived purely from plan state, recomputed on every
/// planning step: `10 + 70 * done / total`, truncated, clamped to `[10, 80]`.
#[must_use]
pub fn estimate_progress(plan: &[PlanItem]) -> u8 {
    if plan.is_empty() {
        return 10;
    }
    let total = plan.len() as u64;
    let done = plan
        .iter()
        .filter(|item| item.status == PlanStatus::Done)
        .count() as u64;
    let estimate = 10 + (70 * done / total);
    estimate.clamp(10, 80) as u8
}
