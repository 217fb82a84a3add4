//! Research-to-fan-out coordination data.
//!
//! The research phase ends with one [`CoordinationGuide`]: shared constraints
//! plus exactly [`WEEK_COUNT`] differentiated [`WeekAssignment`]s, each
//! consumed to seed one parallel week-worker instance. Assignments are
//! immutable once dispatched and carry only what their worker needs.

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How many parallel week workers a run dispatches. Schema-level constant.
pub const WEEK_COUNT: usize = 4;

/// One week's worth of work, produced by the coordination extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WeekAssignment {
    /// Week ordinal, 1 through [`WEEK_COUNT`].
    pub week_number: u32,
    /// The week's dietary theme (distinct per week).
    pub theme: String,
    pub focus_nutrients: Vec<String>,
    pub constraints: Vec<String>,
    /// What distinguishes this week from the others.
    pub differentiation_note: String,
    /// Suggested search terms for the week worker.
    pub search_keywords: Vec<String>,
}

/// The guide the research phase distills from its notes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoordinationGuide {
    pub overall_principle: String,
    pub weekly_assignments: Vec<WeekAssignment>,
    /// Constraints every week shares (allergies, hard exclusions).
    pub shared_constraints: Vec<String>,
    pub ingredient_rotation_strategy: String,
    pub age_adaptation_note: String,
}

impl CoordinationGuide {
    /// The guide must carry exactly [`WEEK_COUNT`] assignments.
    pub fn validate(&self) -> Result<(), String> {
        if self.weekly_assignments.len() != WEEK_COUNT {
            return Err(format!(
                "coordination guide must contain exactly {WEEK_COUNT} weekly assignments, got {}",
                self.weekly_assignments.len()
            ));
        }
        Ok(())
    }
}

/// JSON schema for the one-shot coordination extraction.
#[must_use]
pub fn coordination_guide_schema() -> Value {
    serde_json::to_value(schema_for!(CoordinationGuide)).expect("schema serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(week: u32) -> WeekAssignment {
        WeekAssignment {
            week_number: week,
            theme: format!("theme {week}"),
            focus_nutrients: vec![],
            constraints: vec![],
            differentiation_note: String::new(),
            search_keywords: vec![],
        }
    }

    #[test]
    fn validate_requires_exactly_four_assignments() {
        let mut guide = CoordinationGuide {
            overall_principle: "balance".into(),
            weekly_assignments: (1..=4).map(assignment).collect(),
            shared_constraints: vec![],
            ingredient_rotation_strategy: String::new(),
            age_adaptation_note: String::new(),
        };
        assert!(guide.validate().is_ok());

        guide.weekly_assignments.pop();
        assert!(guide.validate().is_err());
    }
}
