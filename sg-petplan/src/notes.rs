//! The shared note store.
//!
//! Notes are the durable output of task execution: named, typed, visible to
//! any node that can read the note channel — including nested sub-workflows
//! granted read access. A note is created once and may later be overwritten
//! under the same name; never appended.

use serde::{Deserialize, Serialize};

/// What a note contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Collected background information.
    Research,
    /// A concrete weekly diet plan following the report template.
    DietPlan,
}

/// A named piece of durable output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NoteKind,
}

impl Note {
    #[must_use]
    pub fn research(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: NoteKind::Research,
        }
    }

    #[must_use]
    pub fn diet_plan(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: NoteKind::DietPlan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_under_type_key() {
        let json = serde_json::to_value(Note::diet_plan("week 1")).unwrap();
        assert_eq!(json["type"], "diet_plan");
        let back: Note = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, NoteKind::DietPlan);
    }
}
