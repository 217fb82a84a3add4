use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Scope of the diagnostic emitted when a run finishes (completed or failed).
/// Stream consumers can treat it as an end-of-stream marker.
pub const RUN_END_SCOPE: &str = "__stepgraph_run_end__";

/// An observability event flowing through the [`ProgressBus`](super::ProgressBus).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    /// Business-level progress reported by a node.
    Progress(ProgressEvent),
    /// Engine-level diagnostics (run lifecycle, warnings).
    Diagnostic(DiagnosticEvent),
}

impl Event {
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    /// The event's stage or scope label.
    #[must_use]
    pub fn scope_label(&self) -> &str {
        match self {
            Event::Progress(p) => &p.stage,
            Event::Diagnostic(d) => &d.scope,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Event::Progress(p) => &p.message,
            Event::Diagnostic(d) => &d.message,
        }
    }

    /// Normalized JSON form for SSE-style consumers.
    ///
    /// ```
    /// use stepgraph::events::{Event, ProgressEvent};
    ///
    /// let event = Event::Progress(
    ///     ProgressEvent::new("plan_created", "task plan written")
    ///         .with_node("planner")
    ///         .with_progress(10),
    /// );
    /// let json = event.to_json_value();
    /// assert_eq!(json["type"], "progress");
    /// assert_eq!(json["scope"], "plan_created");
    /// assert_eq!(json["metadata"]["progress"], 10);
    /// ```
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let (event_type, metadata, timestamp) = match self {
            Event::Progress(p) => {
                let mut meta = serde_json::Map::new();
                if let Some(node) = &p.node {
                    meta.insert("node".into(), json!(node));
                }
                if let Some(task) = &p.task_name {
                    meta.insert("task_name".into(), json!(task));
                }
                if let Some(progress) = p.progress {
                    meta.insert("progress".into(), json!(progress));
                }
                if let Some(detail) = &p.detail {
                    meta.insert("detail".into(), detail.clone());
                }
                ("progress", Value::Object(meta), p.when)
            }
            Event::Diagnostic(_) => ("diagnostic", json!({}), Utc::now()),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": timestamp.to_rfc3339(),
            "metadata": metadata,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Progress(p) => match (&p.node, p.progress) {
                (Some(node), Some(pct)) => {
                    write!(f, "[{node}] {} ({}: {pct}%)", p.message, p.stage)
                }
                (Some(node), None) => write!(f, "[{node}] {} ({})", p.message, p.stage),
                (None, Some(pct)) => write!(f, "{} ({}: {pct}%)", p.message, p.stage),
                (None, None) => write!(f, "{} ({})", p.message, p.stage),
            },
            Event::Diagnostic(d) => write!(f, "{}: {}", d.scope, d.message),
        }
    }
}

/// Business-level progress reported by a node handler.
///
/// Optional fields are omitted from serialized output to keep streamed
/// payloads small.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Machine-readable stage label (e.g. `plan_created`, `structuring`).
    pub stage: String,
    /// Human-readable description.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    /// Overall completion estimate in percent, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    pub when: DateTime<Utc>,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            node: None,
            task_name: None,
            progress: None,
            detail: None,
            when: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    #[must_use]
    pub fn with_task(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Engine-level diagnostic message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}
