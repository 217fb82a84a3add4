use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use stepgraph::events::{Event, MemorySink, ProgressEmitter, ProgressEvent, RUN_END_SCOPE};
use stepgraph::graph::GraphBuilder;
use stepgraph::node::{Node, NodeContext, NodeError, NodeOutcome};
use stepgraph::reducers::Append;
use stepgraph::state::StateSnapshot;
use stepgraph::workflow::Workflow;

/// Emits a progress event, then writes a marker.
struct Reporting;

#[async_trait]
impl Node for Reporting {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutcome, NodeError> {
        ctx.emit_progress(
            ProgressEvent::new("working", "halfway there").with_progress(50),
        );
        Ok(NodeOutcome::new().update("log", json!(["ran"])))
    }
}

fn reporting_workflow() -> Workflow {
    GraphBuilder::new()
        .add_channel("log", Arc::new(Append))
        .add_node("report", Reporting)
        .add_edge("Start", "report")
        .add_edge("report", "End")
        .compile()
        .unwrap()
}

#[tokio::test]
async fn run_without_sink_matches_run_with_sink() {
    let workflow = reporting_workflow();

    // No observer attached: events are dropped, nothing raises or blocks.
    let silent = workflow.invoke(workflow.initial_state()).await.unwrap();

    let sink = MemorySink::new();
    let observed = workflow
        .invoke_with_sinks(workflow.initial_state(), vec![Box::new(sink.clone())])
        .await
        .unwrap();

    assert_eq!(silent, observed);
    assert_eq!(silent.get("log"), Some(&json!(["ran"])));
}

#[tokio::test]
async fn sinks_capture_progress_and_run_end() {
    let workflow = reporting_workflow();
    let sink = MemorySink::new();
    workflow
        .invoke_with_sinks(workflow.initial_state(), vec![Box::new(sink.clone())])
        .await
        .unwrap();

    let events = sink.snapshot();
    let progress: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::Progress(_)))
        .collect();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].scope_label(), "working");

    // Node id is filled in by the emitting context.
    let Event::Progress(p) = progress[0] else {
        unreachable!()
    };
    assert_eq!(p.node.as_deref(), Some("report"));
    assert_eq!(p.progress, Some(50));

    // The stream closes with the run-end diagnostic.
    let last = events.last().unwrap();
    assert_eq!(last.scope_label(), RUN_END_SCOPE);
    assert!(last.message().contains("status=completed"));
}

#[tokio::test]
async fn channel_streaming_delivers_events() {
    let workflow = reporting_workflow();
    let (result, mut rx) = workflow.invoke_with_channel(workflow.initial_state()).await;
    result.unwrap();

    let mut scopes = Vec::new();
    while let Ok(event) = rx.try_recv() {
        scopes.push(event.scope_label().to_string());
    }
    assert!(scopes.contains(&"working".to_string()));
    assert_eq!(scopes.last().map(String::as_str), Some(RUN_END_SCOPE));
}

#[test]
fn disabled_emitter_is_a_silent_no_op() {
    let emitter = ProgressEmitter::disabled();
    assert!(!emitter.is_enabled());
    // Must neither panic nor block.
    emitter.emit(Event::diagnostic("scope", "dropped"));
}

#[test]
fn progress_event_serialization_omits_unset_fields() {
    let event = ProgressEvent::new("stage", "msg");
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("node").is_none());
    assert!(json.get("progress").is_none());

    let event = event.with_progress(120);
    assert_eq!(event.progress, Some(100), "progress clamps to 100");
}
