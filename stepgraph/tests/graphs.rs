use std::sync::Arc;

use stepgraph::graph::{GraphBuilder, GraphDefinitionError};
use stepgraph::reducers::{Append, MergeMap, Replace};
use stepgraph::subgraph::SubGraphSpec;

mod common;
use common::*;

fn linear_builder() -> GraphBuilder {
    GraphBuilder::new()
        .add_channel("log", Arc::new(Append))
        .add_node(
            "step",
            AppendValue {
                field: "log",
                value: "ran",
            },
        )
        .add_edge("Start", "step")
        .add_edge("step", "End")
}

#[test]
fn linear_graph_compiles() {
    assert!(linear_builder().compile().is_ok());
}

#[test]
fn missing_entry_edge_is_rejected() {
    let err = GraphBuilder::new()
        .add_channel("log", Arc::new(Append))
        .add_node(
            "step",
            AppendValue {
                field: "log",
                value: "ran",
            },
        )
        .add_edge("step", "End")
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphDefinitionError::NoEntryEdges));
}

#[test]
fn unknown_edge_target_is_rejected() {
    let err = GraphBuilder::new()
        .add_channel("log", Arc::new(Append))
        .add_node(
            "step",
            AppendValue {
                field: "log",
                value: "ran",
            },
        )
        .add_edge("Start", "step")
        .add_edge("step", "ghost")
        .compile()
        .unwrap_err();
    assert!(
        matches!(err, GraphDefinitionError::UnknownEdgeTarget { to, .. } if to == "ghost")
    );
}

#[test]
fn edges_leaving_end_are_rejected() {
    let err = linear_builder().add_edge("End", "step").compile().unwrap_err();
    assert!(matches!(err, GraphDefinitionError::InvalidEdge { .. }));
}

#[test]
fn edges_into_start_are_rejected() {
    let err = linear_builder()
        .add_edge("step", "Start")
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphDefinitionError::InvalidEdge { .. }));
}

#[test]
fn self_edges_are_legal() {
    let workflow = GraphBuilder::new()
        .add_channel("log", Arc::new(Append))
        .add_node(
            "loop",
            AppendValue {
                field: "log",
                value: "x",
            },
        )
        .add_edge("Start", "loop")
        .add_edge("loop", "loop")
        .compile();
    // A self-edge is a structural cycle; legality is a compile-time question,
    // termination is the node's responsibility.
    assert!(workflow.is_ok());
}

#[test]
fn subgraph_export_must_exist_in_parent_registry() {
    let child = GraphBuilder::new()
        .add_channel("notes", Arc::new(MergeMap))
        .add_node(
            "inner",
            AppendValue {
                field: "notes",
                value: "x",
            },
        )
        .add_edge("Start", "inner")
        .compile()
        .unwrap();

    let err = GraphBuilder::new()
        .add_channel("log", Arc::new(Append))
        .add_subgraph(
            "child",
            child,
            SubGraphSpec::new().with_exports(&["notes"]),
        )
        .add_edge("Start", "child")
        .compile()
        .unwrap_err();
    assert!(
        matches!(err, GraphDefinitionError::UnknownExportField { field, .. } if field == "notes")
    );
}

#[test]
fn subgraph_projection_must_exist_in_child_registry() {
    let child = GraphBuilder::new()
        .add_channel("notes", Arc::new(MergeMap))
        .add_node(
            "inner",
            AppendValue {
                field: "notes",
                value: "x",
            },
        )
        .add_edge("Start", "inner")
        .compile()
        .unwrap();

    let err = GraphBuilder::new()
        .add_channel("notes", Arc::new(MergeMap))
        .add_channel("plan", Arc::new(Replace))
        .add_subgraph(
            "child",
            child,
            SubGraphSpec::new()
                .with_inputs(&["plan"])
                .with_exports(&["notes"]),
        )
        .add_edge("Start", "child")
        .compile()
        .unwrap_err();
    assert!(
        matches!(err, GraphDefinitionError::UnknownChildField { field, .. } if field == "plan")
    );
}
