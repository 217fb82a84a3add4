//! The self-correcting extraction loop, driven standalone.

use std::sync::Arc;

use sg_petplan::fields;
use sg_petplan::llm::{ModelError, ModelReply};
use sg_petplan::notes::Note;
use sg_petplan::structuring::{AssignedNote, StructuringFailure, build_structuring_workflow};
use stepgraph::message::Role;
use stepgraph::state::WorkflowState;

mod common;
use common::*;

async fn run_structuring(model: Arc<ScriptedModel>, note: Note) -> WorkflowState {
    let config = Arc::new(test_config());
    let workflow = build_structuring_workflow(config, model).unwrap();
    let mut initial = workflow.initial_state();
    initial.set(
        fields::ASSIGNED_NOTE,
        serde_json::to_value(AssignedNote {
            name: "week_2_diet_plan".into(),
            note,
        })
        .unwrap(),
    );
    workflow.invoke(initial).await.unwrap()
}

#[tokio::test]
async fn failed_attempt_feeds_its_detail_into_the_retry() {
    let model = ScriptedModel::new(|request| {
        if request.model != "report-model" {
            return Err(ModelError::Fatal("unexpected model".into()));
        }
        let input = content_with_role(request, Role::User);
        if input.starts_with("raw:") {
            Ok(ModelReply::Text(weekly_plan_json(2)))
        } else {
            Ok(ModelReply::Text("{ definitely not a plan".to_string()))
        }
    });

    let final_state = run_structuring(model.clone(), Note::diet_plan("week 2 menu text")).await;

    // Exactly one structured object came out of the two attempts.
    let plans = final_state
        .get(fields::WEEKLY_PLANS)
        .unwrap()
        .as_array()
        .unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["week"], 2);
    assert!(
        final_state
            .get(fields::STRUCTURING_FAILURES)
            .unwrap()
            .as_array()
            .unwrap()
            .is_empty()
    );

    // Attempt 2 saw attempt 1's raw output and parse error.
    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    let retry_input = content_with_role(&calls[1], Role::User);
    assert!(retry_input.starts_with("raw:{ definitely not a plan"));
    assert!(retry_input.contains("error:"));
}

#[tokio::test]
async fn attempt_budget_exhaustion_terminates_with_a_failure_record() {
    let model = ScriptedModel::new(|_request| Ok(ModelReply::Text("still not json".to_string())));

    let final_state = run_structuring(model.clone(), Note::diet_plan("week 2 menu text")).await;

    // Bounded retries: the run terminated instead of looping forever.
    assert_eq!(model.calls().len(), 3);
    assert!(
        final_state
            .get(fields::WEEKLY_PLANS)
            .unwrap()
            .as_array()
            .unwrap()
            .is_empty()
    );

    let failures = final_state
        .get(fields::STRUCTURING_FAILURES)
        .unwrap()
        .as_array()
        .unwrap();
    assert_eq!(failures.len(), 1);
    let failure: StructuringFailure =
        serde_json::from_value(failures[0].clone()).unwrap();
    assert_eq!(failure.note, "week_2_diet_plan");
    assert_eq!(failure.raw, "still not json");
}

#[tokio::test]
async fn research_notes_pass_through_without_extraction() {
    let model = ScriptedModel::new(|_request| {
        Err(ModelError::Fatal("the model must not be called".into()))
    });

    let final_state = run_structuring(model.clone(), Note::research("background notes")).await;

    assert!(model.calls().is_empty());
    assert!(
        final_state
            .get(fields::WEEKLY_PLANS)
            .unwrap()
            .as_array()
            .unwrap()
            .is_empty()
    );
}
