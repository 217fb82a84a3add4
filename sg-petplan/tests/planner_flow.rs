//! End-to-end run of the planner/delegator workflow with scripted
//! collaborators: plan management, one delegated task, note writing, a
//! structuring retry, and the final report.

use std::sync::Arc;

use serde_json::json;

use sg_petplan::fields;
use sg_petplan::llm::{ActionRequest, ModelError, ModelReply};
use sg_petplan::plan::{PlanItem, PlanStatus};
use sg_petplan::planner::build_planner_workflow;
use sg_petplan::report::PetDietPlan;
use stepgraph::events::{Event, MemorySink};
use stepgraph::message::{Message, Role};

mod common;
use common::*;

const TASK: &str = "research nutrition";
const FINAL_ANSWER: &str = "All done. Feed high protein meals.";

fn scripted() -> Arc<ScriptedModel> {
    ScriptedModel::new(|request| {
        match request.model.as_str() {
            "plan-model" => {
                let seen = content_with_role(request, Role::Assistant);
                let writes = count_occurrences(&seen, "[action:write_plan]");
                let updates = count_occurrences(&seen, "[action:update_plan]");
                let delegates = count_occurrences(&seen, "[action:delegate_task]");
                if writes == 0 {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "write_plan",
                        json!({"plan": [TASK]}),
                    )))
                } else if updates == 0 {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "update_plan",
                        json!({"updates": [{"content": TASK, "status": "in_progress"}]}),
                    )))
                } else if delegates == 0 {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "delegate_task",
                        json!({"content": TASK}),
                    )))
                } else if updates == 1 {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "update_plan",
                        json!({"updates": [{"content": TASK, "status": "done"}]}),
                    )))
                } else {
                    Ok(ModelReply::Text(FINAL_ANSWER.to_string()))
                }
            }
            "sub-model" => {
                if has_tool_message(request) {
                    Ok(ModelReply::Text(
                        "Research result: adult cats need 26% protein.".to_string(),
                    ))
                } else {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "web_search",
                        json!({"query": "cat protein requirements"}),
                    )))
                }
            }
            "write-model" => Ok(ModelReply::Action(ActionRequest::new(
                "write_note",
                json!({
                    "name": "week_1_diet_plan",
                    "content": "WEEK_PLAN week 1: chicken and rice",
                    "kind": "diet_plan",
                }),
            ))),
            "summary-model" => Ok(ModelReply::Text("Week 1 plan drafted.".to_string())),
            "report-model" => {
                let input = content_with_role(request, Role::User);
                if input.starts_with("raw:") {
                    Ok(ModelReply::Text(weekly_plan_json(1)))
                } else {
                    Ok(ModelReply::Text("not-json".to_string()))
                }
            }
            other => Err(ModelError::Fatal(format!("unexpected model: {other}"))),
        }
    })
}

async fn run_once(
    model: Arc<ScriptedModel>,
    sink: Option<MemorySink>,
) -> stepgraph::state::WorkflowState {
    let config = Arc::new(test_config());
    let providers = test_providers(StubSearch::instant());
    let workflow = build_planner_workflow(config, model, &providers).unwrap();

    let mut initial = workflow.initial_state();
    initial.set(
        fields::PET_INFORMATION,
        serde_json::to_value(test_pet()).unwrap(),
    );
    initial.set(
        fields::TRANSCRIPT,
        serde_json::to_value(vec![Message::user(
            "Create a monthly diet plan for my cat.",
        )])
        .unwrap(),
    );

    match sink {
        Some(sink) => workflow
            .invoke_with_sinks(initial, vec![Box::new(sink)])
            .await
            .unwrap(),
        None => workflow.invoke(initial).await.unwrap(),
    }
}

#[tokio::test]
async fn planner_workflow_produces_a_full_report() {
    let model = scripted();
    let sink = MemorySink::new();
    let final_state = run_once(model.clone(), Some(sink.clone())).await;

    // The report carries the structured week and the closing summary.
    let report: PetDietPlan =
        serde_json::from_value(final_state.get(fields::REPORT).unwrap().clone()).unwrap();
    assert_eq!(report.diet_plan.weeks.len(), 1);
    assert_eq!(report.diet_plan.weeks[0].week, 1);
    assert_eq!(report.ai_suggestions, FINAL_ANSWER);
    assert_eq!(report.pet_information.pet_breed, "maltese");

    // Plan ended fully done; the note store holds the written plan note.
    let plan: Vec<PlanItem> =
        serde_json::from_value(final_state.get(fields::PLAN).unwrap().clone()).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].status, PlanStatus::Done);

    let notes = final_state.get(fields::NOTES).unwrap();
    assert!(notes.get("week_1_diet_plan").is_some());

    // The failed first extraction fed its detail into the retry attempt.
    let report_calls: Vec<_> = model
        .calls()
        .into_iter()
        .filter(|c| c.model == "report-model")
        .collect();
    assert_eq!(report_calls.len(), 2);
    let retry_input = content_with_role(&report_calls[1], Role::User);
    assert!(retry_input.contains("raw:not-json"));
    assert!(retry_input.contains("error:"));

    // Progress stream: the lifecycle stages appear, and the gather node's
    // completion event fires exactly once.
    let stages: Vec<String> = sink
        .snapshot()
        .iter()
        .filter_map(|event| match event {
            Event::Progress(p) => Some(p.stage.clone()),
            Event::Diagnostic(_) => None,
        })
        .collect();
    for expected in [
        "plan_creating",
        "plan_created",
        "plan_updated",
        "task_delegating",
        "task_executing",
        "task_searching",
        "task_completed",
        "note_saving",
        "note_saved",
        "gathering",
        "structuring",
        "structuring_retry",
        "structured",
        "completed",
    ] {
        assert!(
            stages.iter().any(|s| s == expected),
            "missing stage {expected} in {stages:?}"
        );
    }
    assert_eq!(stages.iter().filter(|s| *s == "completed").count(), 1);
}

#[tokio::test]
async fn unobserved_run_produces_the_same_report() {
    let observed = run_once(scripted(), Some(MemorySink::new())).await;
    let silent = run_once(scripted(), None).await;
    assert_eq!(
        observed.get(fields::REPORT),
        silent.get(fields::REPORT),
        "progress sink must not affect the outcome"
    );
}
