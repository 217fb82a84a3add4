//! End-to-end run of the batch coordination workflow: research loop,
//! coordination-guide extraction, a four-way week fan-out whose branches
//! finish in reverse dispatch order, structuring, and the final report.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use sg_petplan::coordination::WEEK_COUNT;
use sg_petplan::fields;
use sg_petplan::llm::{ActionRequest, ModelError, ModelReply};
use sg_petplan::report::PetDietPlan;
use sg_petplan::weekly::build_batch_workflow;
use stepgraph::events::{Event, MemorySink};
use stepgraph::message::{Message, Role};

mod common;
use common::*;

const RESEARCH_TASK: &str = "research basics";

fn scripted() -> Arc<ScriptedModel> {
    ScriptedModel::new(|request| {
        match request.model.as_str() {
            "plan-model" => {
                // The same model id serves the research loop and the one-shot
                // coordination extraction; the schema marks the latter.
                if request.response_schema.is_some() {
                    return Ok(ModelReply::Text(coordination_guide_json()));
                }
                let seen = content_with_role(request, Role::Assistant);
                let writes = count_occurrences(&seen, "[action:write_plan]");
                let delegates = count_occurrences(&seen, "[action:delegate_task]");
                if writes == 0 {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "write_plan",
                        json!({"plan": [RESEARCH_TASK]}),
                    )))
                } else if delegates == 0 {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "delegate_task",
                        json!({"content": RESEARCH_TASK}),
                    )))
                } else {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "finalize_research",
                        json!({}),
                    )))
                }
            }
            "sub-model" => Ok(ModelReply::Text(
                "basic research: rotate proteins, avoid chocolate".to_string(),
            )),
            "write-model" => match request.force_action.as_deref() {
                Some("write_note") => Ok(ModelReply::Action(ActionRequest::new(
                    "write_note",
                    json!({
                        "name": "research_basics",
                        "content": "basic research: rotate proteins, avoid chocolate",
                        "kind": "research",
                    }),
                ))),
                Some("week_write_note") => {
                    let week = find_week_number(request).expect("week number in write prompt");
                    Ok(ModelReply::Action(ActionRequest::new(
                        "week_write_note",
                        json!({
                            "name": format!("week_{week}_diet_plan"),
                            "content": format!("WEEK_PLAN week {week}: rotated menu"),
                        }),
                    )))
                }
                other => Err(ModelError::Fatal(format!(
                    "unexpected forced action: {other:?}"
                ))),
            },
            "summary-model" => Ok(ModelReply::Text("research summarized".to_string())),
            "week-model" => {
                let week = find_week_number(request).expect("week number in planner prompt");
                if has_tool_message(request) {
                    Ok(ModelReply::Text(format!(
                        "WEEK_PLAN week {week}: final plan text"
                    )))
                } else {
                    Ok(ModelReply::Action(ActionRequest::new(
                        "web_search",
                        json!({"query": format!("week {week} food")}),
                    )))
                }
            }
            "report-model" => {
                let week = find_week_number(request).expect("week number in note content");
                Ok(ModelReply::Text(weekly_plan_json(week)))
            }
            other => Err(ModelError::Fatal(format!("unexpected model: {other}"))),
        }
    })
}

/// Week 1 searches slowest, week 4 fastest: branches complete in reverse
/// dispatch order, which the accumulate channel must absorb.
fn reversed_delay_search() -> StubSearch {
    StubSearch::with_delays(|query| {
        let week: u64 = query
            .chars()
            .find(|c| c.is_ascii_digit())
            .and_then(|c| c.to_digit(10))
            .unwrap_or(0)
            .into();
        Duration::from_millis((WEEK_COUNT as u64 - week) * 60)
    })
}

#[tokio::test]
async fn batch_workflow_collects_all_weeks_despite_reordered_completion() {
    let model = scripted();
    let sink = MemorySink::new();
    let config = Arc::new(test_config());
    let providers = test_providers(reversed_delay_search());
    let workflow = build_batch_workflow(config, model.clone(), &providers).unwrap();

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

    let final_state = workflow
        .invoke_with_sinks(initial, vec![Box::new(sink.clone())])
        .await
        .unwrap();

    // All four branch outputs arrived regardless of completion order.
    let weekly = final_state
        .get(fields::WEEKLY_PLANS)
        .unwrap()
        .as_array()
        .unwrap();
    assert_eq!(weekly.len(), WEEK_COUNT);
    let mut weeks: Vec<u64> = weekly
        .iter()
        .map(|plan| plan["week"].as_u64().unwrap())
        .collect();
    weeks.sort_unstable();
    assert_eq!(weeks, vec![1, 2, 3, 4]);

    // The note store converged: research note plus one note per week.
    let notes = final_state.get(fields::NOTES).unwrap().as_object().unwrap();
    assert_eq!(notes.len(), WEEK_COUNT + 1);
    assert!(notes.contains_key("research_basics"));
    for week in 1..=WEEK_COUNT {
        assert!(notes.contains_key(&format!("week_{week}_diet_plan")));
    }

    let report: PetDietPlan =
        serde_json::from_value(final_state.get(fields::REPORT).unwrap().clone()).unwrap();
    assert_eq!(report.diet_plan.weeks.len(), WEEK_COUNT);

    // Join semantics: the gather ran exactly once, after everything else.
    let stages: Vec<String> = sink
        .snapshot()
        .iter()
        .filter_map(|event| match event {
            Event::Progress(p) => Some(p.stage.clone()),
            Event::Diagnostic(_) => None,
        })
        .collect();
    assert_eq!(stages.iter().filter(|s| *s == "completed").count(), 1);
    assert_eq!(
        stages.iter().filter(|s| *s == "week_completed").count(),
        WEEK_COUNT
    );
    assert!(stages.iter().any(|s| s == "dispatching"));
    assert!(stages.iter().any(|s| s == "research_finalizing"));
}
