//! Scripted collaborators for end-to-end workflow tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sg_petplan::config::AgentConfig;
use sg_petplan::llm::{ChatRequest, ModelClient, ModelError, ModelReply};
use sg_petplan::providers::{ProviderError, Providers, SearchProvider, StaticWeather};
use sg_petplan::report::PetInformation;
use stepgraph::message::{Message, Role};

/// A config with distinct model ids so test scripts can dispatch on them.
pub fn test_config() -> AgentConfig {
    AgentConfig {
        plan_model: "plan-model".into(),
        sub_model: "sub-model".into(),
        write_model: "write-model".into(),
        summary_model: "summary-model".into(),
        report_model: "report-model".into(),
        week_model: "week-model".into(),
        max_model_attempts: 3,
        max_structuring_attempts: 3,
    }
}

pub fn test_pet() -> PetInformation {
    PetInformation {
        pet_type: "cat".into(),
        pet_breed: "maltese".into(),
        age: "3 years".into(),
        pet_weight_kg: 4.2,
        pet_health_status: "healthy".into(),
    }
}

/// A model double driven by a closure over the request, recording every call.
pub struct ScriptedModel {
    handler: Box<dyn Fn(&ChatRequest) -> Result<ModelReply, ModelError> + Send + Sync>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(
        handler: impl Fn(&ChatRequest) -> Result<ModelReply, ModelError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(&self, request: ChatRequest) -> Result<ModelReply, ModelError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

/// Canned search results; an optional per-query delay lets tests force
/// fan-out branches to finish out of dispatch order.
pub struct StubSearch {
    pub delay_for: Box<dyn Fn(&str) -> Duration + Send + Sync>,
}

impl StubSearch {
    pub fn instant() -> Self {
        Self {
            delay_for: Box::new(|_| Duration::ZERO),
        }
    }

    pub fn with_delays(delay_for: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            delay_for: Box::new(delay_for),
        }
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<String, ProviderError> {
        tokio::time::sleep((self.delay_for)(query)).await;
        Ok(format!("search results for: {query}"))
    }
}

pub fn test_providers(search: StubSearch) -> Providers {
    Providers::new(Arc::new(search), Arc::new(StaticWeather))
}

/// Concatenated content of all messages with the given role.
pub fn content_with_role(request: &ChatRequest, role: Role) -> String {
    request
        .messages
        .iter()
        .filter(|m| m.has_role(role))
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn has_tool_message(request: &ChatRequest) -> bool {
    request.messages.iter().any(|m| m.has_role(Role::Tool))
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Minimal valid structured weekly plan.
pub fn weekly_plan_json(week: u32) -> String {
    format!(
        r#"{{"week":{week},"diet_adjustment_principle":"high protein","daily_plan":{{"meals":[]}},"special_adjustment_note":"none","suggestions":["fresh water"]}}"#
    )
}

/// A coordination guide with exactly four differentiated assignments.
pub fn coordination_guide_json() -> String {
    let assignments: Vec<String> = (1..=4)
        .map(|week| {
            format!(
                r#"{{"week_number":{week},"theme":"theme {week}","focus_nutrients":["protein"],"constraints":[],"differentiation_note":"week {week} differs","search_keywords":["week {week} food"]}}"#
            )
        })
        .collect();
    format!(
        r#"{{"overall_principle":"balance","weekly_assignments":[{}],"shared_constraints":["no chocolate"],"ingredient_rotation_strategy":"rotate proteins","age_adaptation_note":"adult portions"}}"#,
        assignments.join(",")
    )
}

/// First "week N" ordinal found in the request's user messages.
pub fn find_week_number(request: &ChatRequest) -> Option<u32> {
    let text = content_with_role(request, Role::User);
    let idx = text.find("week ")?;
    text[idx + 5..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()
}

pub fn user_message(content: &str) -> Message {
    Message::user(content)
}
