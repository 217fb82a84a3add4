//! Immutable workflow configuration.
//!
//! Model ids, attempt budgets, and prompt selection are fixed at graph
//! construction and injected into the nodes that need them — never read from
//! ambient global state.

use std::env;

/// Configuration shared by all workflow graphs.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Model driving the planning loops.
    pub plan_model: String,
    /// Model executing delegated tasks.
    pub sub_model: String,
    /// Model writing notes.
    pub write_model: String,
    /// Model summarizing task results.
    pub summary_model: String,
    /// Model used for structured report extraction.
    pub report_model: String,
    /// Model producing the per-week plans.
    pub week_model: String,
    /// Transient-failure retries at the model boundary.
    pub max_model_attempts: u32,
    /// Self-correction budget of the structuring loop.
    pub max_structuring_attempts: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            plan_model: "dashscope:qwen3-max".to_string(),
            sub_model: "zai:glm-4.7".to_string(),
            write_model: "dashscope:qwen-flash".to_string(),
            summary_model: "dashscope:qwen-flash".to_string(),
            report_model: "zai:glm-4.7".to_string(),
            week_model: "zai:glm-4.7".to_string(),
            max_model_attempts: 3,
            max_structuring_attempts: 3,
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by `PETPLAN_*` environment variables
    /// (`.env` is loaded first).
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        Self {
            plan_model: env_or("PETPLAN_PLAN_MODEL", defaults.plan_model),
            sub_model: env_or("PETPLAN_SUB_MODEL", defaults.sub_model),
            write_model: env_or("PETPLAN_WRITE_MODEL", defaults.write_model),
            summary_model: env_or("PETPLAN_SUMMARY_MODEL", defaults.summary_model),
            report_model: env_or("PETPLAN_REPORT_MODEL", defaults.report_model),
            week_model: env_or("PETPLAN_WEEK_MODEL", defaults.week_model),
            max_model_attempts: env_parse("PETPLAN_MAX_MODEL_ATTEMPTS", defaults.max_model_attempts),
            max_structuring_attempts: env_parse(
                "PETPLAN_MAX_STRUCTURING_ATTEMPTS",
                defaults.max_structuring_attempts,
            ),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
