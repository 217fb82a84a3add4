//! External lookup collaborators.
//!
//! Web search and weather stay behind traits so workflows run identically
//! against production backends and scripted test doubles.

use async_trait::async_trait;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

/// Lookup failures, surfaced to the workflow as fatal after the provider's
/// own retry policy is exhausted.
#[derive(Debug, Error, Diagnostic)]
#[error("provider {provider} failed: {message}")]
#[diagnostic(code(sg_petplan::providers::failure))]
pub struct ProviderError {
    pub provider: &'static str,
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
        }
    }
}

/// Internet search for up-to-date material. Callers cap their own usage;
/// the prompt-level "once per task" policy is not enforced here.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, ProviderError>;
}

/// Current-weather lookup.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Result<String, ProviderError>;
}

/// Canned weather answer. The upstream tool this mirrors is itself a stub
/// with a fixed reply.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticWeather;

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current(&self, city: &str) -> Result<String, ProviderError> {
        Ok(format!("The weather in {city} is sunny, 25°C."))
    }
}

/// The lookup collaborators a workflow graph is built with.
#[derive(Clone)]
pub struct Providers {
    pub search: Arc<dyn SearchProvider>,
    pub weather: Arc<dyn WeatherProvider>,
}

impl Providers {
    #[must_use]
    pub fn new(search: Arc<dyn SearchProvider>, weather: Arc<dyn WeatherProvider>) -> Self {
        Self { search, weather }
    }
}
