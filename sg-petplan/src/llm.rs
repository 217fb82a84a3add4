//! Model invocation collaborator contract.
//!
//! The engine never talks to a model directly; workflow nodes go through
//! [`ModelClient`]. A reply is either free text or a single requested action.
//! Transient backend failures are retried inside the [`Retrying`] decorator —
//! invisible to the workflows — and only then surfaced as fatal.

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use stepgraph::message::Message;

/// An action advertised to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
}

impl ActionSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A single action requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ActionRequest {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Model output: free text, or exactly one requested action.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelReply {
    Text(String),
    Action(ActionRequest),
}

/// One model invocation.
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Actions the model may request. Empty means plain-text only.
    pub actions: Vec<ActionSpec>,
    /// Require the model to request this specific action.
    pub force_action: Option<String>,
    /// JSON schema the text reply must conform to (structured output).
    pub response_schema: Option<Value>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            actions: Vec::new(),
            force_action: None,
            response_schema: None,
        }
    }

    #[must_use]
    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_forced_action(mut self, name: impl Into<String>) -> Self {
        self.force_action = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Model invocation failures.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    /// Worth retrying: rate limits, timeouts, transport hiccups.
    #[error("transient model failure: {0}")]
    #[diagnostic(code(sg_petplan::llm::transient))]
    Transient(String),

    /// Not worth retrying: auth, invalid request, provider rejection.
    #[error("model invocation failed: {0}")]
    #[diagnostic(code(sg_petplan::llm::fatal))]
    Fatal(String),
}

impl ModelError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }
}

/// The remote model boundary.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, request: ChatRequest) -> Result<ModelReply, ModelError>;
}

/// Retries transient failures with jittered exponential backoff before
/// giving up. Wrap every production client in this; workflows assume the
/// retry happens below them.
pub struct Retrying<C> {
    inner: C,
    max_attempts: u32,
}

impl<C> Retrying<C> {
    #[must_use]
    pub fn new(inner: C, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
        }
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for Retrying<C> {
    async fn invoke(&self, request: ChatRequest) -> Result<ModelReply, ModelError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.invoke(request.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let jitter = rand::random::<u64>() % 25;
                    let backoff = Duration::from_millis(50u64 << attempt.min(6))
                        + Duration::from_millis(jitter);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "transient model failure; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyModel {
        failures: AtomicU32,
    }

    #[async_trait]
    impl ModelClient for FlakyModel {
        async fn invoke(&self, _request: ChatRequest) -> Result<ModelReply, ModelError> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(ModelError::Transient("timeout".into()))
            } else {
                Ok(ModelReply::Text("ok".into()))
            }
        }
    }

    #[tokio::test]
    async fn retrying_absorbs_transient_failures() {
        let client = Retrying::new(
            FlakyModel {
                failures: AtomicU32::new(2),
            },
            3,
        );
        let reply = client
            .invoke(ChatRequest::new("m", vec![]))
            .await
            .expect("retries should succeed");
        assert_eq!(reply, ModelReply::Text("ok".into()));
    }

    #[tokio::test]
    async fn retrying_gives_up_after_budget() {
        let client = Retrying::new(
            FlakyModel {
                failures: AtomicU32::new(10),
            },
            2,
        );
        let err = client.invoke(ChatRequest::new("m", vec![])).await;
        assert!(matches!(err, Err(ModelError::Transient(_))));
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        struct AlwaysFatal;
        #[async_trait]
        impl ModelClient for AlwaysFatal {
            async fn invoke(&self, _request: ChatRequest) -> Result<ModelReply, ModelError> {
                Err(ModelError::Fatal("bad key".into()))
            }
        }
        let client = Retrying::new(AlwaysFatal, 5);
        let err = client.invoke(ChatRequest::new("m", vec![])).await;
        assert!(matches!(err, Err(ModelError::Fatal(_))));
    }
}
