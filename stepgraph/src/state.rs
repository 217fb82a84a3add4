//! Channel-backed state for one workflow run.
//!
//! [`WorkflowState`] holds the current value of every declared field for one
//! workflow instance. The executor owns it exclusively for the lifetime of a
//! run; nodes only ever see an immutable [`StateSnapshot`] and hand back
//! deltas, which the barrier merges through the
//! [`ChannelRegistry`](crate::reducers::ChannelRegistry).
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepgraph::reducers::{Append, ChannelRegistry, Replace};
//! use stepgraph::state::WorkflowState;
//!
//! let registry = ChannelRegistry::new()
//!     .with_channel("transcript", Arc::new(Append))
//!     .with_channel("plan", Arc::new(Replace));
//!
//! // Fields start at their channel's zero value.
//! let mut state = WorkflowState::for_registry(&registry);
//! assert_eq!(state.get("transcript"), Some(&json!([])));
//! assert_eq!(state.get("plan"), Some(&json!(null)));
//!
//! // Seeding input before a run overwrites directly.
//! state.set("plan", json!([{"content": "research", "status": "pending"}]));
//!
//! let snapshot = state.snapshot();
//! assert!(snapshot.contains("plan"));
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::channels::FieldChannel;
use crate::reducers::ChannelRegistry;

/// A partial state update returned by a node: field name to new write.
pub type StateDelta = FxHashMap<String, Value>;

/// The state container for one workflow instance.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct WorkflowState {
    channels: FxHashMap<String, FieldChannel>,
}

impl WorkflowState {
    /// Creates a state with every registered field at its zero value,
    /// version 1.
    #[must_use]
    pub fn for_registry(registry: &ChannelRegistry) -> Self {
        let mut channels = FxHashMap::default();
        for field in registry.fields() {
            let zero = registry.zero(field).unwrap_or(Value::Null);
            channels.insert(field.to_string(), FieldChannel::new(zero, 1));
        }
        Self { channels }
    }

    /// Borrow a field's current value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.channels.get(field).map(FieldChannel::value)
    }

    /// Overwrite a field's value directly, preserving its version. Intended
    /// for seeding inputs before a run; mid-run writes go through the barrier.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        let field = field.into();
        match self.channels.get_mut(&field) {
            Some(channel) => *channel.get_mut() = value,
            None => {
                self.channels.insert(field, FieldChannel::new(value, 1));
            }
        }
        self
    }

    /// A field's version, or 0 when the field does not exist.
    #[must_use]
    pub fn version(&self, field: &str) -> u32 {
        self.channels.get(field).map_or(0, FieldChannel::version)
    }

    pub(crate) fn bump_version(&mut self, field: &str) {
        if let Some(channel) = self.channels.get_mut(field) {
            let next = channel.version().saturating_add(1);
            channel.set_version(next);
        }
    }

    /// Iterate over the field names present in this state.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Clone the current values and versions into an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let mut fields = FxHashMap::default();
        let mut versions = FxHashMap::default();
        for (name, channel) in &self.channels {
            fields.insert(name.clone(), channel.snapshot());
            versions.insert(name.clone(), channel.version());
        }
        StateSnapshot { fields, versions }
    }
}

/// Immutable view of the state handed to node handlers.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    fields: FxHashMap<String, Value>,
    versions: FxHashMap<String, u32>,
}

impl StateSnapshot {
    /// Borrow a field's value at snapshot time.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// A field's version at snapshot time, or 0 if absent.
    #[must_use]
    pub fn version(&self, field: &str) -> u32 {
        self.versions.get(field).copied().unwrap_or(0)
    }

    /// Deserialize a field into a typed value.
    ///
    /// Fails with [`StateError::MissingField`] if the field is absent and
    /// [`StateError::Decode`] if the stored JSON does not match `T`.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<T, StateError> {
        let value = self
            .fields
            .get(field)
            .ok_or_else(|| StateError::MissingField {
                field: field.to_string(),
            })?;
        serde_json::from_value(value.clone()).map_err(|source| StateError::Decode {
            field: field.to_string(),
            source,
        })
    }

    /// Like [`get_as`](Self::get_as), but treats an absent or null field as
    /// `None` instead of an error. Useful for `Replace` channels whose zero
    /// value is null.
    pub fn get_as_opt<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, StateError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StateError::Decode {
                    field: field.to_string(),
                    source,
                }),
        }
    }
}

/// Typed-access failures on a snapshot.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    #[error("field not present in snapshot: {field}")]
    #[diagnostic(code(stepgraph::state::missing_field))]
    MissingField { field: String },

    #[error("field {field} failed to deserialize: {source}")]
    #[diagnostic(code(stepgraph::state::decode))]
    Decode {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}
