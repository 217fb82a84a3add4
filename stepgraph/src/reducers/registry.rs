use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use super::{ReduceError, Reducer};

/// Per-field reducer declarations for one workflow.
///
/// Every state field a node writes must be registered here before the first
/// write; the barrier rejects writes to undeclared fields with
/// [`ChannelError::UnknownField`]. Registration happens at graph-construction
/// time via [`GraphBuilder::add_channel`](crate::graph::GraphBuilder::add_channel),
/// never inferred from value shape.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use stepgraph::reducers::{Append, ChannelRegistry, Replace};
///
/// let mut registry = ChannelRegistry::new();
/// registry
///     .register("transcript", Arc::new(Append))
///     .register("plan", Arc::new(Replace));
///
/// let merged = registry
///     .combine("transcript", json!(["a"]), json!(["b"]))
///     .unwrap();
/// assert_eq!(merged, json!(["a", "b"]));
///
/// assert!(registry.combine("unknown", json!(null), json!(1)).is_err());
/// ```
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    reducers: FxHashMap<String, Arc<dyn Reducer>>,
}

/// Errors raised when applying writes through the registry.
#[derive(Debug, Error, Diagnostic)]
pub enum ChannelError {
    /// A node wrote a field that was never declared.
    #[error("write to undeclared field: {field}")]
    #[diagnostic(
        code(stepgraph::channels::unknown_field),
        help("Declare the field with GraphBuilder::add_channel before any node writes it.")
    )]
    UnknownField { field: String },

    /// The declared reducer rejected the write.
    #[error("reducer failed for field {field}: {source}")]
    #[diagnostic(code(stepgraph::channels::apply))]
    Apply {
        field: String,
        #[source]
        source: ReduceError,
    },
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a reducer for a field. Registering the same field twice
    /// replaces the earlier declaration.
    pub fn register(&mut self, field: impl Into<String>, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducers.insert(field.into(), reducer);
        self
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_channel(mut self, field: impl Into<String>, reducer: Arc<dyn Reducer>) -> Self {
        self.register(field, reducer);
        self
    }

    /// Returns `true` if the field has a declared reducer.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.reducers.contains_key(field)
    }

    /// The zero value of a declared field, or `None` if undeclared.
    #[must_use]
    pub fn zero(&self, field: &str) -> Option<Value> {
        self.reducers.get(field).map(|r| r.zero())
    }

    /// Iterate over the declared field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.reducers.keys().map(String::as_str)
    }

    /// Merge a write into a field's current value using its declared reducer.
    pub fn combine(&self, field: &str, old: Value, new: Value) -> Result<Value, ChannelError> {
        let reducer = self
            .reducers
            .get(field)
            .ok_or_else(|| ChannelError::UnknownField {
                field: field.to_string(),
            })?;
        reducer
            .combine(old, new)
            .map_err(|source| ChannelError::Apply {
                field: field.to_string(),
                source,
            })
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&str> = self.reducers.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("ChannelRegistry")
            .field("fields", &fields)
            .finish()
    }
}
