//! Delta construction helpers.

use serde_json::Value;

use crate::state::StateDelta;

/// An empty state delta.
#[must_use]
pub fn new_delta() -> StateDelta {
    StateDelta::default()
}

/// A delta from `(field, value)` pairs.
///
/// ```
/// use serde_json::json;
/// use stepgraph::utils::collections::delta;
///
/// let d = delta([("plan", json!(null)), ("notes", json!({}))]);
/// assert_eq!(d.len(), 2);
/// ```
#[must_use]
pub fn delta<K, I>(entries: I) -> StateDelta
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect()
}
