//! Versioned storage cell for one state field.
//!
//! Every declared field of a [`WorkflowState`](crate::state::WorkflowState)
//! lives in a [`FieldChannel`]: the current JSON value plus a version counter.
//! Reducers and the barrier mutate the value; only the barrier bumps the
//! version, and only when the content actually changed.

use serde_json::Value;

/// One field's value and version.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldChannel {
    value: Value,
    version: u32,
}

impl FieldChannel {
    #[must_use]
    pub fn new(value: Value, version: u32) -> Self {
        Self { value, version }
    }

    /// Borrow the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Mutable access to the value. Does not touch the version; that is the
    /// barrier's responsibility.
    pub fn get_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Clone the current value.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.value.clone()
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutation_leaves_version_alone() {
        let mut channel = FieldChannel::new(json!([]), 1);
        channel
            .get_mut()
            .as_array_mut()
            .unwrap()
            .push(json!("entry"));
        assert_eq!(channel.version(), 1);
        assert_eq!(channel.snapshot(), json!(["entry"]));
    }

    #[test]
    fn snapshot_is_independent() {
        let mut channel = FieldChannel::new(json!({"k": 1}), 1);
        let snap = channel.snapshot();
        *channel.get_mut() = json!({"k": 2});
        assert_eq!(snap, json!({"k": 1}));
    }
}
