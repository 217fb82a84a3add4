//! Merge strategies for channel state.
//!
//! A [`Reducer`] decides how a field combines its current value with a new
//! write. Four strategies cover the engine's needs:
//!
//! - [`Replace`]: last write wins; for singular scalars such as a pending
//!   failure reason or the current plan.
//! - [`Append`]: ordered array concatenation; for transcripts, where order is
//!   invocation order and entries are never reordered.
//! - [`MergeMap`]: object union, later write wins per key; for shared
//!   key-value stores such as the note store.
//! - [`Accumulate`]: array concatenation whose consumers treat the result as
//!   a multiset; for collecting fan-out branch outputs.
//!
//! All reducers are associative. `MergeMap` and `Accumulate` are additionally
//! insensitive to the order in which concurrent branch writes arrive, which
//! is what makes barrier merges independent of branch completion order.

mod registry;

pub use registry::{ChannelError, ChannelRegistry};

use serde_json::{Value, json};
use thiserror::Error;

/// A channel merge strategy.
pub trait Reducer: Send + Sync {
    /// Combine the current value with a new write.
    fn combine(&self, old: Value, new: Value) -> Result<Value, ReduceError>;

    /// The value an unset field reads as.
    fn zero(&self) -> Value;
}

/// A write whose shape does not match the channel's strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn into_array(value: Value, expected: &'static str) -> Result<Vec<Value>, ReduceError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        other => Err(ReduceError::TypeMismatch {
            expected,
            got: kind_of(&other),
        }),
    }
}

/// Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replace;

impl Reducer for Replace {
    fn combine(&self, _old: Value, new: Value) -> Result<Value, ReduceError> {
        Ok(new)
    }

    fn zero(&self) -> Value {
        Value::Null
    }
}

/// Ordered concatenation. Writes must be arrays; within one sequential chain
/// the result preserves invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Append;

impl Reducer for Append {
    fn combine(&self, old: Value, new: Value) -> Result<Value, ReduceError> {
        let mut items = into_array(old, "array")?;
        items.extend(into_array(new, "array")?);
        Ok(Value::Array(items))
    }

    fn zero(&self) -> Value {
        json!([])
    }
}

/// Object union; on key collision the later write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeMap;

impl Reducer for MergeMap {
    fn combine(&self, old: Value, new: Value) -> Result<Value, ReduceError> {
        let mut merged = match old {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ReduceError::TypeMismatch {
                    expected: "object",
                    got: kind_of(&other),
                });
            }
        };
        match new {
            Value::Null => {}
            Value::Object(map) => {
                for (k, v) in map {
                    merged.insert(k, v);
                }
            }
            other => {
                return Err(ReduceError::TypeMismatch {
                    expected: "object",
                    got: kind_of(&other),
                });
            }
        }
        Ok(Value::Object(merged))
    }

    fn zero(&self) -> Value {
        json!({})
    }
}

/// Array concatenation for fan-out collection. Consumers must treat the
/// result as order-insensitive: branch completion order is not deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulate;

impl Reducer for Accumulate {
    fn combine(&self, old: Value, new: Value) -> Result<Value, ReduceError> {
        let mut items = into_array(old, "array")?;
        items.extend(into_array(new, "array")?);
        Ok(Value::Array(items))
    }

    fn zero(&self) -> Value {
        json!([])
    }
}
