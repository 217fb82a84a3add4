//! Workflow graph definition and compilation.
//!
//! [`GraphBuilder`] collects nodes, channels, edges, and embedded
//! sub-workflows, then validates the definition and compiles it into an
//! executable [`Workflow`](crate::workflow::Workflow). Structural problems
//! are [`GraphDefinitionError`]s, raised at compile time where possible; the
//! executor raises the same error class at dispatch time for dynamic routing
//! targets that cannot be validated earlier.

mod builder;
mod compile;

pub use builder::GraphBuilder;
pub use compile::GraphDefinitionError;
