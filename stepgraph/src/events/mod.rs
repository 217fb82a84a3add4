//! Best-effort progress event channel.
//!
//! Nodes report business-level progress through a fire-and-forget emitter;
//! a [`ProgressBus`] broadcasts events to attached sinks. With no bus (or no
//! sinks) attached, events are silently dropped so the same workflow runs
//! identically in streaming and non-streaming contexts.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod sink;

pub use bus::ProgressBus;
pub use emitter::ProgressEmitter;
pub use event::{DiagnosticEvent, Event, ProgressEvent, RUN_END_SCOPE};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
