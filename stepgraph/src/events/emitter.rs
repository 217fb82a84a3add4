use super::event::Event;

/// Cloneable, fire-and-forget handle for emitting events.
///
/// Emission never blocks and never fails: with no bus attached (or a bus
/// whose listener has gone away) events are silently dropped. This is what
/// lets the same workflow run with or without an observer.
#[derive(Clone, Debug)]
pub struct ProgressEmitter {
    tx: Option<flume::Sender<Event>>,
}

impl ProgressEmitter {
    /// An emitter with no destination; every emit is a no-op.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub(crate) fn new(tx: flume::Sender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emit an event, best-effort.
    pub fn emit(&self, event: Event) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Returns `true` if a bus is attached. Purely informational; callers
    /// must not branch workflow behavior on this.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::disabled()
    }
}
