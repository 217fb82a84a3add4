use std::sync::{Arc, Mutex};

use tokio::{sync::oneshot, task};

use super::emitter::ProgressEmitter;
use super::event::Event;
use super::sink::EventSink;

/// Receives events from emitters and broadcasts them to attached sinks.
///
/// The default bus has no sinks: events are received and discarded, which is
/// the non-streaming mode. Attach sinks before execution starts; the listener
/// task drains the channel in the background.
///
/// # Example
///
/// ```no_run
/// use stepgraph::events::{Event, MemorySink, ProgressBus};
///
/// # async fn example() {
/// let sink = MemorySink::new();
/// let bus = ProgressBus::with_sink(sink.clone());
/// bus.listen_for_events();
///
/// let emitter = bus.emitter();
/// emitter.emit(Event::diagnostic("demo", "hello"));
///
/// drop(emitter);
/// bus.shutdown().await;
/// assert_eq!(sink.snapshot().len(), 1);
/// # }
/// ```
pub struct ProgressBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    tx: flume::Sender<Event>,
    rx: flume::Receiver<Event>,
    listener: Mutex<Option<ListenerState>>,
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    /// A bus with no sinks attached (events are drained and dropped).
    #[must_use]
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// A bus with a single sink.
    #[must_use]
    pub fn with_sink<T: EventSink + 'static>(sink: T) -> Self {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// A bus with multiple sinks.
    #[must_use]
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            tx,
            rx,
            listener: Mutex::new(None),
        }
    }

    /// Dynamically attach a sink (useful for per-request streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.add_boxed_sink(Box::new(sink));
    }

    pub fn add_boxed_sink(&self, sink: Box<dyn EventSink>) {
        self.sinks.lock().unwrap().push(sink);
    }

    /// A cloneable emitter feeding this bus.
    #[must_use]
    pub fn emitter(&self) -> ProgressEmitter {
        ProgressEmitter::new(self.tx.clone())
    }

    /// Spawn the background task that forwards events to all sinks.
    /// Idempotent: calling it again has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.rx.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        // All senders dropped and the queue is drained.
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks_guard = sinks.lock().unwrap();
                            for sink in sinks_guard.iter_mut() {
                                if let Err(e) = sink.handle(&event) {
                                    tracing::debug!(error = %e, "progress sink error");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Close the ingest channel, drain everything still queued, and wait for
    /// the listener to exit. Call after all emitters are dropped.
    pub async fn shutdown(self) {
        let state = self.listener.lock().expect("listener poisoned").take();
        // Dropping the bus closes its sender half; the listener loop then
        // drains remaining events and exits on channel disconnect.
        drop(self);
        if let Some(state) = state {
            let _ = state.handle.await;
            drop(state.shutdown_tx);
        }
    }

    /// Signal the listener to stop without draining. Prefer
    /// [`shutdown`](Self::shutdown) for orderly teardown.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for ProgressBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock()
            && let Some(state) = guard.take()
        {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}
