//! Push-based event pipelines.
//!
//! A [`PipelineRegistry`] owns one root per event kind. An [`EventPipeline`]
//! is only a description: a list of `(root, transform)` sources where the
//! transform fuses every `map`/`filter` applied so far. Deriving a pipeline
//! never touches the roots; calling [`EventPipeline::foreach`] registers a
//! sink (transform + consumer) on each root. Pipelines hold roots weakly, so a
//! pipeline that outlives its session simply becomes inert.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use nova_jdwp::EventKind;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::event::RawEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Returned when subscribing to a pipeline whose roots are gone.
    pub const DETACHED: ConsumerId = ConsumerId(u64::MAX);
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer#{}", self.0)
    }
}

/// A terminal consumer returned an error or panicked.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{consumer} failed on {kind} event: {message}")]
pub struct ConsumerFailure {
    pub consumer: ConsumerId,
    pub kind: EventKind,
    pub message: String,
    pub panicked: bool,
}

#[derive(Clone)]
struct FailureReporter {
    tx: Sender<ConsumerFailure>,
}

impl FailureReporter {
    fn report(&self, failure: ConsumerFailure) {
        tracing::warn!(
            target = "nova.debugger",
            consumer = %failure.consumer,
            kind = %failure.kind,
            panicked = failure.panicked,
            error = %failure.message,
            "event consumer failed"
        );
        match self.tx.try_send(failure) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(failure)) => {
                tracing::warn!(target = "nova.debugger", consumer = %failure.consumer, "consumer failure channel is full; dropping report");
            }
        }
    }
}

type Sink = Arc<dyn Fn(&RawEvent) -> anyhow::Result<()> + Send + Sync>;
type Transform<T> = Arc<dyn Fn(&RawEvent) -> Option<T> + Send + Sync>;

struct PipelineRoot {
    kind: EventKind,
    sinks: RwLock<Vec<(ConsumerId, Sink)>>,
    ids: Arc<AtomicU64>,
    failures: FailureReporter,
}

impl PipelineRoot {
    fn subscribe(&self, id: ConsumerId, sink: Sink) {
        self.sinks.write().push((id, sink));
    }

    fn unsubscribe(&self, id: ConsumerId) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        sinks.len() != before
    }

    fn deliver(&self, raw: &RawEvent) {
        // Consumers added or removed while this event is in flight do not
        // affect its delivery.
        let sinks = self.sinks.read().clone();
        for (id, sink) in sinks {
            let (message, panicked) = match panic::catch_unwind(AssertUnwindSafe(|| sink(raw))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => (format!("{err:#}"), false),
                Err(payload) => (panic_message(payload), true),
            };
            self.failures.report(ConsumerFailure {
                consumer: id,
                kind: self.kind,
                message,
                panicked,
            });
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}

/// Owner of every pipeline root of a session.
pub struct PipelineRegistry {
    roots: RwLock<HashMap<EventKind, Arc<PipelineRoot>>>,
    ids: Arc<AtomicU64>,
    failures: FailureReporter,
    failures_rx: Receiver<ConsumerFailure>,
}

impl PipelineRegistry {
    /// `failure_capacity` bounds the number of unread consumer failure reports.
    pub fn new(failure_capacity: usize) -> Self {
        let (tx, failures_rx) = crossbeam_channel::bounded(failure_capacity.max(1));
        Self {
            roots: RwLock::new(HashMap::new()),
            ids: Arc::new(AtomicU64::new(1)),
            failures: FailureReporter { tx },
            failures_rx,
        }
    }

    /// The identity pipeline of `kind`: every raw event of that kind, verbatim.
    pub fn pipeline(&self, kind: EventKind) -> EventPipeline<RawEvent> {
        let root = self.root(kind);
        EventPipeline {
            sources: vec![Source {
                root: Arc::downgrade(&root),
                transform: Arc::new(|raw: &RawEvent| Some(raw.clone())),
            }],
        }
    }

    fn root(&self, kind: EventKind) -> Arc<PipelineRoot> {
        if let Some(root) = self.roots.read().get(&kind) {
            return root.clone();
        }
        self.roots
            .write()
            .entry(kind)
            .or_insert_with(|| {
                Arc::new(PipelineRoot {
                    kind,
                    sinks: RwLock::new(Vec::new()),
                    ids: self.ids.clone(),
                    failures: self.failures.clone(),
                })
            })
            .clone()
    }

    /// Feed `raw` to every consumer registered for its kind, in registration order.
    pub fn deliver(&self, raw: &RawEvent) {
        let root = self.roots.read().get(&raw.kind()).cloned();
        match root {
            Some(root) => root.deliver(raw),
            None => {
                tracing::trace!(target = "nova.debugger", kind = %raw.kind(), "no pipeline for event kind");
            }
        }
    }

    pub fn consumer_count(&self, kind: EventKind) -> usize {
        self.roots
            .read()
            .get(&kind)
            .map_or(0, |root| root.sinks.read().len())
    }

    /// Reports of failed consumers, oldest first.
    pub fn failures(&self) -> Receiver<ConsumerFailure> {
        self.failures_rx.clone()
    }
}

struct Source<T> {
    root: Weak<PipelineRoot>,
    transform: Transform<T>,
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            transform: self.transform.clone(),
        }
    }
}

/// A composable stream of values derived from raw events.
pub struct EventPipeline<T> {
    sources: Vec<Source<T>>,
}

impl<T> Clone for EventPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
        }
    }
}

impl<T> fmt::Debug for EventPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPipeline")
            .field("kinds", &self.kinds())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> EventPipeline<T> {
    /// A pipeline with no sources; never produces anything.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Whether every root this pipeline reads from has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sources
            .iter()
            .all(|source| source.root.strong_count() == 0)
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self
            .sources
            .iter()
            .filter_map(|source| source.root.upgrade())
            .map(|root| root.kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn unsubscribe(&self, id: ConsumerId) -> bool {
        let mut removed = false;
        for root in self.sources.iter().filter_map(|source| source.root.upgrade()) {
            removed |= root.unsubscribe(id);
        }
        removed
    }
}

impl<T: Send + 'static> EventPipeline<T> {
    fn derive<U>(
        &self,
        make: impl Fn(Transform<T>) -> Transform<U>,
    ) -> EventPipeline<U> {
        EventPipeline {
            sources: self
                .sources
                .iter()
                .map(|source| Source {
                    root: source.root.clone(),
                    transform: make(source.transform.clone()),
                })
                .collect(),
        }
    }

    pub fn map<U, F>(&self, f: F) -> EventPipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.derive(|parent| {
            let f = f.clone();
            let transform: Transform<U> = Arc::new(move |raw: &RawEvent| parent(raw).map(|value| f(value)));
            transform
        })
    }

    pub fn filter<F>(&self, f: F) -> EventPipeline<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.derive(|parent| {
            let f = f.clone();
            let transform: Transform<T> = Arc::new(move |raw: &RawEvent| parent(raw).filter(|value| f(value)));
            transform
        })
    }

    pub fn filter_map<U, F>(&self, f: F) -> EventPipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.derive(|parent| {
            let f = f.clone();
            let transform: Transform<U> = Arc::new(move |raw: &RawEvent| parent(raw).and_then(|value| f(value)));
            transform
        })
    }

    /// Values of both pipelines, in the order their events are delivered.
    pub fn union(&self, other: &EventPipeline<T>) -> EventPipeline<T> {
        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());
        EventPipeline { sources }
    }

    pub fn foreach<F>(&self, consumer: F) -> ConsumerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.try_foreach(move |value| {
            consumer(value);
            Ok(())
        })
    }

    /// Like [`EventPipeline::foreach`], but errors are reported as
    /// [`ConsumerFailure`]s.
    ///
    /// The consumer runs on the dispatch thread while the event's thread is
    /// suspended; it should not block for long.
    pub fn try_foreach<F>(&self, consumer: F) -> ConsumerId
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let consumer = Arc::new(consumer);
        let mut id = None;
        for source in &self.sources {
            let Some(root) = source.root.upgrade() else {
                continue;
            };
            let id = *id.get_or_insert_with(|| ConsumerId(root.ids.fetch_add(1, Ordering::Relaxed)));
            let transform = source.transform.clone();
            let consumer = consumer.clone();
            root.subscribe(
                id,
                Arc::new(move |raw: &RawEvent| match transform(raw) {
                    Some(value) => consumer(&value),
                    None => Ok(()),
                }),
            );
        }
        id.unwrap_or(ConsumerId::DETACHED)
    }

    /// Subscribe `consumer` and unsubscribe it once it returns `false`.
    fn foreach_while<F>(&self, consumer: F) -> ConsumerId
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let done = Arc::new(OnceLock::new());
        let registered: Arc<OnceLock<ConsumerId>> = Arc::new(OnceLock::new());
        let id = {
            let pipeline = self.clone();
            let done = done.clone();
            let registered = registered.clone();
            self.foreach(move |value| {
                if done.get().is_some() || consumer(value) {
                    return;
                }
                let _ = done.set(());
                if let Some(id) = registered.get() {
                    pipeline.unsubscribe(*id);
                }
            })
        };
        let _ = registered.set(id);
        if done.get().is_some() {
            self.unsubscribe(id);
        }
        id
    }

    /// The next value, as a future.
    pub fn to_future(&self) -> oneshot::Receiver<T>
    where
        T: Clone,
    {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.foreach_while(move |value| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(value.clone());
            }
            false
        });
        rx
    }

    /// Every subsequent value, until the receiver is dropped.
    pub fn to_receiver(&self) -> Receiver<T>
    where
        T: Clone,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.foreach_while(move |value| tx.send(value.clone()).is_ok());
        rx
    }
}

impl<E, D> EventPipeline<(E, D)>
where
    E: Send + 'static,
    D: Send + 'static,
{
    /// Strip the side-channel data.
    pub fn without_data(&self) -> EventPipeline<E> {
        self.map(|(event, _)| event)
    }
}
