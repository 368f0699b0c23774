use std::sync::Arc;

use nova_debugger::{EventPipeline, PipelineRegistry, RawEvent};
use nova_jdwp::{EventKind, JdwpEvent, ThreadEvent, ThreadId};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn thread_start(thread: ThreadId) -> RawEvent {
    RawEvent::detached(JdwpEvent::ThreadStart(ThreadEvent {
        request_id: 1,
        thread,
    }))
}

fn thread_of(raw: &RawEvent) -> ThreadId {
    raw.event.thread().unwrap_or_default()
}

fn collect<T: Clone + Send + 'static>(pipeline: &EventPipeline<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    pipeline.foreach(move |value: &T| sink.lock().push(value.clone()));
    seen
}

#[test]
fn filter_then_map_matches_a_manual_consumer() {
    let registry = PipelineRegistry::new(8);
    let root = registry.pipeline(EventKind::ThreadStart);
    let keep = |raw: &RawEvent| thread_of(raw) % 3 != 0;
    let label = |raw: RawEvent| format!("thread-{}", thread_of(&raw));

    let derived = collect(&root.filter(keep).map(label));
    let manual = Arc::new(Mutex::new(Vec::new()));
    {
        let manual = manual.clone();
        root.foreach(move |raw| {
            if keep(raw) {
                manual.lock().push(label(raw.clone()));
            }
        });
    }

    for thread in [4, 3, 9, 1, 7, 6, 2] {
        registry.deliver(&thread_start(thread));
    }
    assert_eq!(*derived.lock(), *manual.lock());
    assert_eq!(
        *derived.lock(),
        vec!["thread-4", "thread-1", "thread-7", "thread-2"]
    );
}

#[test]
fn a_new_consumer_sees_no_history() {
    let registry = PipelineRegistry::new(8);
    let root = registry.pipeline(EventKind::ThreadStart).map(|raw| thread_of(&raw));

    let first = Arc::new(Mutex::new(Vec::new()));
    let first_id = {
        let first = first.clone();
        root.foreach(move |thread| first.lock().push(*thread))
    };
    for thread in 1..=3 {
        registry.deliver(&thread_start(thread));
    }
    assert!(root.unsubscribe(first_id));

    let second = collect(&root);
    for thread in 4..=5 {
        registry.deliver(&thread_start(thread));
    }
    assert_eq!(*first.lock(), vec![1, 2, 3]);
    assert_eq!(*second.lock(), vec![4, 5]);
}

#[test]
fn stripping_data_matches_discarding_it_by_hand() {
    let registry = PipelineRegistry::new(8);
    let with_data = registry
        .pipeline(EventKind::ThreadStart)
        .map(|raw| (thread_of(&raw), format!("data for {}", thread_of(&raw))));

    let stripped = collect(&with_data.without_data());
    let by_hand = collect(&with_data.map(|(thread, _)| thread));
    for thread in [8, 2, 5] {
        registry.deliver(&thread_start(thread));
    }
    assert_eq!(*stripped.lock(), vec![8, 2, 5]);
    assert_eq!(*stripped.lock(), *by_hand.lock());
}

#[test]
fn union_preserves_delivery_order_across_kinds() {
    let registry = PipelineRegistry::new(8);
    let starts = registry
        .pipeline(EventKind::ThreadStart)
        .map(|raw| format!("start {}", thread_of(&raw)));
    let deaths = registry
        .pipeline(EventKind::ThreadDeath)
        .map(|raw| format!("death {}", thread_of(&raw)));
    let both = starts.union(&deaths);
    assert_eq!(both.kinds(), vec![EventKind::ThreadStart, EventKind::ThreadDeath]);
    let seen = collect(&both);

    registry.deliver(&thread_start(1));
    registry.deliver(&RawEvent::detached(JdwpEvent::ThreadDeath(ThreadEvent {
        request_id: 2,
        thread: 1,
    })));
    registry.deliver(&thread_start(2));
    assert_eq!(*seen.lock(), vec!["start 1", "death 1", "start 2"]);
}

#[test]
fn pipelines_outliving_their_registry_are_inert() {
    let registry = PipelineRegistry::new(8);
    let pipeline = registry.pipeline(EventKind::ThreadStart);
    assert!(!pipeline.is_closed());
    drop(registry);
    assert!(pipeline.is_closed());
    assert_eq!(
        pipeline.foreach(|_| {}),
        nova_debugger::ConsumerId::DETACHED
    );
}

#[tokio::test]
async fn to_future_resolves_with_the_next_value() {
    let registry = Arc::new(PipelineRegistry::new(8));
    let next = registry
        .pipeline(EventKind::ThreadStart)
        .map(|raw| thread_of(&raw))
        .to_future();

    let producer = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            registry.deliver(&thread_start(42));
            registry.deliver(&thread_start(43));
        })
    };
    assert_eq!(next.await.unwrap(), 42);
    producer.join().unwrap();
    // The one-shot consumer removed itself after the first value.
    assert_eq!(registry.consumer_count(EventKind::ThreadStart), 0);
}
