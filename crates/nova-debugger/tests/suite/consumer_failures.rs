use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nova_debugger::request::ThreadStartArgs;
use nova_debugger::{DebugProfile, DebuggerError, RequestOptions};
use nova_jdwp::{EventKind, JdwpEvent, ThreadEvent};
use pretty_assertions::assert_eq;

use super::support::{started_session, wait_until, TIMEOUT};

#[test]
fn failing_consumers_are_reported_and_do_not_stop_delivery() {
    let (mock, session) = started_session();
    let starts = session
        .profiles()
        .on_thread_start(ThreadStartArgs::any(), RequestOptions::default())
        .unwrap();

    let erroring = starts.try_foreach(|event| anyhow::bail!("cannot handle thread {}", event.thread));
    let panicking = starts.foreach(|_| panic!("consumer bug"));
    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = delivered.clone();
        starts.foreach(move |_| {
            delivered.fetch_add(1, Ordering::SeqCst);
        });
    }

    for thread in [5, 6] {
        mock.emit_to_requests(EventKind::ThreadStart, |request_id, _| {
            Some(JdwpEvent::ThreadStart(ThreadEvent { request_id, thread }))
        });
    }
    wait_until(|| delivered.load(Ordering::SeqCst) == 2);

    let failures = session.failures();
    let reports: Vec<_> = (0..4)
        .map(|_| failures.recv_timeout(TIMEOUT).unwrap())
        .collect();
    assert_eq!(
        reports.iter().filter(|f| f.consumer == erroring).count(),
        2
    );
    assert!(reports
        .iter()
        .filter(|f| f.consumer == panicking)
        .all(|f| f.panicked && f.message.contains("consumer bug")));
    assert!(reports
        .iter()
        .any(|f| f.message.contains("cannot handle thread 5")));
    assert!(reports.iter().all(|f| f.kind == EventKind::ThreadStart));

    session.stop().unwrap();
}

#[test]
fn queued_failures_surface_as_errors_one_at_a_time() {
    let (mock, session) = started_session();
    session.check_failures().unwrap();

    let failing = session
        .profiles()
        .on_thread_start(ThreadStartArgs::any(), RequestOptions::default())
        .unwrap()
        .try_foreach(|_| anyhow::bail!("rejected"));
    mock.emit_to_requests(EventKind::ThreadStart, |request_id, _| {
        Some(JdwpEvent::ThreadStart(ThreadEvent { request_id, thread: 9 }))
    });

    let mut error = None;
    wait_until(|| {
        error = session.check_failures().err();
        error.is_some()
    });
    match error {
        Some(DebuggerError::ConsumerFailure(failure)) => {
            assert_eq!(failure.consumer, failing);
            assert_eq!(failure.message, "rejected");
            assert!(!failure.panicked);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    session.check_failures().unwrap();

    session.stop().unwrap();
}
