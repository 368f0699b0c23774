use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use nova_debugger::{DebugProfile, LoopState, SessionState};
use nova_jdwp::{EventKind, EventSet, JdwpEvent, SuspendPolicy, ThreadEvent};

use super::support::{started_session, TIMEOUT};

#[test]
fn stop_waits_for_the_event_in_flight() {
    let (mock, session) = started_session();
    let (entered_tx, entered_rx) = bounded(1);
    let finished = Arc::new(AtomicBool::new(false));
    {
        let finished = finished.clone();
        session
            .pipelines()
            .pipeline(EventKind::ThreadStart)
            .foreach(move |_| {
                let _ = entered_tx.send(());
                thread::sleep(Duration::from_millis(200));
                finished.store(true, Ordering::SeqCst);
            });
    }

    mock.push_event_set(EventSet::single(
        SuspendPolicy::All,
        JdwpEvent::ThreadStart(ThreadEvent {
            request_id: 3,
            thread: 2,
        }),
    ));
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    session.stop().unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.dispatch_state(), LoopState::Stopped);
    // The set was resumed before the loop exited.
    assert_eq!(mock.resume_all_calls(), 1);
}

#[test]
fn stopping_keeps_requests_registered() {
    let (_mock, session) = started_session();
    let spec = nova_debugger::request::ThreadDeathArgs::any().into();
    let id = session
        .profiles()
        .create_request(spec, nova_debugger::RequestOptions::default())
        .unwrap();
    session.stop().unwrap();
    assert!(session.managers().has_id(EventKind::ThreadDeath, &id));
}
