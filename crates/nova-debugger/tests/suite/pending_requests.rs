use nova_debugger::request::{AccessWatchpointArgs, BreakpointArgs, StepArgs};
use nova_debugger::{DebugProfile, DebuggerError, RequestOptions, RequestSpec};
use nova_jdwp::{EventKind, MockClass, StepDepth, StepSize};
use pretty_assertions::assert_eq;

use super::support::{started_session, wait_until, TIMEOUT};

#[test]
fn breakpoint_in_an_unloaded_class_is_installed_on_class_prepare() {
    let (mock, session) = started_session();
    let profile = session.profiles();
    let spec: RequestSpec = BreakpointArgs::new("Main.scala", 10).into();

    let err = profile
        .create_request(spec.clone(), RequestOptions::default())
        .unwrap_err();
    let id = match err {
        DebuggerError::NoResolvableTarget {
            pending: Some(id), ..
        } => id,
        other => panic!("expected a pending request, got {other:?}"),
    };
    assert!(profile.is_request_pending(EventKind::Breakpoint, id));
    assert!(profile.has_request(&spec));
    assert!(mock.installed_requests(EventKind::Breakpoint).is_empty());

    let hits = profile
        .on_breakpoint(BreakpointArgs::new("Main.scala", 10), RequestOptions::default())
        .unwrap()
        .to_receiver();

    mock.load_class(
        MockClass::new("example.Main")
            .source("Main.scala")
            .method("main", [9, 10]),
    );
    wait_until(|| !profile.is_request_pending(EventKind::Breakpoint, id));
    assert_eq!(mock.installed_requests(EventKind::Breakpoint).len(), 1);
    assert!(session.metadata().get("example.Main").is_some());

    let location = mock.location("example.Main", "main", 10).unwrap();
    assert_eq!(mock.hit_breakpoint(1, location), 1);
    let hit = hits.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(hit.location, location);
    assert_eq!(hit.thread, 1);
    wait_until(|| mock.resumed_threads() == vec![1]);

    session.stop().unwrap();
}

#[test]
fn unrelated_class_loads_leave_pending_requests_alone() {
    let (mock, session) = started_session();
    let profile = session.profiles();
    let err = profile
        .create_request(
            AccessWatchpointArgs::new("example.Config", "port").into(),
            RequestOptions::default(),
        )
        .unwrap_err();
    let id = err.pending_request().unwrap();

    mock.load_class(MockClass::new("example.Other").field("port"));
    wait_until(|| session.metadata().get("example.Other").is_some());
    assert!(profile.is_request_pending(EventKind::FieldAccess, id));

    mock.load_class(MockClass::new("example.Config").field("port"));
    wait_until(|| !profile.is_request_pending(EventKind::FieldAccess, id));
    assert_eq!(mock.installed_requests(EventKind::FieldAccess).len(), 1);

    session.stop().unwrap();
}

#[test]
fn kinds_without_retry_fail_outright() {
    let (_mock, session) = started_session();
    let err = session
        .profiles()
        .create_request(
            StepArgs::new(404, StepSize::Line, StepDepth::Over).into(),
            RequestOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DebuggerError::NoResolvableTarget { pending: None, .. }
    ));
    assert!(session
        .profiles()
        .list_requests(EventKind::SingleStep)
        .is_empty());
    session.stop().unwrap();
}

#[test]
fn removing_a_pending_request_cancels_the_retry() {
    let (mock, session) = started_session();
    let profile = session.profiles();
    let spec: RequestSpec = BreakpointArgs::new("Late.java", 3).into();
    let id = profile
        .create_request(spec.clone(), RequestOptions::default())
        .unwrap_err()
        .pending_request()
        .unwrap();

    assert!(profile.remove_request_by_id(EventKind::Breakpoint, id));
    assert!(!profile.has_request(&spec));

    mock.load_class(MockClass::new("Late").source("Late.java").method("run", [3]));
    wait_until(|| session.metadata().get("Late").is_some());
    assert!(mock.installed_requests(EventKind::Breakpoint).is_empty());
    session.stop().unwrap();
}
