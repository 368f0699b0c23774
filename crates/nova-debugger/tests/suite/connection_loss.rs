use nova_debugger::request::BreakpointArgs;
use nova_debugger::{DebugProfile, DebuggerError, LoopState, RequestOptions, SessionState};
use nova_jdwp::{EventKind, EventSet, JdwpEvent, MockClass, SuspendPolicy};
use pretty_assertions::assert_eq;

use super::support::{started_session, wait_until};

#[test]
fn losing_the_connection_stops_the_session() {
    let (mock, session) = started_session();
    mock.define_class(MockClass::new("Main").source("Main.java").method("main", [5]));
    let spec = BreakpointArgs::new("Main.java", 5).into();
    session
        .profiles()
        .create_request(spec, RequestOptions::default())
        .unwrap();
    let connection = session.connection().unwrap();

    mock.disconnect();
    wait_until(|| session.state() == SessionState::Stopped);

    assert!(session.connection_lost());
    assert_eq!(session.dispatch_state(), LoopState::Stopped);
    assert_eq!(mock.disposed_connections(), vec![connection]);
    assert!(matches!(
        session.stop(),
        Err(DebuggerError::InvalidState { .. })
    ));
    // Requests stay in memory but can no longer be acted on.
    assert_eq!(session.profiles().list_requests(EventKind::Breakpoint).len(), 1);
    assert!(matches!(
        session.profiles().threads(),
        Err(DebuggerError::ConnectionLost)
    ));
}

#[test]
fn vm_disconnect_event_ends_the_session() {
    let (mock, session) = started_session();
    mock.push_event_set(EventSet::single(SuspendPolicy::None, JdwpEvent::VmDisconnect));
    wait_until(|| session.state() == SessionState::Stopped);
    assert!(session.connection_lost());
}
