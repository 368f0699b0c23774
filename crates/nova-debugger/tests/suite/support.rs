use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nova_debugger::{ConnectTarget, DebugSession, DebuggerConfig};
use nova_jdwp::{AttachOptions, MockJdwpClient};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn attach_target() -> ConnectTarget {
    ConnectTarget::Attach(AttachOptions {
        addr: "127.0.0.1:5005".parse().unwrap(),
    })
}

fn fast_config() -> DebuggerConfig {
    let mut config = DebuggerConfig::default();
    config.dispatch.poll_interval_ms = 5;
    config
}

/// A session over a fresh mock VM that has not been started yet.
pub fn session() -> (Arc<MockJdwpClient>, DebugSession) {
    let mock = Arc::new(MockJdwpClient::new());
    let session = DebugSession::new(mock.clone(), &fast_config());
    (mock, session)
}

pub fn started_session() -> (Arc<MockJdwpClient>, DebugSession) {
    let (mock, session) = session();
    session.start(attach_target()).unwrap();
    (mock, session)
}

pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        thread::sleep(Duration::from_millis(2));
    }
}
