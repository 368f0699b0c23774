use std::sync::Arc;

use nova_debugger::config::SuspendPolicyConfig;
use nova_debugger::request::BreakpointArgs;
use nova_debugger::{DebugProfile, DebugSession, DebuggerConfig, DebuggerError, RequestOptions};
use nova_jdwp::{EventKind, MockClass, MockJdwpClient, SuspendPolicy};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::support::attach_target;

#[test]
fn session_honours_a_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("debugger.toml");
    std::fs::write(
        &path,
        r#"
[dispatch]
poll_interval_ms = 10

[requests]
default_suspend_policy = "all"
pending_enabled = false

[profiles]
default = "direct"

[logging]
level = "debug"
stderr = false
"#,
    )
    .unwrap();

    let config = DebuggerConfig::load_from_path(&path).unwrap();
    assert_eq!(config.requests.default_suspend_policy, SuspendPolicyConfig::All);
    nova_debugger::init_tracing(&config.logging);

    let mock = Arc::new(MockJdwpClient::new());
    mock.define_class(MockClass::new("Main").source("Main.java").method("main", [4]));
    let session = DebugSession::new(mock.clone(), &config);
    assert_eq!(session.profiles().active_name(), "direct");
    session.start(attach_target()).unwrap();

    session
        .profiles()
        .create_request(BreakpointArgs::new("Main.java", 4).into(), RequestOptions::default())
        .unwrap();
    let (request_id, _) = mock.installed_requests(EventKind::Breakpoint)[0].clone();
    assert_eq!(mock.installed_suspend_policy(request_id), Some(SuspendPolicy::All));

    let err = session
        .profiles()
        .create_request(BreakpointArgs::new("Later.java", 1).into(), RequestOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        DebuggerError::NoResolvableTarget { pending: None, .. }
    ));
    session.stop().unwrap();
}

#[test]
fn unknown_keys_are_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("debugger.toml");
    std::fs::write(&path, "[dispatch]\npoll_interval = 10\n").unwrap();
    assert!(matches!(
        DebuggerConfig::load_from_path(&path),
        Err(nova_debugger::ConfigError::Parse(_))
    ));
    assert!(matches!(
        DebuggerConfig::load_from_path(temp.path().join("missing.toml")),
        Err(nova_debugger::ConfigError::Io { .. })
    ));
}
