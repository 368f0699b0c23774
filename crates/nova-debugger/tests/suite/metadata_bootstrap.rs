use nova_jdwp::MockClass;

use super::support::{attach_target, session, started_session, wait_until};

#[test]
fn classes_loaded_before_start_are_cached_and_dropped_on_unload() {
    let (mock, session) = session();
    let type_id = mock.define_class(MockClass::new("com.example.Main").source("Main.java"));
    session.start(attach_target()).unwrap();

    wait_until(|| session.metadata().get("com.example.Main").is_some());
    let meta = session.metadata().get("com.example.Main").unwrap();
    assert_eq!(meta.type_id(), type_id);

    assert!(mock.unload_class("com.example.Main"));
    wait_until(|| session.metadata().get("com.example.Main").is_none());

    session.stop().unwrap();
}

#[test]
fn classes_prepared_after_start_are_cached() {
    let (mock, session) = started_session();
    assert!(session.metadata().get("com.example.Late").is_none());

    mock.load_class(MockClass::new("com.example.Late"));
    wait_until(|| session.metadata().get("com.example.Late").is_some());

    session.stop().unwrap();
}
