use std::sync::Arc;

use nova_debugger::request::{BreakpointArgs, MethodEntryArgs, RegistryDefaults};
use nova_debugger::{RequestId, RequestManagers, RequestOptions, RequestSpec};
use nova_jdwp::{AttachOptions, EventKind, JdwpClient, MockClass, MockJdwpClient};
use pretty_assertions::assert_eq;

fn managers() -> (Arc<MockJdwpClient>, RequestManagers) {
    let mock = Arc::new(MockJdwpClient::new());
    mock.attach(&AttachOptions {
        addr: "127.0.0.1:5005".parse().unwrap(),
    })
    .unwrap();
    mock.define_class(
        MockClass::new("example.Main")
            .source("Main.java")
            .method("main", [10, 11])
            .method("main$inlined", [10]),
    );
    let managers = RequestManagers::new(mock.clone(), RegistryDefaults::default());
    (mock, managers)
}

#[test]
fn structurally_equal_keys_share_one_request() {
    let (mock, managers) = managers();
    let first = managers
        .breakpoints
        .create(BreakpointArgs::new("Main.java", 10), RequestOptions::default())
        .unwrap();
    let installs = mock.event_request_set_calls();
    // Two methods share line 10, so one logical request has two handles.
    assert_eq!(installs, 2);
    assert_eq!(
        managers
            .breakpoints
            .get(&BreakpointArgs::new("Main.java", 10))
            .unwrap()
            .len(),
        2
    );

    let second = managers
        .breakpoints
        .create(BreakpointArgs::new("Main.java", 10), RequestOptions::default())
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(mock.event_request_set_calls(), installs);
    assert_eq!(managers.breakpoints.list_ids(), vec![first]);
}

#[test]
fn removing_by_id_is_final_and_repeatable() {
    let (mock, managers) = managers();
    let key = BreakpointArgs::new("Main.java", 11);
    let id = managers
        .breakpoints
        .create(key.clone(), RequestOptions::default())
        .unwrap();

    assert!(managers.breakpoints.remove_by_id(&id));
    assert!(!managers.breakpoints.has_id(&id));
    assert!(!managers.breakpoints.has(&key));
    assert_eq!(managers.breakpoints.get_by_id(&id), None);
    assert!(!managers.breakpoints.remove_by_id(&id));
    assert!(mock.installed_requests(EventKind::Breakpoint).is_empty());
    assert!(!managers.breakpoints.remove_by_id(&RequestId::new()));
}

#[test]
fn removing_by_key_and_by_id_are_equivalent() {
    let observe = |by_key: bool| {
        let (mock, managers) = managers();
        let key = BreakpointArgs::new("Main.java", 10);
        let id = managers
            .breakpoints
            .create(key.clone(), RequestOptions::default())
            .unwrap();
        let removed = if by_key {
            managers.breakpoints.remove(&key)
        } else {
            managers.breakpoints.remove_by_id(&id)
        };
        (
            removed,
            managers.breakpoints.has(&key),
            managers.breakpoints.has_id(&id),
            managers.breakpoints.list(),
            mock.installed_requests(EventKind::Breakpoint).len(),
            mock.event_request_clear_calls().len(),
        )
    };
    assert_eq!(observe(true), observe(false));
}

#[test]
fn different_kinds_with_similar_keys_never_collide() {
    let (mock, managers) = managers();
    let breakpoint: RequestSpec = BreakpointArgs::new("Main.java", 10).into();
    let entry: RequestSpec = MethodEntryArgs::new("example.Main", "main").into();

    let bp_id = managers
        .create(breakpoint.clone(), RequestOptions::default())
        .unwrap();
    let entry_id = managers
        .create(entry.clone(), RequestOptions::default())
        .unwrap();
    assert_ne!(bp_id, entry_id);
    assert_eq!(managers.id_of(&breakpoint), Some(bp_id));
    assert_eq!(managers.id_of(&entry), Some(entry_id));
    assert!(!managers.has_id(EventKind::MethodEntry, &bp_id));
    assert!(!managers.has_id(EventKind::Breakpoint, &entry_id));

    assert!(managers.remove(&breakpoint));
    assert!(managers.has(&entry));
    assert_eq!(mock.installed_requests(EventKind::MethodEntry).len(), 1);
    assert_eq!(managers.list(EventKind::MethodEntry), vec![entry]);
}

#[test]
fn concurrent_creates_of_one_key_install_once() {
    let (mock, managers) = managers();
    let managers = Arc::new(managers);
    let ids: Vec<RequestId> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let managers = managers.clone();
                scope.spawn(move || {
                    managers
                        .breakpoints
                        .create(BreakpointArgs::new("Main.java", 11), RequestOptions::default())
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(mock.installed_requests(EventKind::Breakpoint).len(), 1);
}

#[test]
fn requests_are_installed_with_the_default_suspend_policy() {
    let (mock, managers) = managers();
    managers
        .breakpoints
        .create(BreakpointArgs::new("Main.java", 11), RequestOptions::default())
        .unwrap();
    let (request_id, _) = mock.installed_requests(EventKind::Breakpoint)[0].clone();
    assert_eq!(
        mock.installed_suspend_policy(request_id),
        Some(RegistryDefaults::default().suspend_policy)
    );
}
