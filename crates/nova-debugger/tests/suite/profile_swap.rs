use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use nova_debugger::request::ThreadStartArgs;
use nova_debugger::{
    DataPipeline, DebugProfile, EventPipeline, RequestId, RequestOptions, RequestSpec, Result,
};
use nova_jdwp::{
    EventKind, FrameId, JdwpEvent, JdwpVariable, StackFrameInfo, ThreadId, ThreadInfo,
};
use pretty_assertions::assert_eq;

use super::support::{session, started_session, TIMEOUT};

/// Reports its own name as the only thread; `threads()` can be made to block
/// until released.
struct Labelled {
    label: &'static str,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl Labelled {
    fn new(label: &'static str) -> Self {
        Self { label, gate: None }
    }

    fn gated(label: &'static str, entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            label,
            gate: Some((entered, release)),
        }
    }
}

impl DebugProfile for Labelled {
    fn name(&self) -> &str {
        self.label
    }

    fn create_request(&self, _: RequestSpec, _: RequestOptions) -> Result<RequestId> {
        Ok(RequestId::new())
    }

    fn remove_request(&self, _: &RequestSpec) -> bool {
        false
    }

    fn remove_request_by_id(&self, _: EventKind, _: RequestId) -> bool {
        false
    }

    fn has_request(&self, _: &RequestSpec) -> bool {
        false
    }

    fn list_requests(&self, _: EventKind) -> Vec<RequestSpec> {
        Vec::new()
    }

    fn is_request_pending(&self, _: EventKind, _: RequestId) -> bool {
        false
    }

    fn on_request_with_data(
        &self,
        _: RequestSpec,
        _: RequestOptions,
    ) -> Result<DataPipeline<JdwpEvent>> {
        Ok(EventPipeline::empty())
    }

    fn threads(&self) -> Result<Vec<ThreadInfo>> {
        if let Some((entered, release)) = &self.gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        Ok(vec![ThreadInfo {
            id: 1,
            name: self.label.to_string(),
        }])
    }

    fn stack_frames(&self, _: ThreadId) -> Result<Vec<StackFrameInfo>> {
        Ok(Vec::new())
    }

    fn frame_variables(&self, _: ThreadId, _: FrameId) -> Result<Vec<JdwpVariable>> {
        Ok(Vec::new())
    }

    fn resume_all(&self) -> Result<()> {
        Ok(())
    }

    fn suspend_all(&self) -> Result<()> {
        Ok(())
    }
}

fn thread_names(profile: &dyn DebugProfile) -> Vec<String> {
    profile
        .threads()
        .unwrap()
        .into_iter()
        .map(|thread| thread.name)
        .collect()
}

#[test]
fn a_call_in_flight_finishes_on_the_profile_it_started_with() {
    let (_mock, session) = session();
    let session = Arc::new(session);
    let (entered_tx, entered_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(1);
    session.register_profile("a", Arc::new(Labelled::gated("a", entered_tx, release_rx)));
    session.register_profile("b", Arc::new(Labelled::new("b")));
    session.use_profile("a").unwrap();

    let in_flight = {
        let session = session.clone();
        thread::spawn(move || thread_names(session.profiles()))
    };
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    session.use_profile("b").unwrap();
    assert_eq!(session.profiles().active_name(), "b");
    assert_eq!(thread_names(session.profiles()), vec!["b"]);

    release_tx.send(()).unwrap();
    assert_eq!(in_flight.join().unwrap(), vec!["a"]);
}

#[test]
fn swapping_back_restores_the_built_in_profile() {
    let (mock, session) = started_session();
    session.register_profile("b", Arc::new(Labelled::new("b")));

    session.use_profile("b").unwrap();
    assert!(session
        .profiles()
        .on_thread_start(ThreadStartArgs::any(), RequestOptions::default())
        .unwrap()
        .is_closed());
    assert!(mock.installed_requests(EventKind::ThreadStart).is_empty());

    session.use_profile("pure").unwrap();
    assert_eq!(thread_names(session.profiles()), vec!["main"]);
    let starts = session
        .profiles()
        .on_thread_start(ThreadStartArgs::any(), RequestOptions::default())
        .unwrap();
    assert!(!starts.is_closed());
    assert_eq!(mock.installed_requests(EventKind::ThreadStart).len(), 1);
    session.stop().unwrap();
}

#[test]
fn pipelines_keep_delivering_after_a_swap() {
    let (mock, session) = started_session();
    session.register_profile("b", Arc::new(Labelled::new("b")));
    let starts = session
        .profiles()
        .on_thread_start(ThreadStartArgs::any(), RequestOptions::default())
        .unwrap()
        .to_receiver();

    session.use_profile("b").unwrap();
    let emitted = mock.emit_to_requests(EventKind::ThreadStart, |request_id, _| {
        Some(JdwpEvent::ThreadStart(nova_jdwp::ThreadEvent {
            request_id,
            thread: 9,
        }))
    });
    assert_eq!(emitted, 1);
    assert_eq!(starts.recv_timeout(TIMEOUT).unwrap().thread, 9);
    session.stop().unwrap();
}
