use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use nova_jdwp::{
    signature_to_class_name, AttachOptions, ConnectionHandle, EventKind, JdwpClient, JdwpError,
    JdwpEvent, LaunchOptions, SuspendPolicy,
};
use parking_lot::Mutex;

use crate::config::DebuggerConfig;
use crate::dispatch::{EventDispatchLoop, LoopState};
use crate::error::{DebuggerError, Result};
use crate::metadata::TypeMetadataCache;
use crate::pipeline::{ConsumerFailure, ConsumerId, PipelineRegistry};
use crate::profile::{DebugProfile, PureDebugProfile, SwappableProfile};
use crate::request::{RegistryDefaults, RequestId, RequestManagers, RequestOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Started,
    Stopped,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Started => "started",
            SessionState::Stopped => "stopped",
        }
    }
}

/// How [`DebugSession::start`] reaches the debuggee.
#[derive(Clone, Debug)]
pub enum ConnectTarget {
    Attach(AttachOptions),
    Launch(LaunchOptions),
}

/// State the dispatch thread updates when the connection goes away.
struct Shared {
    state: Mutex<SessionState>,
    connection: Mutex<Option<ConnectionHandle>>,
    connection_lost: AtomicBool,
}

/// What `bootstrap` subscribed and installed, so a failed start can undo it.
#[derive(Default)]
struct Bootstrap {
    consumers: Vec<(EventKind, ConsumerId)>,
    class_prepare: Option<RequestId>,
    class_unload: Option<RequestId>,
}

/// One debuggee connection and everything built on top of it.
///
/// The session owns the request managers, the pipeline roots, the dispatch
/// loop and the type metadata cache; all of them are dropped with it.
/// Requests are made through [`DebugSession::profiles`], which forwards to
/// the active [`DebugProfile`].
pub struct DebugSession {
    client: Arc<dyn JdwpClient>,
    managers: Arc<RequestManagers>,
    pipelines: Arc<PipelineRegistry>,
    metadata: Arc<TypeMetadataCache>,
    dispatch: EventDispatchLoop,
    profiles: SwappableProfile,
    shared: Arc<Shared>,
    /// Serializes start, stop and profile swaps. Shared with `profiles`.
    lifecycle: Arc<Mutex<()>>,
}

impl DebugSession {
    pub fn new(client: Arc<dyn JdwpClient>, config: &DebuggerConfig) -> Self {
        let managers = Arc::new(RequestManagers::new(
            client.clone(),
            RegistryDefaults {
                suspend_policy: config.requests.default_suspend_policy.into(),
                pending_enabled: config.requests.pending_enabled,
            },
        ));
        let pipelines = Arc::new(PipelineRegistry::new(
            config.dispatch.failure_channel_capacity,
        ));
        let metadata = Arc::new(TypeMetadataCache::new());
        let dispatch = EventDispatchLoop::new(
            client.clone(),
            pipelines.clone(),
            config.dispatch.poll_interval(),
        );
        let pure: Arc<dyn DebugProfile> = Arc::new(PureDebugProfile::new(
            client.clone(),
            managers.clone(),
            pipelines.clone(),
            metadata.clone(),
        ));
        let profiles = SwappableProfile::new(config.profiles.default.clone(), pure);
        let lifecycle = profiles.swap_lock();

        Self {
            client,
            managers,
            pipelines,
            metadata,
            dispatch,
            profiles,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Created),
                connection: Mutex::new(None),
                connection_lost: AtomicBool::new(false),
            }),
            lifecycle,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Connect to the debuggee and start delivering events.
    pub fn start(&self, target: ConnectTarget) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let state = self.state();
        if state != SessionState::Created {
            return Err(DebuggerError::InvalidState {
                expected: SessionState::Created.as_str(),
                actual: state.as_str(),
            });
        }

        let handle = match &target {
            ConnectTarget::Attach(options) => self.client.attach(options)?,
            ConnectTarget::Launch(options) => self.client.launch(options)?,
        };
        *self.shared.connection.lock() = Some(handle);
        tracing::info!(target = "nova.debugger", connection = %handle, "debuggee connected");

        let mut bootstrap = Bootstrap::default();
        if let Err(err) = self.bootstrap(&mut bootstrap) {
            self.undo_bootstrap(bootstrap);
            self.release_connection();
            return Err(err);
        }

        {
            let shared = self.shared.clone();
            let client = self.client.clone();
            self.dispatch
                .set_disconnect_hook(Arc::new(move |err: &JdwpError| {
                    if let Some(handle) = shared.connection.lock().take() {
                        client.dispose(handle);
                    }
                    shared.connection_lost.store(true, Ordering::SeqCst);
                    *shared.state.lock() = SessionState::Stopped;
                    tracing::error!(target = "nova.debugger", error = %err, "debug session stopped after connection loss");
                }));
        }

        // Set before the loop runs so a connection loss on its first poll wins.
        *self.shared.state.lock() = SessionState::Started;
        if let Err(err) = self.dispatch.start() {
            *self.shared.state.lock() = SessionState::Created;
            self.undo_bootstrap(bootstrap);
            self.release_connection();
            return Err(err);
        }
        Ok(())
    }

    /// Subscribe the metadata handlers and install the requests they rely on.
    fn bootstrap(&self, installed: &mut Bootstrap) -> Result<()> {
        {
            let client = self.client.clone();
            let metadata = self.metadata.clone();
            let consumer = self
                .pipelines
                .pipeline(EventKind::VmStart)
                .foreach(move |_| match metadata.refresh_all(client.as_ref()) {
                    Ok(count) => {
                        tracing::debug!(target = "nova.debugger", types = count, "loaded type metadata on vm start");
                    }
                    Err(err) => {
                        tracing::warn!(target = "nova.debugger", error = %err, "failed to load type metadata on vm start");
                    }
                });
            installed.consumers.push((EventKind::VmStart, consumer));
        }

        let options = RequestOptions::default().suspend(SuspendPolicy::None);
        let prepare_id = self
            .managers
            .class_prepares
            .create_unkeyed(RequestId::new(), options.clone())?;
        installed.class_prepare = Some(prepare_id);
        let unload_id = self
            .managers
            .class_unloads
            .create_unkeyed(RequestId::new(), options)?;
        installed.class_unload = Some(unload_id);

        {
            let client = self.client.clone();
            let managers = self.managers.clone();
            let metadata = self.metadata.clone();
            let lookup = self.managers.clone();
            let consumer = self
                .pipelines
                .pipeline(EventKind::ClassPrepare)
                .filter_map(move |raw| match &raw.event {
                    JdwpEvent::ClassPrepare(event)
                        if lookup.class_prepares.id_for_handle(event.request_id)
                            == Some(prepare_id) =>
                    {
                        Some(event.type_id)
                    }
                    _ => None,
                })
                .foreach(move |&type_id| {
                    let meta = match metadata.refresh_type(client.as_ref(), type_id) {
                        Ok(meta) => meta,
                        Err(err) => {
                            tracing::warn!(target = "nova.debugger", type_id, error = %err, "failed to load metadata for prepared class");
                            return;
                        }
                    };
                    let retried = managers.retry_pending(&meta.info);
                    if !retried.is_empty() {
                        tracing::debug!(target = "nova.debugger", class = %meta.name, installed = retried.len(), "installed pending requests");
                    }
                });
            installed.consumers.push((EventKind::ClassPrepare, consumer));
        }

        {
            let managers = self.managers.clone();
            let metadata = self.metadata.clone();
            let consumer = self
                .pipelines
                .pipeline(EventKind::ClassUnload)
                .filter_map(move |raw| match &raw.event {
                    JdwpEvent::ClassUnload(event)
                        if managers.class_unloads.id_for_handle(event.request_id)
                            == Some(unload_id) =>
                    {
                        Some(signature_to_class_name(&event.signature))
                    }
                    _ => None,
                })
                .foreach(move |name| {
                    if metadata.remove(name).is_some() {
                        tracing::trace!(target = "nova.debugger", class = %name, "dropped metadata of unloaded class");
                    }
                });
            installed.consumers.push((EventKind::ClassUnload, consumer));
        }
        Ok(())
    }

    /// Must run while the connection is still open so the requests are cleared in the VM.
    fn undo_bootstrap(&self, installed: Bootstrap) {
        for (kind, consumer) in installed.consumers {
            self.pipelines.pipeline(kind).unsubscribe(consumer);
        }
        if let Some(id) = installed.class_prepare {
            self.managers.class_prepares.remove_by_id(&id);
        }
        if let Some(id) = installed.class_unload {
            self.managers.class_unloads.remove_by_id(&id);
        }
        tracing::debug!(target = "nova.debugger", "bootstrap undone after failed start");
    }

    fn release_connection(&self) {
        if let Some(handle) = self.shared.connection.lock().take() {
            self.client.dispose(handle);
        }
    }

    /// Stop delivering events and release the connection. Terminal.
    ///
    /// Installed requests are not cleared; they go away with the connection.
    pub fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let state = self.state();
        if state != SessionState::Started {
            return Err(DebuggerError::InvalidState {
                expected: SessionState::Started.as_str(),
                actual: state.as_str(),
            });
        }

        match self.dispatch.stop() {
            // The loop already ended on its own.
            Ok(()) | Err(DebuggerError::InvalidState { .. }) => {}
            Err(err) => return Err(err),
        }
        self.release_connection();
        *self.shared.state.lock() = SessionState::Stopped;
        tracing::info!(target = "nova.debugger", "debug session stopped");
        Ok(())
    }

    /// The profile dispatcher every debugging operation goes through.
    ///
    /// Swapping or registering through it takes the same lock as
    /// [`DebugSession::start`] and [`DebugSession::stop`].
    pub fn profiles(&self) -> &SwappableProfile {
        &self.profiles
    }

    pub fn use_profile(&self, name: &str) -> Result<()> {
        self.profiles.use_profile(name)
    }

    pub fn register_profile(&self, name: impl Into<String>, profile: Arc<dyn DebugProfile>) {
        self.profiles.register(name, profile);
    }

    pub fn client(&self) -> &Arc<dyn JdwpClient> {
        &self.client
    }

    pub fn managers(&self) -> &Arc<RequestManagers> {
        &self.managers
    }

    pub fn pipelines(&self) -> &Arc<PipelineRegistry> {
        &self.pipelines
    }

    pub fn metadata(&self) -> &Arc<TypeMetadataCache> {
        &self.metadata
    }

    pub fn dispatch_state(&self) -> LoopState {
        self.dispatch.state()
    }

    pub fn failures(&self) -> Receiver<ConsumerFailure> {
        self.pipelines.failures()
    }

    /// Take the oldest queued consumer failure as an error, if there is one.
    pub fn check_failures(&self) -> Result<()> {
        match self.pipelines.failures().try_recv() {
            Ok(failure) => Err(failure.into()),
            Err(_) => Ok(()),
        }
    }

    /// Whether the session stopped because the debuggee went away.
    pub fn connection_lost(&self) -> bool {
        self.shared.connection_lost.load(Ordering::SeqCst)
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        *self.shared.connection.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_jdwp::{MockClass, MockJdwpClient};
    use pretty_assertions::assert_eq;

    fn session() -> (Arc<MockJdwpClient>, DebugSession) {
        let mock = Arc::new(MockJdwpClient::new());
        let session = DebugSession::new(mock.clone(), &DebuggerConfig::default());
        (mock, session)
    }

    fn attach() -> ConnectTarget {
        ConnectTarget::Attach(AttachOptions {
            addr: "127.0.0.1:5005".parse().unwrap(),
        })
    }

    #[test]
    fn lifecycle_transitions() {
        let (mock, session) = session();
        assert_eq!(session.state(), SessionState::Created);
        assert!(matches!(
            session.stop(),
            Err(DebuggerError::InvalidState { .. })
        ));

        session.start(attach()).unwrap();
        assert_eq!(session.state(), SessionState::Started);
        assert_eq!(session.dispatch_state(), LoopState::Running);
        let connection = session.connection().unwrap();

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(mock.disposed_connections(), vec![connection]);
        assert!(!session.connection_lost());

        assert!(matches!(
            session.start(attach()),
            Err(DebuggerError::InvalidState { .. })
        ));
        assert!(matches!(
            session.stop(),
            Err(DebuggerError::InvalidState { .. })
        ));
    }

    #[test]
    fn bootstrap_requests_are_not_keyed() {
        let (mock, session) = session();
        mock.define_class(MockClass::new("Main"));
        session.start(attach()).unwrap();

        assert_eq!(mock.installed_requests(EventKind::ClassPrepare).len(), 1);
        assert_eq!(mock.installed_requests(EventKind::ClassUnload).len(), 1);
        assert!(session
            .profiles()
            .list_requests(EventKind::ClassPrepare)
            .is_empty());
        session.stop().unwrap();
    }

    #[test]
    fn failed_connect_leaves_the_session_created() {
        let (mock, session) = session();
        mock.disconnect();
        assert!(matches!(
            session.start(attach()),
            Err(DebuggerError::ConnectionLost)
        ));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn failed_start_removes_bootstrap_requests_and_consumers() {
        let (mock, session) = session();
        let bootstrap_consumers = || {
            [EventKind::VmStart, EventKind::ClassPrepare, EventKind::ClassUnload]
                .map(|kind| session.pipelines().consumer_count(kind))
        };

        // The class-prepare request installs, the class-unload one does not.
        mock.fail_event_request_set_after(1);
        assert!(matches!(
            session.start(attach()),
            Err(DebuggerError::Jdwp(JdwpError::VmError(_)))
        ));
        assert_eq!(session.state(), SessionState::Created);
        assert!(session.managers().class_prepares.list_ids().is_empty());
        assert!(session.managers().class_unloads.list_ids().is_empty());
        assert!(mock.installed_requests(EventKind::ClassPrepare).is_empty());
        assert_eq!(bootstrap_consumers(), [0, 0, 0]);
        assert_eq!(session.connection(), None);

        mock.stop_failing_event_request_set();
        session.start(attach()).unwrap();
        assert_eq!(session.managers().class_prepares.list_ids().len(), 1);
        assert_eq!(mock.installed_requests(EventKind::ClassPrepare).len(), 1);
        assert_eq!(mock.installed_requests(EventKind::ClassUnload).len(), 1);
        assert_eq!(bootstrap_consumers(), [1, 1, 1]);
        session.stop().unwrap();
    }

    #[test]
    fn profile_swaps_wait_for_start_and_stop() {
        let (_mock, session) = session();
        session.register_profile("other", session.profiles().active());

        let lifecycle = session.lifecycle.lock();
        std::thread::scope(|scope| {
            let swap = scope.spawn(|| session.profiles().use_profile("other"));
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert_eq!(session.profiles().active_name(), PureDebugProfile::NAME);
            drop(lifecycle);
            swap.join().unwrap().unwrap();
        });
        assert_eq!(session.profiles().active_name(), "other");
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let (_mock, session) = session();
        assert!(matches!(
            session.use_profile("missing"),
            Err(DebuggerError::UnknownStrategy(_))
        ));
        assert_eq!(session.profiles().active_name(), PureDebugProfile::NAME);
    }
}
