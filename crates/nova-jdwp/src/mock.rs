use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as channel;
use parking_lot::Mutex;

use crate::event::{
    class_pattern_matches, ClassPrepareEvent, ClassUnloadEvent, EventKind, EventModifier,
    EventSet, JdwpEvent, LocatableEvent, RequestHandle, SuspendPolicy, ThreadEvent,
};
use crate::types::{
    class_name_to_signature, AttachOptions, ClassInfo, ConnectionHandle, FieldInfo, FrameId,
    JdwpVariable, LaunchOptions, LineTable, LineTableEntry, Location, MethodId, MethodInfo,
    PhysicalTarget, ReferenceTypeId, StackFrameInfo, TargetQuery, ThreadId, ThreadInfo,
};
use crate::{JdwpClient, JdwpError, ERROR_INVALID_EVENT_TYPE};

/// Class status reported for prepared classes (VERIFIED | PREPARED | INITIALIZED).
const CLASS_STATUS_INITIALIZED: u32 = 7;
const CODE_INDEX_STRIDE: u64 = 4;

/// Description of a class the mock VM can load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockClass {
    pub name: String,
    pub source_file: Option<String>,
    pub methods: Vec<MockMethod>,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockMethod {
    pub name: String,
    pub lines: Vec<u32>,
}

impl MockClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn source(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn method(mut self, name: impl Into<String>, lines: impl IntoIterator<Item = u32>) -> Self {
        self.methods.push(MockMethod {
            name: name.into(),
            lines: lines.into_iter().collect(),
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }
}

#[derive(Debug)]
struct LoadedClass {
    type_id: ReferenceTypeId,
    class: MockClass,
    /// Method ids in declaration order.
    method_ids: Vec<MethodId>,
}

#[derive(Clone, Debug)]
struct InstalledRequest {
    kind: EventKind,
    suspend_policy: SuspendPolicy,
    modifiers: Vec<EventModifier>,
}

#[derive(Debug, Default)]
struct MockState {
    connection: Option<ConnectionHandle>,
    next_connection: u64,
    disposed: Vec<ConnectionHandle>,

    classes: Vec<LoadedClass>,
    next_type_id: ReferenceTypeId,
    next_method_id: MethodId,

    threads: Vec<ThreadInfo>,
    frames: HashMap<ThreadId, Vec<StackFrameInfo>>,
    variables: HashMap<(ThreadId, FrameId), Vec<JdwpVariable>>,

    requests: BTreeMap<i32, InstalledRequest>,
    next_request_id: i32,
    set_calls: usize,
    clear_calls: Vec<RequestHandle>,
    fail_set_after: Option<usize>,

    resumed_threads: Vec<ThreadId>,
    resume_all_calls: usize,
    suspend_all_calls: usize,
}

/// Deterministic, in-memory VM implementing [`JdwpClient`].
///
/// Classes are either defined up front ([`MockJdwpClient::define_class`]) or
/// loaded later ([`MockJdwpClient::load_class`]), which emits `ClassPrepare`
/// events to the matching installed requests just like a real VM would.
/// Events are queued on a bounded channel and drained by `poll_event`.
pub struct MockJdwpClient {
    state: Mutex<MockState>,
    events_tx: channel::Sender<Result<EventSet, JdwpError>>,
    events_rx: channel::Receiver<Result<EventSet, JdwpError>>,
    disconnected: AtomicBool,
}

const MOCK_EVENT_QUEUE_CAPACITY: usize = 1024;

impl Default for MockJdwpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJdwpClient {
    pub fn new() -> Self {
        let (events_tx, events_rx) = channel::bounded(MOCK_EVENT_QUEUE_CAPACITY);
        Self {
            state: Mutex::new(MockState {
                next_type_id: 0x100,
                next_method_id: 0x1000,
                next_request_id: 1,
                threads: vec![ThreadInfo {
                    id: 1,
                    name: "main".to_string(),
                }],
                ..MockState::default()
            }),
            events_tx,
            events_rx,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn set_threads(&self, threads: Vec<ThreadInfo>) {
        self.state.lock().threads = threads;
    }

    pub fn set_stack_frames(&self, thread: ThreadId, frames: Vec<StackFrameInfo>) {
        self.state.lock().frames.insert(thread, frames);
    }

    pub fn set_frame_variables(&self, thread: ThreadId, frame: FrameId, vars: Vec<JdwpVariable>) {
        self.state.lock().variables.insert((thread, frame), vars);
    }

    /// Define a class that is already loaded (no `ClassPrepare` event).
    pub fn define_class(&self, class: MockClass) -> ReferenceTypeId {
        let mut state = self.state.lock();
        define_class_locked(&mut state, class)
    }

    /// Load a class and emit one `ClassPrepare` event per matching request.
    ///
    /// Returns the new reference type id.
    pub fn load_class(&self, class: MockClass) -> ReferenceTypeId {
        let name = class.name.clone();
        let (type_id, sets) = {
            let mut state = self.state.lock();
            let type_id = define_class_locked(&mut state, class);
            let thread = state.threads.first().map(|t| t.id).unwrap_or(1);
            let sets: Vec<EventSet> = state
                .requests
                .iter()
                .filter(|(_, req)| req.kind == EventKind::ClassPrepare)
                .filter(|(_, req)| class_filters_match(&req.modifiers, &name))
                .map(|(request_id, req)| {
                    EventSet::single(
                        req.suspend_policy,
                        JdwpEvent::ClassPrepare(ClassPrepareEvent {
                            request_id: *request_id,
                            thread,
                            type_id,
                            signature: class_name_to_signature(&name),
                            status: CLASS_STATUS_INITIALIZED,
                        }),
                    )
                })
                .collect();
            (type_id, sets)
        };
        tracing::debug!(target = "nova.jdwp", class = %name, type_id, events = sets.len(), "mock class loaded");
        for set in sets {
            self.push_event_set(set);
        }
        type_id
    }

    /// Unload a class and emit one `ClassUnload` event per matching request.
    pub fn unload_class(&self, name: &str) -> bool {
        let sets: Vec<EventSet> = {
            let mut state = self.state.lock();
            let before = state.classes.len();
            state.classes.retain(|loaded| loaded.class.name != name);
            if state.classes.len() == before {
                return false;
            }
            state
                .requests
                .iter()
                .filter(|(_, req)| req.kind == EventKind::ClassUnload)
                .filter(|(_, req)| class_filters_match(&req.modifiers, name))
                .map(|(request_id, req)| {
                    EventSet::single(
                        req.suspend_policy,
                        JdwpEvent::ClassUnload(ClassUnloadEvent {
                            request_id: *request_id,
                            signature: class_name_to_signature(name),
                        }),
                    )
                })
                .collect()
        };
        for set in sets {
            self.push_event_set(set);
        }
        true
    }

    /// Location of `line` inside `method` of the loaded class `class`.
    pub fn location(&self, class: &str, method: &str, line: u32) -> Option<Location> {
        let state = self.state.lock();
        let loaded = state.classes.iter().find(|c| c.class.name == class)?;
        let (idx, m) = loaded
            .class
            .methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == method)?;
        let pos = m.lines.iter().position(|l| *l == line)?;
        Some(Location {
            type_id: loaded.type_id,
            method_id: loaded.method_ids[idx],
            index: pos as u64 * CODE_INDEX_STRIDE,
        })
    }

    pub fn push_event_set(&self, set: EventSet) {
        if self.events_tx.try_send(Ok(set)).is_err() {
            tracing::error!(target = "nova.jdwp", "mock event queue is full; dropping event set");
        }
    }

    /// Emit one event set per installed request of `kind`, built by `make` from
    /// the request id and that request's modifiers.
    ///
    /// Returns the number of emitted sets.
    pub fn emit_to_requests(
        &self,
        kind: EventKind,
        make: impl Fn(i32, &[EventModifier]) -> Option<JdwpEvent>,
    ) -> usize {
        let sets: Vec<EventSet> = {
            let state = self.state.lock();
            state
                .requests
                .iter()
                .filter(|(_, req)| req.kind == kind)
                .filter_map(|(request_id, req)| {
                    make(*request_id, &req.modifiers)
                        .map(|event| EventSet::single(req.suspend_policy, event))
                })
                .collect()
        };
        let count = sets.len();
        for set in sets {
            self.push_event_set(set);
        }
        count
    }

    /// Emit a breakpoint event for every breakpoint request pinned to `location`.
    pub fn hit_breakpoint(&self, thread: ThreadId, location: Location) -> usize {
        self.emit_to_requests(EventKind::Breakpoint, |request_id, modifiers| {
            modifiers
                .iter()
                .any(|m| matches!(m, EventModifier::LocationOnly { location: l } if *l == location))
                .then(|| {
                    JdwpEvent::Breakpoint(LocatableEvent {
                        request_id,
                        thread,
                        location,
                    })
                })
        })
    }

    /// Simulate the debuggee going away: the next `poll_event` fails.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
        let _ = self.events_tx.try_send(Err(JdwpError::ConnectionClosed));
    }

    /// Fail every `event_request_set` call after the next `successful` ones.
    pub fn fail_event_request_set_after(&self, successful: usize) {
        self.state.lock().fail_set_after = Some(successful);
    }

    pub fn stop_failing_event_request_set(&self) {
        self.state.lock().fail_set_after = None;
    }

    pub fn installed_requests(&self, kind: EventKind) -> Vec<(i32, Vec<EventModifier>)> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(_, req)| req.kind == kind)
            .map(|(id, req)| (*id, req.modifiers.clone()))
            .collect()
    }

    pub fn installed_suspend_policy(&self, request_id: i32) -> Option<SuspendPolicy> {
        self.state
            .lock()
            .requests
            .get(&request_id)
            .map(|req| req.suspend_policy)
    }

    pub fn event_request_set_calls(&self) -> usize {
        self.state.lock().set_calls
    }

    pub fn event_request_clear_calls(&self) -> Vec<RequestHandle> {
        self.state.lock().clear_calls.clone()
    }

    pub fn resumed_threads(&self) -> Vec<ThreadId> {
        self.state.lock().resumed_threads.clone()
    }

    pub fn resume_all_calls(&self) -> usize {
        self.state.lock().resume_all_calls
    }

    pub fn suspend_all_calls(&self) -> usize {
        self.state.lock().suspend_all_calls
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.state.lock().connection
    }

    pub fn disposed_connections(&self) -> Vec<ConnectionHandle> {
        self.state.lock().disposed.clone()
    }

    fn open_connection(&self) -> Result<ConnectionHandle, JdwpError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(JdwpError::ConnectionClosed);
        }
        let handle = {
            let mut state = self.state.lock();
            state.next_connection += 1;
            let handle = ConnectionHandle(state.next_connection);
            state.connection = Some(handle);
            handle
        };
        let thread = self.state.lock().threads.first().map(|t| t.id).unwrap_or(1);
        self.push_event_set(EventSet::single(
            SuspendPolicy::None,
            JdwpEvent::VmStart(ThreadEvent {
                request_id: 0,
                thread,
            }),
        ));
        Ok(handle)
    }

    fn ensure_connected(&self) -> Result<(), JdwpError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(JdwpError::ConnectionClosed);
        }
        if self.state.lock().connection.is_none() {
            return Err(JdwpError::NotConnected);
        }
        Ok(())
    }
}

fn define_class_locked(state: &mut MockState, class: MockClass) -> ReferenceTypeId {
    let type_id = state.next_type_id;
    state.next_type_id += 1;
    let method_ids = class
        .methods
        .iter()
        .map(|_| {
            let id = state.next_method_id;
            state.next_method_id += 1;
            id
        })
        .collect();
    state.classes.push(LoadedClass {
        type_id,
        class,
        method_ids,
    });
    type_id
}

fn class_filters_match(modifiers: &[EventModifier], class_name: &str) -> bool {
    modifiers.iter().all(|m| match m {
        EventModifier::ClassMatch { pattern } => class_pattern_matches(pattern, class_name),
        EventModifier::ClassExclude { pattern } => !class_pattern_matches(pattern, class_name),
        _ => true,
    })
}

impl JdwpClient for MockJdwpClient {
    fn attach(&self, options: &AttachOptions) -> Result<ConnectionHandle, JdwpError> {
        tracing::debug!(target = "nova.jdwp", addr = %options.addr, "mock attach");
        self.open_connection()
    }

    fn launch(&self, options: &LaunchOptions) -> Result<ConnectionHandle, JdwpError> {
        tracing::debug!(target = "nova.jdwp", main_class = %options.main_class, "mock launch");
        self.open_connection()
    }

    fn dispose(&self, handle: ConnectionHandle) {
        let mut state = self.state.lock();
        if state.connection == Some(handle) {
            state.connection = None;
        }
        state.disposed.push(handle);
    }

    fn event_request_set(
        &self,
        kind: EventKind,
        suspend_policy: SuspendPolicy,
        modifiers: Vec<EventModifier>,
    ) -> Result<RequestHandle, JdwpError> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.set_calls += 1;
        if let Some(remaining) = state.fail_set_after.as_mut() {
            if *remaining == 0 {
                return Err(JdwpError::VmError(ERROR_INVALID_EVENT_TYPE));
            }
            *remaining -= 1;
        }
        let request_id = state.next_request_id;
        state.next_request_id += 1;
        state.requests.insert(
            request_id,
            InstalledRequest {
                kind,
                suspend_policy,
                modifiers,
            },
        );
        Ok(RequestHandle { kind, request_id })
    }

    fn event_request_clear(&self, handle: RequestHandle) -> Result<(), JdwpError> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.clear_calls.push(handle);
        match state.requests.get(&handle.request_id) {
            Some(req) if req.kind == handle.kind => {
                state.requests.remove(&handle.request_id);
                Ok(())
            }
            _ => Err(JdwpError::InvalidRequestId(handle.request_id)),
        }
    }

    fn resolve(&self, query: &TargetQuery) -> Result<Vec<PhysicalTarget>, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        let targets = match query {
            TargetQuery::SourceLine { source_file, line } => state
                .classes
                .iter()
                .filter(|loaded| loaded.class.source_file.as_deref() == Some(source_file.as_str()))
                .flat_map(|loaded| {
                    loaded
                        .class
                        .methods
                        .iter()
                        .zip(&loaded.method_ids)
                        .filter_map(move |(method, method_id)| {
                            let pos = method.lines.iter().position(|l| l == line)?;
                            Some(PhysicalTarget::Location(Location {
                                type_id: loaded.type_id,
                                method_id: *method_id,
                                index: pos as u64 * CODE_INDEX_STRIDE,
                            }))
                        })
                })
                .collect(),
            TargetQuery::Field { class, field } => state
                .classes
                .iter()
                .filter(|loaded| &loaded.class.name == class)
                .filter_map(|loaded| {
                    let idx = loaded.class.fields.iter().position(|f| f == field)?;
                    Some(PhysicalTarget::Field {
                        type_id: loaded.type_id,
                        field_id: idx as u64 + 1,
                    })
                })
                .collect(),
            TargetQuery::Class { class } => state
                .classes
                .iter()
                .filter(|loaded| &loaded.class.name == class)
                .map(|loaded| PhysicalTarget::Class(loaded.type_id))
                .collect(),
            TargetQuery::Thread { thread } => state
                .threads
                .iter()
                .filter(|t| t.id == *thread)
                .map(|t| PhysicalTarget::Thread(t.id))
                .collect(),
        };
        Ok(targets)
    }

    fn poll_event(&self, timeout: Duration) -> Result<Option<EventSet>, JdwpError> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(Ok(set)) => Ok(Some(set)),
            Ok(Err(err)) => Err(err),
            Err(channel::RecvTimeoutError::Timeout) => {
                if self.disconnected.load(Ordering::SeqCst) {
                    Err(JdwpError::ConnectionClosed)
                } else {
                    Ok(None)
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => Err(JdwpError::ConnectionClosed),
        }
    }

    fn resume_thread(&self, thread: ThreadId) -> Result<(), JdwpError> {
        self.ensure_connected()?;
        self.state.lock().resumed_threads.push(thread);
        Ok(())
    }

    fn resume_all(&self) -> Result<(), JdwpError> {
        self.ensure_connected()?;
        self.state.lock().resume_all_calls += 1;
        Ok(())
    }

    fn suspend_all(&self) -> Result<(), JdwpError> {
        self.ensure_connected()?;
        self.state.lock().suspend_all_calls += 1;
        Ok(())
    }

    fn all_classes(&self) -> Result<Vec<ClassInfo>, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        Ok(state.classes.iter().map(class_info).collect())
    }

    fn class_info(&self, type_id: ReferenceTypeId) -> Result<ClassInfo, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        state
            .classes
            .iter()
            .find(|loaded| loaded.type_id == type_id)
            .map(class_info)
            .ok_or(JdwpError::InvalidObjectId(type_id))
    }

    fn methods(&self, type_id: ReferenceTypeId) -> Result<Vec<MethodInfo>, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        let loaded = find_class(&state, type_id)?;
        Ok(loaded
            .class
            .methods
            .iter()
            .zip(&loaded.method_ids)
            .map(|(method, method_id)| MethodInfo {
                method_id: *method_id,
                name: method.name.clone(),
                signature: "()V".to_string(),
            })
            .collect())
    }

    fn fields(&self, type_id: ReferenceTypeId) -> Result<Vec<FieldInfo>, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        let loaded = find_class(&state, type_id)?;
        Ok(loaded
            .class
            .fields
            .iter()
            .enumerate()
            .map(|(idx, name)| FieldInfo {
                field_id: idx as u64 + 1,
                name: name.clone(),
                signature: "I".to_string(),
            })
            .collect())
    }

    fn line_table(
        &self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> Result<LineTable, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        let loaded = find_class(&state, type_id)?;
        let idx = loaded
            .method_ids
            .iter()
            .position(|id| *id == method_id)
            .ok_or_else(|| JdwpError::Protocol(format!("unknown method id {method_id}")))?;
        let lines: Vec<LineTableEntry> = loaded.class.methods[idx]
            .lines
            .iter()
            .enumerate()
            .map(|(pos, line)| LineTableEntry {
                code_index: pos as u64 * CODE_INDEX_STRIDE,
                line: *line,
            })
            .collect();
        Ok(LineTable {
            start: 0,
            end: lines.last().map(|l| l.code_index).unwrap_or(0),
            lines,
        })
    }

    fn threads(&self) -> Result<Vec<ThreadInfo>, JdwpError> {
        self.ensure_connected()?;
        Ok(self.state.lock().threads.clone())
    }

    fn stack_frames(&self, thread: ThreadId) -> Result<Vec<StackFrameInfo>, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        if !state.threads.iter().any(|t| t.id == thread) {
            return Err(JdwpError::InvalidThreadId(thread));
        }
        Ok(state.frames.get(&thread).cloned().unwrap_or_default())
    }

    fn frame_variables(
        &self,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<Vec<JdwpVariable>, JdwpError> {
        self.ensure_connected()?;
        let state = self.state.lock();
        if !state.threads.iter().any(|t| t.id == thread) {
            return Err(JdwpError::InvalidThreadId(thread));
        }
        Ok(state
            .variables
            .get(&(thread, frame))
            .cloned()
            .unwrap_or_default())
    }
}

fn find_class(state: &MockState, type_id: ReferenceTypeId) -> Result<&LoadedClass, JdwpError> {
    state
        .classes
        .iter()
        .find(|loaded| loaded.type_id == type_id)
        .ok_or(JdwpError::InvalidObjectId(type_id))
}

fn class_info(loaded: &LoadedClass) -> ClassInfo {
    ClassInfo {
        type_id: loaded.type_id,
        signature: class_name_to_signature(&loaded.class.name),
        source_file: loaded.class.source_file.clone(),
        status: CLASS_STATUS_INITIALIZED,
    }
}
