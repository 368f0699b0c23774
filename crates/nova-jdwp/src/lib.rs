//! Debug control interface for Nova's debugger engine.
//!
//! `nova-debugger` drives a target JVM exclusively through the [`JdwpClient`]
//! trait defined here: connecting (attach/launch), installing and clearing
//! event requests, resolving source-level targets to physical ones, polling the
//! event queue, resuming threads and reading the metadata needed to keep a type
//! cache up to date.
//!
//! The data types intentionally mirror JDWP (event kinds, suspend policies,
//! event modifiers, composite event sets) so a wire-level backend can implement
//! the trait without an extra translation layer.
//!
//! [`MockJdwpClient`] is a deterministic, in-memory VM used by Nova's own test
//! suites. It is compiled for this crate's tests and exposed to downstream
//! crates behind the `test-support` feature.

mod event;
mod types;

#[cfg(any(test, feature = "test-support"))]
mod mock;

use std::time::Duration;

use thiserror::Error;

pub use event::{
    class_pattern_matches, BreakpointEvent, ClassPrepareEvent, ClassUnloadEvent, EventKind,
    EventModifier, EventSet, ExceptionEvent, JdwpEvent, LocatableEvent, MethodEntryEvent,
    MethodExitEvent, MonitorEvent, MonitorWaitEvent, MonitorWaitedEvent, RequestHandle,
    StepDepth, StepEvent, StepSize, SuspendPolicy, ThreadEvent, VmDeathEvent, WatchpointEvent,
};
pub use types::{
    class_name_to_signature, signature_to_class_name, AttachOptions, ClassInfo,
    ConnectionHandle, FieldId, FieldInfo, FrameId, JdwpValue, JdwpVariable, LaunchOptions,
    LineTable, LineTableEntry, Location, MethodId, MethodInfo, ObjectId, ObjectRef,
    PhysicalTarget, ReferenceTypeId, StackFrameInfo, TargetQuery, ThreadId, ThreadInfo,
};

#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockClass, MockJdwpClient, MockMethod};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JdwpError {
    #[error("JDWP client is not connected")]
    NotConnected,
    #[error("JDWP connection closed")]
    ConnectionClosed,
    #[error("timed out waiting for JDWP reply")]
    Timeout,
    #[error("JDWP command failed with error code {0}")]
    VmError(u16),
    #[error("invalid object id {0}")]
    InvalidObjectId(ObjectId),
    #[error("invalid thread id {0}")]
    InvalidThreadId(ThreadId),
    #[error("invalid event request id {0}")]
    InvalidRequestId(i32),
    #[error("JDWP protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Other(String),
}

impl JdwpError {
    /// Whether the error means the target is gone and the connection cannot be
    /// used any more.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, JdwpError::ConnectionClosed | JdwpError::NotConnected)
    }
}

/// JDWP error code reported when an event request cannot be installed.
pub const ERROR_INVALID_EVENT_TYPE: u16 = 102;

/// Interface to a debuggee.
///
/// Implementations must be shareable between the dispatch loop (which polls
/// events and resumes threads) and arbitrary caller threads (which install and
/// clear requests), hence `&self` receivers and the `Send + Sync` bound.
pub trait JdwpClient: Send + Sync {
    fn attach(&self, options: &AttachOptions) -> Result<ConnectionHandle, JdwpError>;
    fn launch(&self, options: &LaunchOptions) -> Result<ConnectionHandle, JdwpError>;
    fn dispose(&self, handle: ConnectionHandle);

    /// EventRequest.Set: installs one physical request and returns its handle.
    fn event_request_set(
        &self,
        kind: EventKind,
        suspend_policy: SuspendPolicy,
        modifiers: Vec<EventModifier>,
    ) -> Result<RequestHandle, JdwpError>;

    /// EventRequest.Clear.
    fn event_request_clear(&self, handle: RequestHandle) -> Result<(), JdwpError>;

    /// Resolve a source-level target into the physical targets currently known
    /// to the VM. An empty result is not an error: the type may not be loaded yet.
    fn resolve(&self, query: &TargetQuery) -> Result<Vec<PhysicalTarget>, JdwpError>;

    /// Wait up to `timeout` for the next composite event set.
    ///
    /// `Ok(None)` means the wait timed out.
    fn poll_event(&self, timeout: Duration) -> Result<Option<EventSet>, JdwpError>;

    fn resume_thread(&self, thread: ThreadId) -> Result<(), JdwpError>;
    fn resume_all(&self) -> Result<(), JdwpError>;
    fn suspend_all(&self) -> Result<(), JdwpError>;

    fn all_classes(&self) -> Result<Vec<ClassInfo>, JdwpError>;
    fn class_info(&self, type_id: ReferenceTypeId) -> Result<ClassInfo, JdwpError>;
    fn methods(&self, type_id: ReferenceTypeId) -> Result<Vec<MethodInfo>, JdwpError>;
    fn fields(&self, type_id: ReferenceTypeId) -> Result<Vec<FieldInfo>, JdwpError>;
    fn line_table(
        &self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> Result<LineTable, JdwpError>;

    fn threads(&self) -> Result<Vec<ThreadInfo>, JdwpError>;
    fn stack_frames(&self, thread: ThreadId) -> Result<Vec<StackFrameInfo>, JdwpError>;
    fn frame_variables(
        &self,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<Vec<JdwpVariable>, JdwpError>;

    fn thread_name(&self, thread: ThreadId) -> Result<String, JdwpError> {
        self.threads()?
            .into_iter()
            .find(|info| info.id == thread)
            .map(|info| info.name)
            .ok_or(JdwpError::InvalidThreadId(thread))
    }
}
