use std::fmt;

use crate::types::{FieldId, JdwpValue, Location, ObjectId, ReferenceTypeId, ThreadId};

/// JDWP `EventKind` constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    SingleStep,
    Breakpoint,
    Exception,
    ThreadStart,
    ThreadDeath,
    ClassPrepare,
    ClassUnload,
    FieldAccess,
    FieldModification,
    MethodEntry,
    MethodExit,
    MonitorContendedEnter,
    MonitorContendedEntered,
    MonitorWait,
    MonitorWaited,
    VmStart,
    VmDeath,
    VmDisconnect,
}

impl EventKind {
    pub const ALL: [EventKind; 18] = [
        EventKind::SingleStep,
        EventKind::Breakpoint,
        EventKind::Exception,
        EventKind::ThreadStart,
        EventKind::ThreadDeath,
        EventKind::ClassPrepare,
        EventKind::ClassUnload,
        EventKind::FieldAccess,
        EventKind::FieldModification,
        EventKind::MethodEntry,
        EventKind::MethodExit,
        EventKind::MonitorContendedEnter,
        EventKind::MonitorContendedEntered,
        EventKind::MonitorWait,
        EventKind::MonitorWaited,
        EventKind::VmStart,
        EventKind::VmDeath,
        EventKind::VmDisconnect,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            EventKind::SingleStep => 1,
            EventKind::Breakpoint => 2,
            EventKind::Exception => 4,
            EventKind::ThreadStart => 6,
            EventKind::ThreadDeath => 7,
            EventKind::ClassPrepare => 8,
            EventKind::ClassUnload => 9,
            EventKind::FieldAccess => 20,
            EventKind::FieldModification => 21,
            EventKind::MethodEntry => 40,
            EventKind::MethodExit => 41,
            EventKind::MonitorContendedEnter => 43,
            EventKind::MonitorContendedEntered => 44,
            EventKind::MonitorWait => 45,
            EventKind::MonitorWaited => 46,
            EventKind::VmStart => 90,
            EventKind::VmDeath => 99,
            EventKind::VmDisconnect => 100,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_u8() == value)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SuspendPolicy {
    None,
    #[default]
    EventThread,
    All,
}

impl SuspendPolicy {
    pub fn as_u8(self) -> u8 {
        match self {
            SuspendPolicy::None => 0,
            SuspendPolicy::EventThread => 1,
            SuspendPolicy::All => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepSize {
    Min,
    Line,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepDepth {
    Into,
    Over,
    Out,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventModifier {
    Count {
        count: u32,
    },
    ThreadOnly {
        thread: ThreadId,
    },
    ClassOnly {
        type_id: ReferenceTypeId,
    },
    ClassMatch {
        pattern: String,
    },
    ClassExclude {
        pattern: String,
    },
    LocationOnly {
        location: Location,
    },
    ExceptionOnly {
        exception_or_null: ReferenceTypeId,
        caught: bool,
        uncaught: bool,
    },
    FieldOnly {
        type_id: ReferenceTypeId,
        field_id: FieldId,
    },
    Step {
        thread: ThreadId,
        size: StepSize,
        depth: StepDepth,
    },
    InstanceOnly {
        object: ObjectId,
    },
    SourceNameMatch {
        pattern: String,
    },
}

/// JDWP class patterns may carry a single leading or trailing `*`.
pub fn class_pattern_matches(pattern: &str, class_name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return class_name.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return class_name.starts_with(prefix);
    }
    pattern == class_name
}

/// A physical event request installed in the VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle {
    pub kind: EventKind,
    pub request_id: i32,
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.request_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatableEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub location: Location,
}

pub type BreakpointEvent = LocatableEvent;
pub type StepEvent = LocatableEvent;
pub type MethodEntryEvent = LocatableEvent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub location: Location,
    pub exception: ObjectId,
    pub catch_location: Option<Location>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassPrepareEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassUnloadEvent {
    pub request_id: i32,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodExitEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub location: Location,
    pub return_value: Option<JdwpValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub object: ObjectId,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorWaitEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub object: ObjectId,
    pub location: Location,
    pub timeout_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorWaitedEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub object: ObjectId,
    pub location: Location,
    pub timed_out: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WatchpointEvent {
    pub request_id: i32,
    pub thread: ThreadId,
    pub location: Location,
    pub type_id: ReferenceTypeId,
    pub field_id: FieldId,
    pub object: Option<ObjectId>,
    /// Only set for modification watchpoints.
    pub new_value: Option<JdwpValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadEvent {
    pub request_id: i32,
    pub thread: ThreadId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmDeathEvent {
    pub request_id: i32,
}

/// One event from a composite JDWP event packet.
#[derive(Clone, Debug, PartialEq)]
pub enum JdwpEvent {
    VmStart(ThreadEvent),
    VmDeath(VmDeathEvent),
    VmDisconnect,
    SingleStep(StepEvent),
    Breakpoint(BreakpointEvent),
    Exception(ExceptionEvent),
    ClassPrepare(ClassPrepareEvent),
    ClassUnload(ClassUnloadEvent),
    MethodEntry(MethodEntryEvent),
    MethodExit(MethodExitEvent),
    MonitorContendedEnter(MonitorEvent),
    MonitorContendedEntered(MonitorEvent),
    MonitorWait(MonitorWaitEvent),
    MonitorWaited(MonitorWaitedEvent),
    FieldAccess(WatchpointEvent),
    FieldModification(WatchpointEvent),
    ThreadStart(ThreadEvent),
    ThreadDeath(ThreadEvent),
}

impl JdwpEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            JdwpEvent::VmStart(_) => EventKind::VmStart,
            JdwpEvent::VmDeath(_) => EventKind::VmDeath,
            JdwpEvent::VmDisconnect => EventKind::VmDisconnect,
            JdwpEvent::SingleStep(_) => EventKind::SingleStep,
            JdwpEvent::Breakpoint(_) => EventKind::Breakpoint,
            JdwpEvent::Exception(_) => EventKind::Exception,
            JdwpEvent::ClassPrepare(_) => EventKind::ClassPrepare,
            JdwpEvent::ClassUnload(_) => EventKind::ClassUnload,
            JdwpEvent::MethodEntry(_) => EventKind::MethodEntry,
            JdwpEvent::MethodExit(_) => EventKind::MethodExit,
            JdwpEvent::MonitorContendedEnter(_) => EventKind::MonitorContendedEnter,
            JdwpEvent::MonitorContendedEntered(_) => EventKind::MonitorContendedEntered,
            JdwpEvent::MonitorWait(_) => EventKind::MonitorWait,
            JdwpEvent::MonitorWaited(_) => EventKind::MonitorWaited,
            JdwpEvent::FieldAccess(_) => EventKind::FieldAccess,
            JdwpEvent::FieldModification(_) => EventKind::FieldModification,
            JdwpEvent::ThreadStart(_) => EventKind::ThreadStart,
            JdwpEvent::ThreadDeath(_) => EventKind::ThreadDeath,
        }
    }

    /// The event request that produced this event.
    ///
    /// Automatically generated events (request id `0`, e.g. `VMStart`) report `None`.
    pub fn request_id(&self) -> Option<i32> {
        let id = match self {
            JdwpEvent::VmDisconnect => return None,
            JdwpEvent::VmStart(e) | JdwpEvent::ThreadStart(e) | JdwpEvent::ThreadDeath(e) => {
                e.request_id
            }
            JdwpEvent::VmDeath(e) => e.request_id,
            JdwpEvent::SingleStep(e) | JdwpEvent::Breakpoint(e) | JdwpEvent::MethodEntry(e) => {
                e.request_id
            }
            JdwpEvent::Exception(e) => e.request_id,
            JdwpEvent::ClassPrepare(e) => e.request_id,
            JdwpEvent::ClassUnload(e) => e.request_id,
            JdwpEvent::MethodExit(e) => e.request_id,
            JdwpEvent::MonitorContendedEnter(e) | JdwpEvent::MonitorContendedEntered(e) => {
                e.request_id
            }
            JdwpEvent::MonitorWait(e) => e.request_id,
            JdwpEvent::MonitorWaited(e) => e.request_id,
            JdwpEvent::FieldAccess(e) | JdwpEvent::FieldModification(e) => e.request_id,
        };
        (id != 0).then_some(id)
    }

    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            JdwpEvent::VmDisconnect | JdwpEvent::VmDeath(_) | JdwpEvent::ClassUnload(_) => None,
            JdwpEvent::VmStart(e) | JdwpEvent::ThreadStart(e) | JdwpEvent::ThreadDeath(e) => {
                Some(e.thread)
            }
            JdwpEvent::SingleStep(e) | JdwpEvent::Breakpoint(e) | JdwpEvent::MethodEntry(e) => {
                Some(e.thread)
            }
            JdwpEvent::Exception(e) => Some(e.thread),
            JdwpEvent::ClassPrepare(e) => Some(e.thread),
            JdwpEvent::MethodExit(e) => Some(e.thread),
            JdwpEvent::MonitorContendedEnter(e) | JdwpEvent::MonitorContendedEntered(e) => {
                Some(e.thread)
            }
            JdwpEvent::MonitorWait(e) => Some(e.thread),
            JdwpEvent::MonitorWaited(e) => Some(e.thread),
            JdwpEvent::FieldAccess(e) | JdwpEvent::FieldModification(e) => Some(e.thread),
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            JdwpEvent::SingleStep(e) | JdwpEvent::Breakpoint(e) | JdwpEvent::MethodEntry(e) => {
                Some(e.location)
            }
            JdwpEvent::Exception(e) => Some(e.location),
            JdwpEvent::MethodExit(e) => Some(e.location),
            JdwpEvent::MonitorContendedEnter(e) | JdwpEvent::MonitorContendedEntered(e) => {
                Some(e.location)
            }
            JdwpEvent::MonitorWait(e) => Some(e.location),
            JdwpEvent::MonitorWaited(e) => Some(e.location),
            JdwpEvent::FieldAccess(e) | JdwpEvent::FieldModification(e) => Some(e.location),
            _ => None,
        }
    }
}

/// A composite event packet: every event in the set shares one suspend policy.
#[derive(Clone, Debug, PartialEq)]
pub struct EventSet {
    pub suspend_policy: SuspendPolicy,
    pub events: Vec<JdwpEvent>,
}

impl EventSet {
    pub fn single(suspend_policy: SuspendPolicy, event: JdwpEvent) -> Self {
        Self {
            suspend_policy,
            events: vec![event],
        }
    }
}
