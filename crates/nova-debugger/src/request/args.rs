use std::fmt;
use std::hash::Hash;

use nova_jdwp::{
    ClassInfo, EventKind, EventModifier, JdwpClient, JdwpError, PhysicalTarget, StepDepth,
    StepSize, TargetQuery, ThreadId,
};

/// The arguments that identify one logical request of a given kind.
///
/// Two calls with structurally equal arguments refer to the same request.
pub trait RequestArgs: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    const KIND: EventKind;

    /// Whether a request that resolves to nothing is kept and retried when a
    /// class is prepared.
    const PENDING_CAPABLE: bool = false;

    /// Resolve into the physical installations the VM needs, each described by
    /// the modifiers that pin it. An empty result means nothing to install yet.
    fn targets(&self, client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError>;

    /// Whether preparing `class` could make a pending request resolvable.
    fn may_resolve_in(&self, _class: &ClassInfo) -> bool {
        false
    }
}

/// A line breakpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BreakpointArgs {
    pub source_file: String,
    pub line: u32,
}

impl BreakpointArgs {
    pub fn new(source_file: impl Into<String>, line: u32) -> Self {
        Self {
            source_file: source_file.into(),
            line,
        }
    }
}

impl RequestArgs for BreakpointArgs {
    const KIND: EventKind = EventKind::Breakpoint;
    const PENDING_CAPABLE: bool = true;

    fn targets(&self, client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        let query = TargetQuery::SourceLine {
            source_file: self.source_file.clone(),
            line: self.line,
        };
        Ok(client
            .resolve(&query)?
            .into_iter()
            .filter_map(|target| match target {
                PhysicalTarget::Location(location) => {
                    Some(vec![EventModifier::LocationOnly { location }])
                }
                _ => None,
            })
            .collect())
    }

    fn may_resolve_in(&self, class: &ClassInfo) -> bool {
        class.source_file.as_deref() == Some(self.source_file.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StepArgs {
    pub thread: ThreadId,
    pub size: StepSize,
    pub depth: StepDepth,
}

impl StepArgs {
    pub fn new(thread: ThreadId, size: StepSize, depth: StepDepth) -> Self {
        Self {
            thread,
            size,
            depth,
        }
    }
}

impl RequestArgs for StepArgs {
    const KIND: EventKind = EventKind::SingleStep;

    fn targets(&self, client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        let live = client.resolve(&TargetQuery::Thread {
            thread: self.thread,
        })?;
        if live.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![vec![EventModifier::Step {
            thread: self.thread,
            size: self.size,
            depth: self.depth,
        }]])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassPrepareArgs {
    /// JDWP class pattern (`*`, `com.example.*`, `*.Main`, exact name).
    pub pattern: String,
}

impl ClassPrepareArgs {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl RequestArgs for ClassPrepareArgs {
    const KIND: EventKind = EventKind::ClassPrepare;

    fn targets(&self, _client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        Ok(vec![vec![EventModifier::ClassMatch {
            pattern: self.pattern.clone(),
        }]])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassUnloadArgs {
    pub pattern: String,
}

impl ClassUnloadArgs {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl RequestArgs for ClassUnloadArgs {
    const KIND: EventKind = EventKind::ClassUnload;

    fn targets(&self, _client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        Ok(vec![vec![EventModifier::ClassMatch {
            pattern: self.pattern.clone(),
        }]])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExceptionArgs {
    /// Exception class to stop on (subclasses included); `None` catches everything.
    pub class: Option<String>,
    pub caught: bool,
    pub uncaught: bool,
}

impl ExceptionArgs {
    pub fn all(caught: bool, uncaught: bool) -> Self {
        Self {
            class: None,
            caught,
            uncaught,
        }
    }

    pub fn class(class: impl Into<String>, caught: bool, uncaught: bool) -> Self {
        Self {
            class: Some(class.into()),
            caught,
            uncaught,
        }
    }
}

impl RequestArgs for ExceptionArgs {
    const KIND: EventKind = EventKind::Exception;
    const PENDING_CAPABLE: bool = true;

    fn targets(&self, client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        let Some(class) = &self.class else {
            return Ok(vec![vec![EventModifier::ExceptionOnly {
                exception_or_null: 0,
                caught: self.caught,
                uncaught: self.uncaught,
            }]]);
        };
        Ok(client
            .resolve(&TargetQuery::Class {
                class: class.clone(),
            })?
            .into_iter()
            .filter_map(|target| match target {
                PhysicalTarget::Class(type_id) => Some(vec![EventModifier::ExceptionOnly {
                    exception_or_null: type_id,
                    caught: self.caught,
                    uncaught: self.uncaught,
                }]),
                _ => None,
            })
            .collect())
    }

    fn may_resolve_in(&self, class: &ClassInfo) -> bool {
        self.class.as_deref() == Some(class.name().as_str())
    }
}

/// Method entry/exit requests are installed per class; the method name, when
/// given, is matched against delivered events.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodEntryArgs {
    pub class: String,
    pub method: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodExitArgs {
    pub class: String,
    pub method: Option<String>,
}

impl MethodEntryArgs {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: Some(method.into()),
        }
    }

    pub fn any_method(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: None,
        }
    }
}

impl MethodExitArgs {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: Some(method.into()),
        }
    }

    pub fn any_method(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: None,
        }
    }
}

impl RequestArgs for MethodEntryArgs {
    const KIND: EventKind = EventKind::MethodEntry;

    fn targets(&self, _client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        Ok(vec![vec![EventModifier::ClassMatch {
            pattern: self.class.clone(),
        }]])
    }
}

impl RequestArgs for MethodExitArgs {
    const KIND: EventKind = EventKind::MethodExit;

    fn targets(&self, _client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        Ok(vec![vec![EventModifier::ClassMatch {
            pattern: self.class.clone(),
        }]])
    }
}

fn field_targets(
    client: &dyn JdwpClient,
    class: &str,
    field: &str,
) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
    let query = TargetQuery::Field {
        class: class.to_owned(),
        field: field.to_owned(),
    };
    Ok(client
        .resolve(&query)?
        .into_iter()
        .filter_map(|target| match target {
            PhysicalTarget::Field { type_id, field_id } => {
                Some(vec![EventModifier::FieldOnly { type_id, field_id }])
            }
            _ => None,
        })
        .collect())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccessWatchpointArgs {
    pub class: String,
    pub field: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModificationWatchpointArgs {
    pub class: String,
    pub field: String,
}

impl AccessWatchpointArgs {
    pub fn new(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            field: field.into(),
        }
    }
}

impl ModificationWatchpointArgs {
    pub fn new(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            field: field.into(),
        }
    }
}

impl RequestArgs for AccessWatchpointArgs {
    const KIND: EventKind = EventKind::FieldAccess;
    const PENDING_CAPABLE: bool = true;

    fn targets(&self, client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        field_targets(client, &self.class, &self.field)
    }

    fn may_resolve_in(&self, class: &ClassInfo) -> bool {
        class.name() == self.class
    }
}

impl RequestArgs for ModificationWatchpointArgs {
    const KIND: EventKind = EventKind::FieldModification;
    const PENDING_CAPABLE: bool = true;

    fn targets(&self, client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        field_targets(client, &self.class, &self.field)
    }

    fn may_resolve_in(&self, class: &ClassInfo) -> bool {
        class.name() == self.class
    }
}

macro_rules! thread_filter_args {
    ($($(#[$meta:meta])* $name:ident => $kind:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
            pub struct $name {
                /// Only report events raised by this thread.
                pub thread: Option<ThreadId>,
            }

            impl $name {
                pub fn any() -> Self {
                    Self { thread: None }
                }

                pub fn on_thread(thread: ThreadId) -> Self {
                    Self {
                        thread: Some(thread),
                    }
                }
            }

            impl RequestArgs for $name {
                const KIND: EventKind = EventKind::$kind;

                fn targets(
                    &self,
                    _client: &dyn JdwpClient,
                ) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
                    Ok(vec![self
                        .thread
                        .map(|thread| EventModifier::ThreadOnly { thread })
                        .into_iter()
                        .collect()])
                }
            }
        )*
    };
}

thread_filter_args! {
    MonitorContendedEnterArgs => MonitorContendedEnter;
    MonitorContendedEnteredArgs => MonitorContendedEntered;
    MonitorWaitArgs => MonitorWait;
    MonitorWaitedArgs => MonitorWaited;
    ThreadStartArgs => ThreadStart;
    ThreadDeathArgs => ThreadDeath;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VmDeathArgs;

impl RequestArgs for VmDeathArgs {
    const KIND: EventKind = EventKind::VmDeath;

    fn targets(&self, _client: &dyn JdwpClient) -> Result<Vec<Vec<EventModifier>>, JdwpError> {
        Ok(vec![Vec::new()])
    }
}
