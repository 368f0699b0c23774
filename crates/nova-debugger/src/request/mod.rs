//! Event request bookkeeping.
//!
//! Every request kind gets its own [`RequestRegistry`], keyed by the arguments
//! that make two requests "the same" (see [`RequestArgs`]). [`RequestManagers`]
//! is the session-owned set of all of them.

mod args;
mod managers;
mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nova_jdwp::{EventModifier, SuspendPolicy};
use uuid::Uuid;

use crate::event::EventDataRequest;

pub use args::{
    AccessWatchpointArgs, BreakpointArgs, ClassPrepareArgs, ClassUnloadArgs, ExceptionArgs,
    MethodEntryArgs, MethodExitArgs, ModificationWatchpointArgs, MonitorContendedEnterArgs,
    MonitorContendedEnteredArgs, MonitorWaitArgs, MonitorWaitedArgs, RequestArgs, StepArgs,
    ThreadDeathArgs, ThreadStartArgs, VmDeathArgs,
};
pub use managers::{RequestManagers, RequestSpec};
pub use registry::{RegistryDefaults, RequestRegistry};

/// Identity of one logical request, independent of its key and of the physical
/// handles it expands to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Per-call request settings that do not take part in request identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// `None` uses the registry default.
    pub suspend_policy: Option<SuspendPolicy>,
    /// Extra filters appended to every physical installation.
    pub modifiers: Vec<EventModifier>,
    /// Side-channel data gathered while the event thread is suspended.
    pub data: Vec<EventDataRequest>,
    /// Values reported back by [`EventDataRequest::CustomProperty`].
    pub properties: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn suspend(mut self, policy: SuspendPolicy) -> Self {
        self.suspend_policy = Some(policy);
        self
    }

    pub fn modifier(mut self, modifier: EventModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn data(mut self, request: EventDataRequest) -> Self {
        self.data.push(request);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
