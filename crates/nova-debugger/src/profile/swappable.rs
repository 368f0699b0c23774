use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use nova_jdwp::{
    EventKind, FrameId, JdwpEvent, JdwpVariable, StackFrameInfo, ThreadId, ThreadInfo,
};
use parking_lot::{Mutex, RwLock};

use super::{DataPipeline, DebugProfile};
use crate::error::{DebuggerError, Result};
use crate::request::{RequestId, RequestOptions, RequestSpec};

struct Active {
    name: String,
    profile: Arc<dyn DebugProfile>,
}

/// Registry of named profiles that forwards every call to the active one.
///
/// Each call reads the active profile exactly once, so a call that is in
/// progress while [`SwappableProfile::use_profile`] runs completes against the
/// profile it started with. Pipelines obtained before a swap keep delivering
/// from the profile that created them.
///
/// Swaps and registrations hold the swap lock. A session shares that lock
/// with its start and stop.
pub struct SwappableProfile {
    profiles: RwLock<HashMap<String, Arc<dyn DebugProfile>>>,
    active: ArcSwap<Active>,
    swap: Arc<Mutex<()>>,
}

impl SwappableProfile {
    pub const NAME: &'static str = "swappable";

    pub fn new(name: impl Into<String>, profile: Arc<dyn DebugProfile>) -> Self {
        let name = name.into();
        let mut profiles = HashMap::new();
        profiles.insert(name.clone(), profile.clone());
        Self {
            profiles: RwLock::new(profiles),
            active: ArcSwap::from_pointee(Active { name, profile }),
            swap: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) fn swap_lock(&self) -> Arc<Mutex<()>> {
        self.swap.clone()
    }

    /// Register `profile` under `name`, replacing any profile of that name.
    ///
    /// Replacing the active profile takes effect for the next call.
    pub fn register(&self, name: impl Into<String>, profile: Arc<dyn DebugProfile>) {
        let name = name.into();
        let _swap = self.swap.lock();
        self.profiles.write().insert(name.clone(), profile.clone());
        if self.active.load().name == name {
            self.active.store(Arc::new(Active { name, profile }));
        }
    }

    /// Make the profile registered under `name` the active one.
    pub fn use_profile(&self, name: &str) -> Result<()> {
        let _swap = self.swap.lock();
        let profile = self
            .profiles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DebuggerError::UnknownStrategy(name.to_owned()))?;
        let previous = self.active.swap(Arc::new(Active {
            name: name.to_owned(),
            profile,
        }));
        tracing::info!(target = "nova.debugger", from = %previous.name, to = %name, "debug profile switched");
        Ok(())
    }

    pub fn active_name(&self) -> String {
        self.active.load().name.clone()
    }

    pub fn active(&self) -> Arc<dyn DebugProfile> {
        self.active.load().profile.clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DebugProfile>> {
        self.profiles.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl DebugProfile for SwappableProfile {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_request(&self, spec: RequestSpec, options: RequestOptions) -> Result<RequestId> {
        self.active().create_request(spec, options)
    }

    fn remove_request(&self, spec: &RequestSpec) -> bool {
        self.active().remove_request(spec)
    }

    fn remove_request_by_id(&self, kind: EventKind, id: RequestId) -> bool {
        self.active().remove_request_by_id(kind, id)
    }

    fn has_request(&self, spec: &RequestSpec) -> bool {
        self.active().has_request(spec)
    }

    fn list_requests(&self, kind: EventKind) -> Vec<RequestSpec> {
        self.active().list_requests(kind)
    }

    fn is_request_pending(&self, kind: EventKind, id: RequestId) -> bool {
        self.active().is_request_pending(kind, id)
    }

    fn on_request_with_data(
        &self,
        spec: RequestSpec,
        options: RequestOptions,
    ) -> Result<DataPipeline<JdwpEvent>> {
        self.active().on_request_with_data(spec, options)
    }

    fn on_request(
        &self,
        spec: RequestSpec,
        options: RequestOptions,
    ) -> Result<crate::pipeline::EventPipeline<JdwpEvent>> {
        self.active().on_request(spec, options)
    }

    event_kinds!(forward_typed_event_methods);

    fn threads(&self) -> Result<Vec<ThreadInfo>> {
        self.active().threads()
    }

    fn stack_frames(&self, thread: ThreadId) -> Result<Vec<StackFrameInfo>> {
        self.active().stack_frames(thread)
    }

    fn frame_variables(&self, thread: ThreadId, frame: FrameId) -> Result<Vec<JdwpVariable>> {
        self.active().frame_variables(thread, frame)
    }

    fn resume_all(&self) -> Result<()> {
        self.active().resume_all()
    }

    fn suspend_all(&self) -> Result<()> {
        self.active().suspend_all()
    }
}
