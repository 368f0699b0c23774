//! Debug profiles: interchangeable implementations of the full debugging surface.
//!
//! [`PureDebugProfile`] talks to the VM through the session's request managers
//! and pipelines. [`SwappableProfile`] forwards every call to whichever
//! registered profile is active at call time.

use nova_jdwp::{
    EventKind, FrameId, JdwpEvent, JdwpVariable, StackFrameInfo, ThreadId, ThreadInfo,
};

use crate::error::Result;
use crate::event::EventData;
use crate::pipeline::EventPipeline;
use crate::request::{RequestId, RequestOptions, RequestSpec};

/// Invokes `$callback!` with one line per request kind:
/// `plain, with_data: ArgsType => JdwpEventVariant(PayloadType);`
macro_rules! event_kinds {
    ($callback:ident) => {
        $callback! {
            on_breakpoint, on_breakpoint_with_data:
                $crate::request::BreakpointArgs => Breakpoint(nova_jdwp::BreakpointEvent);
            on_step, on_step_with_data:
                $crate::request::StepArgs => SingleStep(nova_jdwp::StepEvent);
            on_class_prepare, on_class_prepare_with_data:
                $crate::request::ClassPrepareArgs => ClassPrepare(nova_jdwp::ClassPrepareEvent);
            on_class_unload, on_class_unload_with_data:
                $crate::request::ClassUnloadArgs => ClassUnload(nova_jdwp::ClassUnloadEvent);
            on_exception, on_exception_with_data:
                $crate::request::ExceptionArgs => Exception(nova_jdwp::ExceptionEvent);
            on_method_entry, on_method_entry_with_data:
                $crate::request::MethodEntryArgs => MethodEntry(nova_jdwp::MethodEntryEvent);
            on_method_exit, on_method_exit_with_data:
                $crate::request::MethodExitArgs => MethodExit(nova_jdwp::MethodExitEvent);
            on_monitor_contended_enter, on_monitor_contended_enter_with_data:
                $crate::request::MonitorContendedEnterArgs => MonitorContendedEnter(nova_jdwp::MonitorEvent);
            on_monitor_contended_entered, on_monitor_contended_entered_with_data:
                $crate::request::MonitorContendedEnteredArgs => MonitorContendedEntered(nova_jdwp::MonitorEvent);
            on_monitor_wait, on_monitor_wait_with_data:
                $crate::request::MonitorWaitArgs => MonitorWait(nova_jdwp::MonitorWaitEvent);
            on_monitor_waited, on_monitor_waited_with_data:
                $crate::request::MonitorWaitedArgs => MonitorWaited(nova_jdwp::MonitorWaitedEvent);
            on_access_watchpoint, on_access_watchpoint_with_data:
                $crate::request::AccessWatchpointArgs => FieldAccess(nova_jdwp::WatchpointEvent);
            on_modification_watchpoint, on_modification_watchpoint_with_data:
                $crate::request::ModificationWatchpointArgs => FieldModification(nova_jdwp::WatchpointEvent);
            on_thread_start, on_thread_start_with_data:
                $crate::request::ThreadStartArgs => ThreadStart(nova_jdwp::ThreadEvent);
            on_thread_death, on_thread_death_with_data:
                $crate::request::ThreadDeathArgs => ThreadDeath(nova_jdwp::ThreadEvent);
            on_vm_death, on_vm_death_with_data:
                $crate::request::VmDeathArgs => VmDeath(nova_jdwp::VmDeathEvent);
        }
    };
}

macro_rules! typed_event_methods {
    ($($plain:ident, $with_data:ident: $args:ty => $variant:ident($event:ty);)*) => {
        $(
            fn $with_data(
                &self,
                args: $args,
                options: $crate::request::RequestOptions,
            ) -> $crate::error::Result<$crate::profile::DataPipeline<$event>> {
                Ok(self
                    .on_request_with_data(args.into(), options)?
                    .filter_map(|(event, data)| match event {
                        nova_jdwp::JdwpEvent::$variant(event) => Some((event, data)),
                        _ => None,
                    }))
            }

            fn $plain(
                &self,
                args: $args,
                options: $crate::request::RequestOptions,
            ) -> $crate::error::Result<$crate::pipeline::EventPipeline<$event>> {
                Ok(self.$with_data(args, options)?.without_data())
            }
        )*
    };
}

macro_rules! forward_typed_event_methods {
    ($($plain:ident, $with_data:ident: $args:ty => $variant:ident($event:ty);)*) => {
        $(
            fn $with_data(
                &self,
                args: $args,
                options: $crate::request::RequestOptions,
            ) -> $crate::error::Result<$crate::profile::DataPipeline<$event>> {
                self.active().$with_data(args, options)
            }

            fn $plain(
                &self,
                args: $args,
                options: $crate::request::RequestOptions,
            ) -> $crate::error::Result<$crate::pipeline::EventPipeline<$event>> {
                self.active().$plain(args, options)
            }
        )*
    };
}

mod pure;
mod swappable;

pub use pure::PureDebugProfile;
pub use swappable::SwappableProfile;

/// Events paired with the data requested through [`RequestOptions::data`].
pub type DataPipeline<E> = EventPipeline<(E, EventData)>;

/// The debugging capability surface every profile implements.
///
/// Requesting events of a kind installs (or reuses) the request described by
/// the arguments and returns a pipeline of the events it produces. Requests
/// that cannot be resolved yet but are kept pending still return a pipeline;
/// it starts producing once the request is installed.
pub trait DebugProfile: Send + Sync {
    fn name(&self) -> &str;

    fn create_request(&self, spec: RequestSpec, options: RequestOptions) -> Result<RequestId>;
    fn remove_request(&self, spec: &RequestSpec) -> bool;
    fn remove_request_by_id(&self, kind: EventKind, id: RequestId) -> bool;
    fn has_request(&self, spec: &RequestSpec) -> bool;
    fn list_requests(&self, kind: EventKind) -> Vec<RequestSpec>;
    fn is_request_pending(&self, kind: EventKind, id: RequestId) -> bool;

    fn on_request_with_data(
        &self,
        spec: RequestSpec,
        options: RequestOptions,
    ) -> Result<DataPipeline<JdwpEvent>>;

    fn on_request(
        &self,
        spec: RequestSpec,
        options: RequestOptions,
    ) -> Result<EventPipeline<JdwpEvent>> {
        Ok(self.on_request_with_data(spec, options)?.without_data())
    }

    event_kinds!(typed_event_methods);

    fn threads(&self) -> Result<Vec<ThreadInfo>>;
    fn stack_frames(&self, thread: ThreadId) -> Result<Vec<StackFrameInfo>>;
    fn frame_variables(&self, thread: ThreadId, frame: FrameId) -> Result<Vec<JdwpVariable>>;
    fn resume_all(&self) -> Result<()>;
    fn suspend_all(&self) -> Result<()>;
}
