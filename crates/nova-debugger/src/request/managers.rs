use std::sync::Arc;

use nova_jdwp::{ClassInfo, EventKind, JdwpClient, RequestHandle};

use super::args::*;
use super::{RegistryDefaults, RequestId, RequestOptions, RequestRegistry};
use crate::error::Result;

macro_rules! request_kinds {
    ($($variant:ident($args:ty) => $field:ident,)*) => {
        /// A request of any kind, as accepted by the profile surface.
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum RequestSpec {
            $($variant($args),)*
        }

        impl RequestSpec {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(RequestSpec::$variant(_) => <$args as RequestArgs>::KIND,)*
                }
            }
        }

        $(
            impl From<$args> for RequestSpec {
                fn from(args: $args) -> Self {
                    RequestSpec::$variant(args)
                }
            }
        )*

        /// One registry per request kind.
        ///
        /// Registries never share maps, so keys of the same shape used by
        /// different kinds cannot collide.
        pub struct RequestManagers {
            $(pub $field: RequestRegistry<$args>,)*
        }

        impl RequestManagers {
            pub fn new(client: Arc<dyn JdwpClient>, defaults: RegistryDefaults) -> Self {
                Self {
                    $($field: RequestRegistry::new(client.clone(), defaults),)*
                }
            }

            pub fn create(&self, spec: RequestSpec, options: RequestOptions) -> Result<RequestId> {
                match spec {
                    $(RequestSpec::$variant(args) => self.$field.create(args, options),)*
                }
            }

            pub fn create_with_id(
                &self,
                id: RequestId,
                spec: RequestSpec,
                options: RequestOptions,
            ) -> Result<RequestId> {
                match spec {
                    $(RequestSpec::$variant(args) => self.$field.create_with_id(id, args, options),)*
                }
            }

            pub fn has(&self, spec: &RequestSpec) -> bool {
                match spec {
                    $(RequestSpec::$variant(args) => self.$field.has(args),)*
                }
            }

            pub fn id_of(&self, spec: &RequestSpec) -> Option<RequestId> {
                match spec {
                    $(RequestSpec::$variant(args) => self.$field.id_of(args),)*
                }
            }

            pub fn remove(&self, spec: &RequestSpec) -> bool {
                match spec {
                    $(RequestSpec::$variant(args) => self.$field.remove(args),)*
                }
            }

            pub fn remove_by_id(&self, kind: EventKind, id: &RequestId) -> bool {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.remove_by_id(id);
                    }
                )*
                false
            }

            pub fn has_id(&self, kind: EventKind, id: &RequestId) -> bool {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.has_id(id);
                    }
                )*
                false
            }

            pub fn handles(&self, kind: EventKind, id: &RequestId) -> Option<Vec<RequestHandle>> {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.get_by_id(id);
                    }
                )*
                None
            }

            pub fn is_pending(&self, kind: EventKind, id: &RequestId) -> bool {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.is_pending(id);
                    }
                )*
                false
            }

            pub fn options(&self, kind: EventKind, id: &RequestId) -> Option<RequestOptions> {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.options(id);
                    }
                )*
                None
            }

            /// Logical request behind the physical request id carried by an event.
            pub fn id_for_handle(&self, kind: EventKind, request_id: i32) -> Option<RequestId> {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.id_for_handle(request_id);
                    }
                )*
                None
            }

            pub fn list(&self, kind: EventKind) -> Vec<RequestSpec> {
                $(
                    if kind == <$args as RequestArgs>::KIND {
                        return self.$field.list().into_iter().map(RequestSpec::from).collect();
                    }
                )*
                Vec::new()
            }

            /// Retry pending requests of every kind against a newly prepared class.
            pub fn retry_pending(&self, class: &ClassInfo) -> Vec<RequestId> {
                let mut installed = Vec::new();
                $(installed.extend(self.$field.retry_pending(class));)*
                installed
            }

            pub fn len(&self) -> usize {
                0 $(+ self.$field.len())*
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }
    };
}

request_kinds! {
    Breakpoint(BreakpointArgs) => breakpoints,
    Step(StepArgs) => steps,
    ClassPrepare(ClassPrepareArgs) => class_prepares,
    ClassUnload(ClassUnloadArgs) => class_unloads,
    Exception(ExceptionArgs) => exceptions,
    MethodEntry(MethodEntryArgs) => method_entries,
    MethodExit(MethodExitArgs) => method_exits,
    MonitorContendedEnter(MonitorContendedEnterArgs) => monitor_contended_enters,
    MonitorContendedEntered(MonitorContendedEnteredArgs) => monitor_contended_entered,
    MonitorWait(MonitorWaitArgs) => monitor_waits,
    MonitorWaited(MonitorWaitedArgs) => monitor_waited,
    AccessWatchpoint(AccessWatchpointArgs) => access_watchpoints,
    ModificationWatchpoint(ModificationWatchpointArgs) => modification_watchpoints,
    ThreadStart(ThreadStartArgs) => thread_starts,
    ThreadDeath(ThreadDeathArgs) => thread_deaths,
    VmDeath(VmDeathArgs) => vm_deaths,
}
