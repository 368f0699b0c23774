use std::sync::Arc;

use nova_jdwp::{
    EventKind, FrameId, JdwpClient, JdwpEvent, JdwpVariable, StackFrameInfo, ThreadId, ThreadInfo,
};

use super::{DataPipeline, DebugProfile};
use crate::error::Result;
use crate::event::{EventData, EventDataRequest, EventDataResult, RawEvent};
use crate::metadata::TypeMetadataCache;
use crate::pipeline::PipelineRegistry;
use crate::request::{RequestId, RequestManagers, RequestOptions, RequestSpec};

/// Profile that implements everything directly on top of the control interface.
pub struct PureDebugProfile {
    client: Arc<dyn JdwpClient>,
    managers: Arc<RequestManagers>,
    pipelines: Arc<PipelineRegistry>,
    metadata: Arc<TypeMetadataCache>,
}

impl PureDebugProfile {
    pub const NAME: &'static str = "pure";

    pub fn new(
        client: Arc<dyn JdwpClient>,
        managers: Arc<RequestManagers>,
        pipelines: Arc<PipelineRegistry>,
        metadata: Arc<TypeMetadataCache>,
    ) -> Self {
        Self {
            client,
            managers,
            pipelines,
            metadata,
        }
    }
}

fn method_filter(spec: &RequestSpec) -> Option<String> {
    match spec {
        RequestSpec::MethodEntry(args) => args.method.clone(),
        RequestSpec::MethodExit(args) => args.method.clone(),
        _ => None,
    }
}

fn event_method_name(
    client: &dyn JdwpClient,
    metadata: &TypeMetadataCache,
    raw: &RawEvent,
) -> Option<String> {
    let location = raw.event.location()?;
    if let Some(name) = metadata.method_name(location.type_id, location.method_id) {
        return Some(name);
    }
    client
        .methods(location.type_id)
        .ok()?
        .into_iter()
        .find(|m| m.method_id == location.method_id)
        .map(|m| m.name)
}

pub(crate) fn collect_event_data(
    client: &dyn JdwpClient,
    event: &JdwpEvent,
    options: &RequestOptions,
) -> EventData {
    options
        .data
        .iter()
        .map(|request| {
            let unavailable = |reason: String| EventDataResult::Unavailable {
                request: request.clone(),
                reason,
            };
            match request {
                EventDataRequest::ThreadName => match event.thread() {
                    Some(thread) => client
                        .thread_name(thread)
                        .map(EventDataResult::ThreadName)
                        .unwrap_or_else(|err| unavailable(err.to_string())),
                    None => unavailable("event has no thread".to_owned()),
                },
                EventDataRequest::StackDepth => match event.thread() {
                    Some(thread) => client
                        .stack_frames(thread)
                        .map(|frames| EventDataResult::StackDepth(frames.len()))
                        .unwrap_or_else(|err| unavailable(err.to_string())),
                    None => unavailable("event has no thread".to_owned()),
                },
                EventDataRequest::CustomProperty(key) => EventDataResult::CustomProperty {
                    key: key.clone(),
                    value: options.properties.get(key).cloned(),
                },
            }
        })
        .collect()
}

impl DebugProfile for PureDebugProfile {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_request(&self, spec: RequestSpec, options: RequestOptions) -> Result<RequestId> {
        self.managers.create(spec, options)
    }

    fn remove_request(&self, spec: &RequestSpec) -> bool {
        self.managers.remove(spec)
    }

    fn remove_request_by_id(&self, kind: EventKind, id: RequestId) -> bool {
        self.managers.remove_by_id(kind, &id)
    }

    fn has_request(&self, spec: &RequestSpec) -> bool {
        self.managers.has(spec)
    }

    fn list_requests(&self, kind: EventKind) -> Vec<RequestSpec> {
        self.managers.list(kind)
    }

    fn is_request_pending(&self, kind: EventKind, id: RequestId) -> bool {
        self.managers.is_pending(kind, &id)
    }

    fn on_request_with_data(
        &self,
        spec: RequestSpec,
        options: RequestOptions,
    ) -> Result<DataPipeline<JdwpEvent>> {
        let kind = spec.kind();
        let method = method_filter(&spec);
        let id = match self.managers.create(spec, options.clone()) {
            Ok(id) => id,
            Err(err) => err.pending_request().ok_or(err)?,
        };

        let mut pipeline = {
            let managers = self.managers.clone();
            self.pipelines.pipeline(kind).filter(move |raw| {
                raw.event
                    .request_id()
                    .and_then(|request_id| managers.id_for_handle(kind, request_id))
                    == Some(id)
            })
        };
        if let Some(method) = method {
            let client = self.client.clone();
            let metadata = self.metadata.clone();
            pipeline = pipeline.filter(move |raw| {
                event_method_name(client.as_ref(), &metadata, raw).as_deref() == Some(method.as_str())
            });
        }

        let client = self.client.clone();
        let managers = self.managers.clone();
        Ok(pipeline.map(move |raw| {
            // The registry holds the options the request was installed with.
            let installed = managers.options(kind, &id);
            let data = collect_event_data(
                client.as_ref(),
                &raw.event,
                installed.as_ref().unwrap_or(&options),
            );
            (raw.event, data)
        }))
    }

    fn threads(&self) -> Result<Vec<ThreadInfo>> {
        Ok(self.client.threads()?)
    }

    fn stack_frames(&self, thread: ThreadId) -> Result<Vec<StackFrameInfo>> {
        Ok(self.client.stack_frames(thread)?)
    }

    fn frame_variables(&self, thread: ThreadId, frame: FrameId) -> Result<Vec<JdwpVariable>> {
        Ok(self.client.frame_variables(thread, frame)?)
    }

    fn resume_all(&self) -> Result<()> {
        Ok(self.client.resume_all()?)
    }

    fn suspend_all(&self) -> Result<()> {
        Ok(self.client.suspend_all()?)
    }
}
