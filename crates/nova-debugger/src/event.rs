use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nova_jdwp::{EventKind, EventSet, JdwpClient, JdwpError, JdwpEvent, SuspendPolicy, ThreadId};

/// One event as handed to pipelines by the dispatch loop.
#[derive(Clone, Debug)]
pub struct RawEvent {
    pub event: JdwpEvent,
    /// Suspend policy of the event set this event arrived in.
    pub suspend_policy: SuspendPolicy,
    resume: ResumeToken,
}

impl RawEvent {
    pub(crate) fn new(event: JdwpEvent, suspend_policy: SuspendPolicy, resume: ResumeToken) -> Self {
        Self {
            event,
            suspend_policy,
            resume,
        }
    }

    /// An event that is not tied to a suspended VM, e.g. for feeding pipelines
    /// in tests or replaying recorded events.
    pub fn detached(event: JdwpEvent) -> Self {
        Self {
            event,
            suspend_policy: SuspendPolicy::None,
            resume: ResumeToken::noop(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Resume whatever the event set suspended without waiting for the
    /// remaining consumers. The dispatch loop will not resume again.
    ///
    /// Returns `Ok(false)` if the set was already resumed.
    pub fn resume(&self) -> Result<bool, JdwpError> {
        self.resume.resume()
    }

    pub fn is_resumed(&self) -> bool {
        self.resume.is_resumed()
    }
}

/// Shared by every event of one event set; resumes the set at most once.
#[derive(Clone)]
pub(crate) struct ResumeToken {
    inner: Option<Arc<ResumeInner>>,
}

struct ResumeInner {
    client: Arc<dyn JdwpClient>,
    policy: SuspendPolicy,
    thread: Option<ThreadId>,
    done: AtomicBool,
}

impl std::fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeToken")
            .field("resumed", &self.is_resumed())
            .finish()
    }
}

impl ResumeToken {
    pub(crate) fn for_event_set(client: Arc<dyn JdwpClient>, set: &EventSet) -> Self {
        let thread = set.events.iter().find_map(JdwpEvent::thread);
        Self {
            inner: Some(Arc::new(ResumeInner {
                client,
                policy: set.suspend_policy,
                thread,
                done: AtomicBool::new(false),
            })),
        }
    }

    pub(crate) fn noop() -> Self {
        Self { inner: None }
    }

    pub(crate) fn resume(&self) -> Result<bool, JdwpError> {
        let Some(inner) = &self.inner else {
            return Ok(false);
        };
        if inner.done.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        match (inner.policy, inner.thread) {
            (SuspendPolicy::None, _) => {}
            (SuspendPolicy::EventThread, Some(thread)) => inner.client.resume_thread(thread)?,
            // An event-thread set without a thread suspends nothing we can name.
            (SuspendPolicy::EventThread, None) => {}
            (SuspendPolicy::All, _) => inner.client.resume_all()?,
        }
        Ok(true)
    }

    pub(crate) fn is_resumed(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.done.load(Ordering::SeqCst))
    }
}

/// Extra information collected while the event thread is still suspended.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventDataRequest {
    ThreadName,
    StackDepth,
    /// A value from the request's `properties`.
    CustomProperty(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventDataResult {
    ThreadName(String),
    StackDepth(usize),
    CustomProperty { key: String, value: Option<String> },
    /// The data could not be collected (e.g. the thread already died).
    Unavailable { request: EventDataRequest, reason: String },
}

pub type EventData = Vec<EventDataResult>;

#[cfg(test)]
mod tests {
    use super::*;
    use nova_jdwp::{AttachOptions, MockJdwpClient, ThreadEvent};

    fn thread_start(thread: ThreadId) -> JdwpEvent {
        JdwpEvent::ThreadStart(ThreadEvent {
            request_id: 3,
            thread,
        })
    }

    #[test]
    fn resume_token_resumes_once_per_policy() {
        let mock = Arc::new(MockJdwpClient::new());
        mock.attach(&AttachOptions {
            addr: "127.0.0.1:5005".parse().unwrap(),
        })
        .unwrap();

        let set = EventSet::single(SuspendPolicy::EventThread, thread_start(7));
        let token = ResumeToken::for_event_set(mock.clone(), &set);
        assert!(token.resume().unwrap());
        assert!(!token.resume().unwrap());
        assert!(token.clone().is_resumed());
        assert_eq!(mock.resumed_threads(), vec![7]);

        let set = EventSet::single(SuspendPolicy::All, thread_start(7));
        ResumeToken::for_event_set(mock.clone(), &set)
            .resume()
            .unwrap();
        assert_eq!(mock.resume_all_calls(), 1);

        let set = EventSet::single(SuspendPolicy::None, thread_start(7));
        assert!(ResumeToken::for_event_set(mock.clone(), &set).resume().unwrap());
        assert_eq!(mock.resumed_threads(), vec![7]);
        assert_eq!(mock.resume_all_calls(), 1);
    }

    #[test]
    fn detached_events_never_resume() {
        let raw = RawEvent::detached(thread_start(1));
        assert_eq!(raw.kind(), EventKind::ThreadStart);
        assert!(!raw.resume().unwrap());
        assert!(!raw.is_resumed());
    }
}
