use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nova_jdwp::{EventSet, JdwpClient, JdwpError, JdwpEvent};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{DebuggerError, Result};
use crate::event::{RawEvent, ResumeToken};
use crate::pipeline::PipelineRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

impl LoopState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopState::Stopped => "stopped",
            LoopState::Running => "running",
        }
    }
}

/// Called from the dispatch thread when the debuggee connection is gone.
pub type DisconnectHook = Arc<dyn Fn(&JdwpError) + Send + Sync>;

struct Shared {
    state: Mutex<LoopState>,
    on_disconnect: RwLock<Option<DisconnectHook>>,
}

#[derive(Default)]
struct Control {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Drains the VM event queue on a dedicated thread and feeds the pipelines.
///
/// Every event of a set is delivered before the set is resumed according to
/// its suspend policy, unless a consumer resumed it early. Stopping is
/// cooperative: the event set in flight is finished first.
pub struct EventDispatchLoop {
    client: Arc<dyn JdwpClient>,
    pipelines: Arc<PipelineRegistry>,
    poll_interval: Duration,
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl EventDispatchLoop {
    pub fn new(
        client: Arc<dyn JdwpClient>,
        pipelines: Arc<PipelineRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            pipelines,
            poll_interval,
            shared: Arc::new(Shared {
                state: Mutex::new(LoopState::Stopped),
                on_disconnect: RwLock::new(None),
            }),
            control: Mutex::new(Control::default()),
        }
    }

    pub fn set_disconnect_hook(&self, hook: DisconnectHook) {
        *self.shared.on_disconnect.write() = Some(hook);
    }

    pub fn state(&self) -> LoopState {
        *self.shared.state.lock()
    }

    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock();
        {
            let mut state = self.shared.state.lock();
            if *state == LoopState::Running {
                return Err(DebuggerError::InvalidState {
                    expected: LoopState::Stopped.as_str(),
                    actual: LoopState::Running.as_str(),
                });
            }
            *state = LoopState::Running;
        }

        // A loop that ended on its own (connection loss) leaves a finished thread behind.
        if let Some(previous) = control.handle.take() {
            if previous.thread().id() != thread::current().id() {
                let _ = previous.join();
            }
        }

        let cancel = CancellationToken::new();
        let worker = Worker {
            client: self.client.clone(),
            pipelines: self.pipelines.clone(),
            poll_interval: self.poll_interval,
            shared: self.shared.clone(),
            cancel: cancel.clone(),
        };
        let handle = thread::Builder::new()
            .name("nova-debugger-events".to_owned())
            .spawn(move || worker.run());
        match handle {
            Ok(handle) => {
                control.cancel = Some(cancel);
                control.handle = Some(handle);
                tracing::info!(target = "nova.debugger", poll_interval_ms = self.poll_interval.as_millis() as u64, "event dispatch loop started");
                Ok(())
            }
            Err(err) => {
                *self.shared.state.lock() = LoopState::Stopped;
                Err(DebuggerError::Jdwp(JdwpError::Other(format!(
                    "failed to spawn event dispatch thread: {err}"
                ))))
            }
        }
    }

    /// Stop delivering events. Installed requests stay installed.
    ///
    /// Returns once the event set in flight (if any) has been fully delivered.
    /// When called from a consumer on the dispatch thread itself, the loop
    /// exits after the current set instead.
    pub fn stop(&self) -> Result<()> {
        let mut control = self.control.lock();
        if self.state() == LoopState::Stopped {
            return Err(DebuggerError::InvalidState {
                expected: LoopState::Running.as_str(),
                actual: LoopState::Stopped.as_str(),
            });
        }
        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = control.handle.take() {
            if handle.thread().id() == thread::current().id() {
                control.handle = Some(handle);
            } else if handle.join().is_err() {
                tracing::error!(target = "nova.debugger", "event dispatch thread panicked");
            }
        }
        *self.shared.state.lock() = LoopState::Stopped;
        tracing::info!(target = "nova.debugger", "event dispatch loop stopped");
        Ok(())
    }
}

impl Drop for EventDispatchLoop {
    fn drop(&mut self) {
        if self.state() == LoopState::Running {
            let _ = self.stop();
        }
    }
}

struct Worker {
    client: Arc<dyn JdwpClient>,
    pipelines: Arc<PipelineRegistry>,
    poll_interval: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Worker {
    fn run(self) {
        while !self.cancel.is_cancelled() {
            match self.client.poll_event(self.poll_interval) {
                Ok(None) => {}
                Ok(Some(set)) => {
                    if self.dispatch(set) {
                        self.connection_lost(&JdwpError::ConnectionClosed);
                        return;
                    }
                }
                Err(err) if err.is_disconnect() => {
                    self.connection_lost(&err);
                    return;
                }
                Err(err) => {
                    tracing::warn!(target = "nova.debugger", error = %err, "failed to poll debuggee events");
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }

    /// Deliver one event set and resume it. Returns `true` if the set ended the connection.
    fn dispatch(&self, set: EventSet) -> bool {
        let resume = ResumeToken::for_event_set(self.client.clone(), &set);
        let policy = set.suspend_policy;
        let mut disconnected = false;
        tracing::trace!(target = "nova.debugger", events = set.events.len(), ?policy, "dispatching event set");

        for event in set.events {
            disconnected |= matches!(event, JdwpEvent::VmDisconnect);
            self.pipelines.deliver(&RawEvent::new(event, policy, resume.clone()));
        }

        if !disconnected {
            if let Err(err) = resume.resume() {
                tracing::warn!(target = "nova.debugger", ?policy, error = %err, "failed to resume after event set");
            }
        }
        disconnected
    }

    fn connection_lost(&self, err: &JdwpError) {
        tracing::error!(target = "nova.debugger", error = %err, "lost connection to debuggee; event dispatch loop exiting");
        *self.shared.state.lock() = LoopState::Stopped;
        let hook = self.shared.on_disconnect.read().clone();
        if let Some(hook) = hook {
            hook(err);
        }
    }
}
