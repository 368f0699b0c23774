//! Nova debugger engine.
//!
//! This crate sits between a debug control interface ([`nova_jdwp::JdwpClient`])
//! and the layers that drive a debug session:
//! - Request registries: one idempotent, concurrently usable registry per
//!   request kind, mapping request arguments to logical [`RequestId`]s and
//!   those to the physical requests installed in the VM.
//! - Event pipelines: composable, push-based streams of VM events with
//!   optional side-channel [`EventData`].
//! - The event dispatch loop, which drains the VM event queue and resumes
//!   suspended threads once consumers have run.
//! - Debug profiles: interchangeable implementations of the debugging surface,
//!   switchable at runtime through [`SwappableProfile`].
//! - [`DebugSession`], which owns all of the above for one connection.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod metadata;
pub mod pipeline;
pub mod profile;
pub mod request;
pub mod session;

pub use crate::config::{init_tracing, ConfigError, DebuggerConfig};
pub use crate::dispatch::{EventDispatchLoop, LoopState};
pub use crate::error::{DebuggerError, Result};
pub use crate::event::{EventData, EventDataRequest, EventDataResult, RawEvent};
pub use crate::metadata::{TypeMetadata, TypeMetadataCache};
pub use crate::pipeline::{ConsumerFailure, ConsumerId, EventPipeline, PipelineRegistry};
pub use crate::profile::{DataPipeline, DebugProfile, PureDebugProfile, SwappableProfile};
pub use crate::request::{RequestId, RequestManagers, RequestOptions, RequestSpec};
pub use crate::session::{ConnectTarget, DebugSession, SessionState};
