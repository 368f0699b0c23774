use nova_jdwp::JdwpError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::ConsumerFailure;
use crate::request::RequestId;

#[derive(Debug, Error)]
pub enum DebuggerError {
    /// The request key resolved to zero physical targets.
    ///
    /// `pending` is set when the request was kept and will be retried once a
    /// matching class is prepared.
    #[error("no resolvable target for {target}")]
    NoResolvableTarget {
        target: String,
        pending: Option<RequestId>,
    },

    #[error("unknown debug profile `{0}`")]
    UnknownStrategy(String),

    #[error("invalid state: expected {expected}, but was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("connection to the debuggee was lost")]
    ConnectionLost,

    /// A queued consumer failure, surfaced by [`crate::DebugSession::check_failures`].
    ///
    /// Delivery itself never fails because of a consumer.
    #[error(transparent)]
    ConsumerFailure(#[from] ConsumerFailure),

    #[error(transparent)]
    Jdwp(JdwpError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DebuggerError {
    /// Id of the request that was retained as pending, if any.
    pub fn pending_request(&self) -> Option<RequestId> {
        match self {
            DebuggerError::NoResolvableTarget { pending, .. } => *pending,
            _ => None,
        }
    }
}

impl From<JdwpError> for DebuggerError {
    fn from(err: JdwpError) -> Self {
        if err.is_disconnect() {
            DebuggerError::ConnectionLost
        } else {
            DebuggerError::Jdwp(err)
        }
    }
}

pub type Result<T, E = DebuggerError> = std::result::Result<T, E>;
