//! Error types for instance supervision and the remote-console layer.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;

/// Error taxonomy for the control plane core.
///
/// The lifecycle variants (`AlreadyRunning`, `NotRunning`,
/// `DetachedMode`) are returned synchronously from supervisor
/// operations and describe legal, recoverable states. `SpawnFailure`
/// leaves supervisor state unchanged. Protocol errors only ever affect
/// the connection that produced them.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `start()` was called while a process is already associated with
    /// the instance (attached or detached).
    #[error("instance {id} is already running")]
    AlreadyRunning { id: String },

    /// `stop()` was called with no live process to stop.
    #[error("instance {id} is not running")]
    NotRunning { id: String },

    /// A command was written to an instance whose stdin the supervisor
    /// does not own (detached after a control-plane restart, or
    /// stopped).
    #[error("instance {id} is running in detached mode, cannot send command")]
    DetachedMode { id: String },

    /// The OS refused to create pipes or exec the child process.
    #[error("failed to spawn process for instance {id}: {reason}")]
    SpawnFailure { id: String, reason: String },

    /// An RCON frame violated the framing bounds; the offending
    /// connection is closed.
    #[error("rcon protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// A remote client presented a password that failed verification.
    #[error("authentication rejected")]
    AuthRejected,

    /// A restart gave up waiting for the old process to exit.
    #[error("restart failed: instance {id} didn't stop in time")]
    RestartTimeout { id: String },

    /// No instance is registered under the requested ID.
    #[error("instance not found: {id}")]
    InstanceNotFound { id: String },

    /// Invalid configuration (bad YAML, duplicate IDs, unparsable
    /// PID file content, and similar).
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A registered sink could not accept a delivery; the hub drops
    /// the sink in response.
    #[error("sink delivery failed: {reason}")]
    SinkClosed { reason: String },

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    pub fn already_running(id: impl Into<String>) -> Self {
        Self::AlreadyRunning { id: id.into() }
    }

    pub fn not_running(id: impl Into<String>) -> Self {
        Self::NotRunning { id: id.into() }
    }

    pub fn detached_mode(id: impl Into<String>) -> Self {
        Self::DetachedMode { id: id.into() }
    }

    pub fn spawn_failure(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailure {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: reason.into(),
        }
    }

    pub fn restart_timeout(id: impl Into<String>) -> Self {
        Self::RestartTimeout { id: id.into() }
    }

    pub fn instance_not_found(id: impl Into<String>) -> Self {
        Self::InstanceNotFound { id: id.into() }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn sink_closed(reason: impl Into<String>) -> Self {
        Self::SinkClosed {
            reason: reason.into(),
        }
    }
}
