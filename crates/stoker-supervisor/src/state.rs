//! Instance lifecycle state machine.

use std::fmt;

/// Lifecycle state of one supervised instance.
///
/// `Attached` and `Detached` both mean a live process; the difference
/// is whether this control plane owns its pipes. A process found via
/// the PID file after a restart is `Detached`: observable through its
/// log file and signallable, but with no stdin to write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No process is associated with the instance.
    Stopped,
    /// A process spawned by this control plane, with piped stdio.
    Attached,
    /// A live process recovered from the PID file; no pipe access.
    Detached,
    /// A stop was requested and the process has not yet exited.
    Stopping,
}

impl SupervisorState {
    /// Whether the instance counts as running.
    ///
    /// `Stopping` counts: a process that was asked to stop is still
    /// alive until its exit is observed, and a `start()` in that
    /// window must be refused.
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Whether moving to `next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (Stopped, Attached)
                | (Stopped, Detached)
                | (Attached, Stopping)
                | (Attached, Stopped)
                | (Detached, Stopping)
                | (Detached, Stopped)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
