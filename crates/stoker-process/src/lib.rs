//! # Stoker Process
//!
//! OS process primitives for the control plane: liveness probing and
//! termination of processes the supervisor does not hold a handle to
//! (orphans recovered from a PID file).
//!
//! Supervisor logic never touches the OS directly; it goes through the
//! [`ProcessProbe`] trait so that reattachment and detached-stop paths
//! can be driven by a fake probe in tests.

pub mod check;
pub mod terminate;

pub use check::process_exists;
pub use terminate::terminate_gracefully;

use stoker_common::SupervisorResult;

/// Capability for observing and signalling processes by PID.
///
/// `is_alive` must be non-destructive (signal 0 on Unix); `terminate`
/// requests a graceful shutdown and does not wait for exit.
pub trait ProcessProbe: Send + Sync {
    /// Check whether a process with this PID currently exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask the process to terminate (SIGTERM on Unix). Returns once
    /// the signal is delivered; exit is not confirmed.
    fn terminate(&self, pid: u32) -> SupervisorResult<()>;
}

/// Probe backed by the real operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        process_exists(pid).unwrap_or(false)
    }

    fn terminate(&self, pid: u32) -> SupervisorResult<()> {
        terminate_gracefully(pid)
    }
}
