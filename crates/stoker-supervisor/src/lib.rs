//! # Stoker Supervisor
//!
//! Per-instance process supervision: spawn with piped stdio, console
//! capture and fan-out, PID-file-based reattachment after a control
//! plane restart, resource sampling, and the stop/restart choreography
//! game servers expect.
//!
//! One [`ProcessSupervisor`] owns one instance. All shared access goes
//! through `Arc<ProcessSupervisor>`; internal state lives behind a
//! single lock that is never held across an await point.

pub mod command;
mod sampler;
pub mod state;
pub mod supervisor;

pub use command::{build_launch_command, LaunchCommand};
pub use state::SupervisorState;
pub use supervisor::{ProcessSupervisor, RESTART_FAILED_MESSAGE, SERVER_STOPPED_MESSAGE};
