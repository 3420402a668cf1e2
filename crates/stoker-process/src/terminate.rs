//! Process termination.

use stoker_common::{SupervisorError, SupervisorResult};

/// Request graceful termination of a process by PID.
///
/// Sends SIGTERM on Unix and `TerminateProcess` on Windows. Used for
/// detached instances only; attached instances are stopped through
/// their own stdin.
pub fn terminate_gracefully(pid: u32) -> SupervisorResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| {
            SupervisorError::configuration(format!("failed to terminate pid {pid}: {e}"))
        })
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, false, pid).map_err(|e| {
                SupervisorError::configuration(format!(
                    "failed to open pid {pid} for termination: {e}"
                ))
            })?;
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            result.map_err(|e| {
                SupervisorError::configuration(format!("failed to terminate pid {pid}: {e}"))
            })
        }
    }
}
