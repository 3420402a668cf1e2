//! Process existence checking.

use stoker_common::{SupervisorError, SupervisorResult};

/// Check if a process with the given PID exists and is running.
///
/// On Unix this sends signal 0 via `kill(2)`, which delivers nothing
/// but reports whether the target exists. A permission error means the
/// process exists but belongs to someone else, which still counts as
/// alive for reattachment purposes.
pub fn process_exists(pid: u32) -> SupervisorResult<bool> {
    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> SupervisorResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(SupervisorError::configuration(format!(
            "failed to probe pid {pid}: {e}"
        ))),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> SupervisorResult<bool> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                Ok(true)
            }
            // Invalid-parameter and access-denied both indicate the
            // handle cannot be opened as a live target.
            Err(_) => Ok(false),
        }
    }
}
