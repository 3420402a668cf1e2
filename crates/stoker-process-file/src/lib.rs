//! # Stoker Process File
//!
//! The PID file is the only state that survives a control-plane
//! restart, and the sole input to orphan-process reattachment. Format
//! is plain decimal text at `<workdir>/server.pid`; absence or a dead
//! PID means the instance is stopped.

use std::path::{Path, PathBuf};

use stoker_common::{SupervisorError, SupervisorResult};
use tracing::debug;

/// File name of the PID file inside an instance working directory.
pub const PID_FILE_NAME: &str = "server.pid";

/// Handle to one instance's PID file.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// PID file for the given instance working directory.
    pub fn in_dir(work_dir: impl AsRef<Path>) -> Self {
        Self {
            path: work_dir.as_ref().join(PID_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Record the PID of a freshly spawned process.
    pub fn write(&self, pid: u32) -> SupervisorResult<()> {
        std::fs::write(&self.path, pid.to_string())?;
        debug!(path = %self.path.display(), pid, "wrote pid file");
        Ok(())
    }

    /// Read the recorded PID.
    ///
    /// Returns `Ok(None)` when no PID file exists. Unparsable content
    /// is an error so the caller can decide to treat the file as stale
    /// and remove it.
    pub fn read(&self) -> SupervisorResult<Option<u32>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let pid = content.trim().parse::<u32>().map_err(|e| {
            SupervisorError::configuration(format!(
                "invalid pid in {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(pid))
    }

    /// Delete the PID file. Succeeds if it is already gone.
    pub fn remove(&self) -> SupervisorResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed pid file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_read_remove_roundtrip() {
        let dir = tempdir().unwrap();
        let pid_file = PidFile::in_dir(dir.path());

        assert!(!pid_file.exists());
        assert_eq!(pid_file.read().unwrap(), None);

        pid_file.write(4321).unwrap();
        assert!(pid_file.exists());
        assert_eq!(pid_file.read().unwrap(), Some(4321));

        pid_file.remove().unwrap();
        assert!(!pid_file.exists());
        // Removing again is not an error.
        pid_file.remove().unwrap();
    }

    #[test]
    fn file_content_is_plain_decimal() {
        let dir = tempdir().unwrap();
        let pid_file = PidFile::in_dir(dir.path());
        pid_file.write(77).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(PID_FILE_NAME)).unwrap();
        assert_eq!(raw.trim(), "77");
    }

    #[test]
    fn garbage_content_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(PID_FILE_NAME), "not-a-pid").unwrap();

        let pid_file = PidFile::in_dir(dir.path());
        assert!(matches!(
            pid_file.read(),
            Err(SupervisorError::Configuration { .. })
        ));
    }
}
