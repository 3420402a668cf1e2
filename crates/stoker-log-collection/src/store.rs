//! Append-only log file for one instance.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use stoker_common::SupervisorResult;

/// File name of the log file inside an instance working directory.
pub const LOG_FILE_NAME: &str = "server.log";

/// Shared append handle to `<workdir>/server.log`.
///
/// Both stream readers (stdout and stderr) of a running instance hold
/// a clone; line appends are serialized through the inner lock. Lines
/// are flushed immediately so a detached tailer sees them without
/// delay.
#[derive(Clone)]
pub struct LogStore {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl LogStore {
    /// Open (creating if necessary) the log file for a working
    /// directory, in append mode.
    pub fn open(work_dir: impl AsRef<Path>) -> SupervisorResult<Self> {
        let path = work_dir.as_ref().join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line of process output.
    pub fn append_line(&self, line: &str) -> SupervisorResult<()> {
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore").field("path", &self.path).finish()
    }
}

/// Read the last `n` lines of a log file.
///
/// A missing file is not an error; it yields an empty vector (a fresh
/// instance that has never run simply has no history to recover).
pub fn read_last_lines(path: impl AsRef<Path>, n: usize) -> SupervisorResult<Vec<String>> {
    let file = match File::open(path.as_ref()) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        lines.push(line?);
    }

    if lines.len() > n {
        lines.drain(..lines.len() - n);
    }
    Ok(lines)
}
