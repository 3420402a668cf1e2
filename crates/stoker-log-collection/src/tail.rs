//! Polling file tailer.
//!
//! While an instance runs detached, its output reaches us only through
//! the log file the process keeps appending to. The tailer follows
//! appends from the current end of file and forwards complete lines;
//! history before the attach point is handled separately by
//! [`read_last_lines`](crate::read_last_lines).

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often the tailer re-polls the file once it has caught up.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Follow appends to `path`, starting at the current end of file.
///
/// Complete lines (without the trailing newline) are sent on the
/// returned channel. The task ends, closing the channel, when `token`
/// is cancelled or the file becomes unreadable. A file that does not
/// exist yet is waited for rather than treated as an error.
pub fn spawn_tailer(path: PathBuf, token: CancellationToken) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(tail_loop(path, token, tx));
    rx
}

async fn tail_loop(path: PathBuf, token: CancellationToken, tx: mpsc::UnboundedSender<String>) {
    let file = loop {
        if token.is_cancelled() {
            return;
        }
        match File::open(&path).await {
            Ok(file) => break file,
            Err(_) => {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep(POLL_INTERVAL) => {}
                }
            }
        }
    };

    let mut reader = BufReader::new(file);
    if let Err(e) = reader.seek(SeekFrom::End(0)).await {
        warn!(path = %path.display(), error = %e, "failed to seek log file, tailer exiting");
        return;
    }

    debug!(path = %path.display(), "tailing log file");

    // Partial lines (a write that has not reached its newline yet) are
    // accumulated across polls.
    let mut line = String::new();
    loop {
        if token.is_cancelled() {
            break;
        }

        match reader.read_line(&mut line).await {
            // Caught up with the writer; poll again shortly.
            Ok(0) => {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(POLL_INTERVAL) => {}
                }
            }
            Ok(_) if line.ends_with('\n') => {
                let complete = line.trim_end_matches(['\n', '\r']).to_string();
                line.clear();
                if tx.send(complete).is_err() {
                    // Receiver gone; nobody is watching this instance.
                    break;
                }
            }
            Ok(_) => {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(POLL_INTERVAL) => {}
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error tailing log file");
                break;
            }
        }
    }

    debug!(path = %path.display(), "tailer stopped");
}
