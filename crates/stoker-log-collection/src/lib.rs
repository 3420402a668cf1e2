//! # Stoker Log Collection
//!
//! Append-only capture of managed-process output, plus the two read
//! paths reattachment needs: a synchronous last-N-lines read to seed
//! the console ring buffer, and a polling tailer that streams lines
//! appended to the log file by a detached process exactly as live
//! output would arrive.

pub mod store;
pub mod tail;

pub use store::{read_last_lines, LogStore, LOG_FILE_NAME};
pub use tail::spawn_tailer;
