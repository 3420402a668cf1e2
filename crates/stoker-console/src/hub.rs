//! Console line broadcaster with a bounded replay buffer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::sink::ConsoleSink;

/// Capacity of the ring buffer used to seed newly registered clients.
pub const CONSOLE_BUFFER_LINES: usize = 100;

/// Identity of a registered sink. Sinks are added and removed by this
/// handle, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

impl SinkId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

enum HubCommand {
    Publish(String),
    Seed(Vec<String>),
    Register { id: SinkId, sink: Box<dyn ConsoleSink> },
    Unregister(SinkId),
    Recent(oneshot::Sender<Vec<String>>),
    SinkCount(oneshot::Sender<usize>),
}

/// Handle to one instance's console broadcaster.
///
/// Cloning is cheap; all clones feed the same control loop. The loop
/// ends when the last handle is dropped.
#[derive(Clone)]
pub struct ConsoleHub {
    tx: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl ConsoleHub {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(control_loop(rx));
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Append a line to the ring buffer and deliver it to every
    /// registered sink, in the order published.
    pub fn publish(&self, line: impl Into<String>) {
        let _ = self.tx.send(HubCommand::Publish(line.into()));
    }

    /// Pre-fill the ring buffer with recovered history without
    /// delivering it (used on reattachment, before clients register).
    pub fn seed(&self, lines: Vec<String>) {
        let _ = self.tx.send(HubCommand::Seed(lines));
    }

    /// Add a sink and replay the buffered lines to it in order.
    ///
    /// Replay happens inside the control loop; a line published while
    /// registration is in flight may be seen once in the replay and
    /// once live, or fall into the seam. Accepted as a low-severity
    /// race.
    pub fn register(&self, sink: Box<dyn ConsoleSink>) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(HubCommand::Register { id, sink });
        id
    }

    /// Remove a sink by identity. The caller releases the transport.
    pub fn unregister(&self, id: SinkId) {
        let _ = self.tx.send(HubCommand::Unregister(id));
    }

    /// Snapshot of the ring buffer contents, oldest first.
    ///
    /// Because commands are processed in order, awaiting this also
    /// acts as a barrier for previously issued publishes.
    pub async fn recent(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Recent(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Number of currently registered sinks.
    pub async fn sink_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(HubCommand::SinkCount(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

impl Default for ConsoleHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleHub").finish_non_exhaustive()
    }
}

async fn control_loop(mut rx: mpsc::UnboundedReceiver<HubCommand>) {
    let mut buffer: VecDeque<String> = VecDeque::with_capacity(CONSOLE_BUFFER_LINES);
    let mut sinks: HashMap<SinkId, Box<dyn ConsoleSink>> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Publish(line) => {
                if buffer.len() == CONSOLE_BUFFER_LINES {
                    buffer.pop_front();
                }
                buffer.push_back(line.clone());

                let mut dead = Vec::new();
                for (id, sink) in sinks.iter_mut() {
                    if let Err(e) = sink.deliver(&line).await {
                        debug!(sink = id.0, error = %e, "dropping console sink after failed delivery");
                        dead.push(*id);
                    }
                }
                for id in dead {
                    sinks.remove(&id);
                }
            }
            HubCommand::Seed(lines) => {
                for line in lines {
                    if buffer.len() == CONSOLE_BUFFER_LINES {
                        buffer.pop_front();
                    }
                    buffer.push_back(line);
                }
            }
            HubCommand::Register { id, mut sink } => {
                let mut alive = true;
                for line in &buffer {
                    if let Err(e) = sink.deliver(line).await {
                        debug!(sink = id.0, error = %e, "console sink failed during replay");
                        alive = false;
                        break;
                    }
                }
                if alive {
                    sinks.insert(id, sink);
                }
            }
            HubCommand::Unregister(id) => {
                sinks.remove(&id);
            }
            HubCommand::Recent(reply) => {
                let _ = reply.send(buffer.iter().cloned().collect());
            }
            HubCommand::SinkCount(reply) => {
                let _ = reply.send(sinks.len());
            }
        }
    }
}
