//! Resource sample fan-out.
//!
//! Samples are point-in-time readings; a client that connects late has
//! no use for old ones, so unlike the console hub there is no replay
//! buffer. Delivery and sink management otherwise mirror
//! [`ConsoleHub`](crate::ConsoleHub).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::hub::SinkId;
use crate::sink::StatsSink;

/// One resource sample for a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    /// CPU usage in percent of one core.
    pub cpu: f64,
    /// Resident set size in bytes.
    pub memory: u64,
    /// Unix timestamp (seconds) the sample was taken.
    pub time: i64,
}

enum StatsCommand {
    Publish(ProcessStats),
    Register { id: SinkId, sink: Box<dyn StatsSink> },
    Unregister(SinkId),
    SinkCount(oneshot::Sender<usize>),
}

/// Handle to one instance's stats broadcaster.
#[derive(Clone)]
pub struct StatsHub {
    tx: mpsc::UnboundedSender<StatsCommand>,
    next_id: Arc<AtomicU64>,
}

impl StatsHub {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(control_loop(rx));
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Deliver a sample to every registered sink.
    pub fn publish(&self, sample: ProcessStats) {
        let _ = self.tx.send(StatsCommand::Publish(sample));
    }

    pub fn register(&self, sink: Box<dyn StatsSink>) -> SinkId {
        let id = SinkId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(StatsCommand::Register { id, sink });
        id
    }

    pub fn unregister(&self, id: SinkId) {
        let _ = self.tx.send(StatsCommand::Unregister(id));
    }

    /// Number of currently registered sinks. Commands are processed in
    /// order, so awaiting this is also a barrier for prior publishes.
    pub async fn sink_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(StatsCommand::SinkCount(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

impl Default for StatsHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatsHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsHub").finish_non_exhaustive()
    }
}

async fn control_loop(mut rx: mpsc::UnboundedReceiver<StatsCommand>) {
    let mut sinks: HashMap<SinkId, Box<dyn StatsSink>> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            StatsCommand::Publish(sample) => {
                let mut dead = Vec::new();
                for (id, sink) in sinks.iter_mut() {
                    if let Err(e) = sink.deliver(&sample).await {
                        debug!(error = %e, "dropping stats sink after failed delivery");
                        dead.push(*id);
                    }
                }
                for id in dead {
                    sinks.remove(&id);
                }
            }
            StatsCommand::Register { id, sink } => {
                sinks.insert(id, sink);
            }
            StatsCommand::Unregister(id) => {
                sinks.remove(&id);
            }
            StatsCommand::SinkCount(reply) => {
                let _ = reply.send(sinks.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use stoker_common::{SupervisorError, SupervisorResult};

    #[derive(Clone, Default)]
    struct CollectingSink {
        samples: Arc<Mutex<Vec<ProcessStats>>>,
    }

    #[async_trait]
    impl StatsSink for CollectingSink {
        async fn deliver(&mut self, sample: &ProcessStats) -> SupervisorResult<()> {
            self.samples.lock().push(*sample);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl StatsSink for FailingSink {
        async fn deliver(&mut self, _sample: &ProcessStats) -> SupervisorResult<()> {
            Err(SupervisorError::sink_closed("connection reset"))
        }
    }

    fn sample(time: i64) -> ProcessStats {
        ProcessStats {
            cpu: 12.5,
            memory: 1024 * 1024,
            time,
        }
    }

    #[tokio::test]
    async fn samples_reach_registered_sinks() {
        let hub = StatsHub::new();
        let sink = CollectingSink::default();
        hub.register(Box::new(sink.clone()));

        hub.publish(sample(1));
        hub.publish(sample(2));
        assert_eq!(hub.sink_count().await, 1);

        let seen = sink.samples.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].time, 1);
        assert_eq!(seen[1].time, 2);
    }

    #[tokio::test]
    async fn late_registrants_get_no_history() {
        let hub = StatsHub::new();
        hub.publish(sample(1));

        let sink = CollectingSink::default();
        hub.register(Box::new(sink.clone()));
        assert_eq!(hub.sink_count().await, 1);
        assert!(sink.samples.lock().is_empty());
    }

    #[tokio::test]
    async fn failing_sink_is_removed() {
        let hub = StatsHub::new();
        hub.register(Box::new(FailingSink));
        assert_eq!(hub.sink_count().await, 1);
        hub.publish(sample(1));
        assert_eq!(hub.sink_count().await, 0);
    }

    #[test]
    fn sample_serializes_with_short_field_names() {
        let json = serde_json::to_string(&ProcessStats {
            cpu: 3.25,
            memory: 2048,
            time: 1_700_000_000,
        })
        .unwrap();
        assert_eq!(json, r#"{"cpu":3.25,"memory":2048,"time":1700000000}"#);
    }
}
