//! Periodic resource sampling for an attached process.

use std::time::Duration;

use chrono::Utc;
use stoker_console::{ProcessStats, StatsHub};
use sysinfo::{Pid, ProcessRefreshKind, System};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn a task that samples CPU and resident memory of `pid` every
/// two seconds and publishes the readings to `hub`.
///
/// The task ends when `token` is cancelled or the process disappears
/// from the process table. CPU percentages are meaningful from the
/// second sample on; the first reading after refresh is zero by
/// construction.
pub(crate) fn spawn_sampler(pid: u32, hub: StatsHub, token: CancellationToken) {
    tokio::spawn(async move {
        let mut system = System::new();
        let mut ticker = interval(SAMPLE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let sysinfo_pid = Pid::from_u32(pid);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Refresh must name what it wants or sysinfo serves stale
            // zeroes.
            system.refresh_process_specifics(
                sysinfo_pid,
                ProcessRefreshKind::new().with_cpu().with_memory(),
            );

            let Some(process) = system.process(sysinfo_pid) else {
                debug!(pid, "sampled process is gone, sampler exiting");
                break;
            };

            hub.publish(ProcessStats {
                cpu: process.cpu_usage() as f64,
                memory: process.memory(),
                time: Utc::now().timestamp(),
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use stoker_common::SupervisorResult;
    use stoker_console::StatsSink;
    use tokio::time::{sleep, timeout};

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

    #[tokio::test]
    async fn samples_the_current_process() {
        let hub = StatsHub::new();
        let sink = CollectingSink::default();
        hub.register(Box::new(sink.clone()));

        let token = CancellationToken::new();
        spawn_sampler(std::process::id(), hub.clone(), token.clone());

        let deadline = Duration::from_secs(10);
        timeout(deadline, async {
            loop {
                if !sink.samples.lock().is_empty() {
                    break;
                }
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .unwrap();
        token.cancel();

        let samples = sink.samples.lock().clone();
        let first = samples.first().unwrap();
        assert!(first.memory > 0);
        assert!(first.time > 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sampler_exits_when_the_process_disappears() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        let dead_pid = child.id();

        let hub = StatsHub::new();
        let sink = CollectingSink::default();
        hub.register(Box::new(sink.clone()));

        let token = CancellationToken::new();
        spawn_sampler(dead_pid, hub.clone(), token.clone());

        // Give the sampler time to take its first tick and notice.
        sleep(Duration::from_secs(3)).await;
        token.cancel();
        assert!(sink.samples.lock().is_empty());
    }
}
