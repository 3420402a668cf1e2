//! The per-instance process supervisor.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stoker_common::{LaunchSpec, SupervisorError, SupervisorResult};
use stoker_console::{ConsoleHub, SinkId, StatsHub, CONSOLE_BUFFER_LINES};
use stoker_log_collection::{read_last_lines, spawn_tailer, LogStore, LOG_FILE_NAME};
use stoker_process::{ProcessProbe, SystemProbe};
use stoker_process_file::PidFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::build_launch_command;
use crate::sampler::spawn_sampler;
use crate::state::SupervisorState;

/// Console line published when the supervised process exits, and when
/// a detached process is signalled to stop.
pub const SERVER_STOPPED_MESSAGE: &str = "Server stopped";

/// Console line published when a restart gives up waiting for the old
/// process.
pub const RESTART_FAILED_MESSAGE: &str = "Restart failed: server didn't stop in time";

const RESTART_POLL_ATTEMPTS: u32 = 60;
const RESTART_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Inner {
    state: SupervisorState,
    pid: u32,
    /// Incremented per process association; lets a stale exit watcher
    /// recognize that a newer run has replaced its child.
    generation: u64,
    work_dir: Option<PathBuf>,
    spec: LaunchSpec,
    /// Stdin of an attached child. Behind its own async lock so a
    /// write can proceed without holding the state lock across the
    /// await.
    stdin: Option<Arc<tokio::sync::Mutex<ChildStdin>>>,
    stats_cancel: Option<CancellationToken>,
    tail_cancel: Option<CancellationToken>,
}

/// Supervisor for one game-server instance.
///
/// Construct with [`new`](Self::new) inside a Tokio runtime (the
/// console and stats hubs spawn their control tasks immediately), then
/// point it at a working directory with
/// [`set_working_directory`](Self::set_working_directory), which also
/// adopts an orphaned process if the PID file names a live one.
pub struct ProcessSupervisor {
    id: String,
    console: ConsoleHub,
    stats: StatsHub,
    probe: Arc<dyn ProcessProbe>,
    inner: Mutex<Inner>,
}

impl ProcessSupervisor {
    pub fn new(id: impl Into<String>, spec: LaunchSpec) -> Arc<Self> {
        Self::with_probe(id, spec, Arc::new(SystemProbe))
    }

    /// Like [`new`](Self::new) with an explicit process probe. Tests
    /// substitute a fake to drive reattachment and detached stops
    /// without real processes.
    pub fn with_probe(
        id: impl Into<String>,
        spec: LaunchSpec,
        probe: Arc<dyn ProcessProbe>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            console: ConsoleHub::new(),
            stats: StatsHub::new(),
            probe,
            inner: Mutex::new(Inner {
                state: SupervisorState::Stopped,
                pid: 0,
                generation: 0,
                work_dir: None,
                spec,
                stdin: None,
                stats_cancel: None,
                tail_cancel: None,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Console hub for this instance. Clients register sinks here.
    pub fn console(&self) -> &ConsoleHub {
        &self.console
    }

    /// Stats hub for this instance.
    pub fn stats(&self) -> &StatsHub {
        &self.stats
    }

    pub fn state(&self) -> SupervisorState {
        self.inner.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        let inner = self.inner.lock();
        if inner.state.is_running() {
            Some(inner.pid)
        } else {
            None
        }
    }

    /// Whether a process is currently associated with the instance.
    ///
    /// Re-probes a detached process first, so a detached instance that
    /// died on its own reads as stopped here.
    pub fn is_running(&self) -> bool {
        self.refresh_running();
        self.inner.lock().state.is_running()
    }

    /// Replace the launch spec used by the next `start()`.
    pub fn update_launch_spec(&self, spec: LaunchSpec) -> SupervisorResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_running() {
            return Err(SupervisorError::already_running(&self.id));
        }
        inner.spec = spec;
        Ok(())
    }

    /// Assign the instance working directory and adopt an orphaned
    /// process if the PID file there names a live one.
    pub fn set_working_directory(
        self: &Arc<Self>,
        dir: impl Into<PathBuf>,
    ) -> SupervisorResult<()> {
        let dir = dir.into();
        {
            let mut inner = self.inner.lock();
            if inner.state.is_running() {
                return Err(SupervisorError::already_running(&self.id));
            }
            inner.work_dir = Some(dir.clone());
        }
        self.try_reattach(&dir)
    }

    fn try_reattach(self: &Arc<Self>, dir: &Path) -> SupervisorResult<()> {
        let pid_file = PidFile::in_dir(dir);
        let pid = match pid_file.read() {
            Ok(None) => return Ok(()),
            Ok(Some(pid)) => pid,
            Err(SupervisorError::Configuration { reason }) => {
                warn!(id = %self.id, %reason, "unreadable pid file, treating as stale");
                pid_file.remove()?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !self.probe.is_alive(pid) {
            warn!(id = %self.id, pid, "pid file names a dead process, removing");
            pid_file.remove()?;
            return Ok(());
        }

        // Seed the console with the tail of the log so clients that
        // connect now see recent history, then follow new appends.
        let log_path = dir.join(LOG_FILE_NAME);
        self.console.seed(read_last_lines(&log_path, CONSOLE_BUFFER_LINES)?);

        let token = CancellationToken::new();
        let mut lines = spawn_tailer(log_path, token.clone());
        let console = self.console.clone();
        tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                console.publish(line);
            }
        });

        {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, SupervisorState::Detached);
            inner.pid = pid;
            inner.generation += 1;
            inner.tail_cancel = Some(token);
        }
        info!(id = %self.id, pid, "reattached to running instance");
        Ok(())
    }

    /// Spawn the configured process with piped stdio.
    ///
    /// Fails with `AlreadyRunning` while any process is associated,
    /// including one still in its stop window. A spawn failure leaves
    /// the instance stopped and startable.
    pub fn start(self: &Arc<Self>) -> SupervisorResult<()> {
        self.refresh_running();

        let mut inner = self.inner.lock();
        if inner.state.is_running() {
            return Err(SupervisorError::already_running(&self.id));
        }
        let dir = inner.work_dir.clone().ok_or_else(|| {
            SupervisorError::configuration(format!("instance {} has no working directory", self.id))
        })?;

        let launch = build_launch_command(&inner.spec);
        debug!(id = %self.id, program = %launch.program, args = ?launch.args, "launching");

        let log_store = LogStore::open(&dir)?;

        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .current_dir(&dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SupervisorError::spawn_failure(&self.id, e.to_string()))?;

        let pid = child.id().ok_or_else(|| {
            SupervisorError::spawn_failure(&self.id, "process exited before its pid was read")
        })?;

        // A failed PID file write degrades reattachment, not the run.
        let pid_file = PidFile::in_dir(&dir);
        if let Err(e) = pid_file.write(pid) {
            warn!(id = %self.id, error = %e, "failed to write pid file");
        }

        let stdin = child.stdin.take().map(|s| Arc::new(tokio::sync::Mutex::new(s)));
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        self.transition(&mut inner, SupervisorState::Attached);
        inner.pid = pid;
        inner.generation += 1;
        let generation = inner.generation;
        inner.stdin = stdin;
        let stats_token = CancellationToken::new();
        inner.stats_cancel = Some(stats_token.clone());
        drop(inner);

        if let Some(out) = stdout {
            spawn_output_reader(out, log_store.clone(), self.console.clone());
        }
        if let Some(err) = stderr {
            spawn_output_reader(err, log_store, self.console.clone());
        }
        spawn_sampler(pid, self.stats.clone(), stats_token);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let status = child.wait().await;
            this.on_exit(generation, status);
        });

        info!(id = %self.id, pid, "instance started");
        Ok(())
    }

    fn on_exit(&self, generation: u64, status: std::io::Result<std::process::ExitStatus>) {
        let dir = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                // A newer association replaced this run already.
                return;
            }
            self.transition(&mut inner, SupervisorState::Stopped);
            inner.pid = 0;
            inner.stdin = None;
            if let Some(token) = inner.stats_cancel.take() {
                token.cancel();
            }
            inner.work_dir.clone()
        };

        if let Some(dir) = dir {
            if let Err(e) = PidFile::in_dir(&dir).remove() {
                warn!(id = %self.id, error = %e, "failed to remove pid file after exit");
            }
        }

        match status {
            Ok(status) => info!(id = %self.id, %status, "instance exited"),
            Err(e) => warn!(id = %self.id, error = %e, "failed to collect exit status"),
        }
        self.console.publish(SERVER_STOPPED_MESSAGE);
    }

    /// Request the instance to stop.
    ///
    /// Attached: writes `stop` to the server console and closes its
    /// stdin; the state moves to `Stopping` until the exit watcher
    /// observes the process end. Detached: sends SIGTERM and clears
    /// the PID file immediately, without waiting for the process to
    /// actually exit. A second `stop()` during the stop window is a
    /// no-op.
    pub async fn stop(&self) -> SupervisorResult<()> {
        enum StopAction {
            Graceful(Option<Arc<tokio::sync::Mutex<ChildStdin>>>),
            Signal { pid: u32, dir: Option<PathBuf> },
        }

        let action = {
            let mut inner = self.inner.lock();
            match inner.state {
                SupervisorState::Stopped => {
                    return Err(SupervisorError::not_running(&self.id));
                }
                SupervisorState::Stopping => return Ok(()),
                SupervisorState::Attached => {
                    self.transition(&mut inner, SupervisorState::Stopping);
                    StopAction::Graceful(inner.stdin.take())
                }
                SupervisorState::Detached => {
                    self.transition(&mut inner, SupervisorState::Stopped);
                    let pid = inner.pid;
                    inner.pid = 0;
                    if let Some(token) = inner.tail_cancel.take() {
                        token.cancel();
                    }
                    StopAction::Signal {
                        pid,
                        dir: inner.work_dir.clone(),
                    }
                }
            }
        };

        match action {
            StopAction::Graceful(Some(stdin)) => {
                let mut stdin = stdin.lock().await;
                stdin.write_all(b"stop\n").await?;
                stdin.flush().await?;
                // Dropping the last handle closes the pipe; servers
                // that ignore the command still see EOF.
                Ok(())
            }
            StopAction::Graceful(None) => Ok(()),
            StopAction::Signal { pid, dir } => {
                info!(id = %self.id, pid, "terminating detached instance");
                // A signal failure usually means the process died a
                // moment ago; either way the instance is done and the
                // PID file is cleared.
                if let Err(e) = self.probe.terminate(pid) {
                    warn!(id = %self.id, pid, error = %e, "failed to signal detached instance");
                }
                if let Some(dir) = dir {
                    if let Err(e) = PidFile::in_dir(&dir).remove() {
                        warn!(id = %self.id, error = %e, "failed to remove pid file");
                    }
                }
                self.console.publish(SERVER_STOPPED_MESSAGE);
                Ok(())
            }
        }
    }

    /// Stop, wait for the process to go away, then start again with
    /// the current spec. Restarting a stopped instance is just a
    /// start.
    ///
    /// The wait polls once per second for up to a minute and runs
    /// inline, so this future does not resolve until the instance is
    /// back up or the budget is spent; callers wanting fire-and-forget
    /// spawn it as a task. If the old process never goes away,
    /// [`RESTART_FAILED_MESSAGE`] is published to the console, no
    /// second start is attempted, and `RestartTimeout` is returned.
    pub async fn restart(self: &Arc<Self>) -> SupervisorResult<()> {
        self.restart_with_budget(RESTART_POLL_ATTEMPTS, RESTART_POLL_INTERVAL)
            .await
    }

    async fn restart_with_budget(
        self: &Arc<Self>,
        attempts: u32,
        interval: Duration,
    ) -> SupervisorResult<()> {
        match self.stop().await {
            Ok(()) => {}
            Err(SupervisorError::NotRunning { .. }) => return self.start(),
            Err(e) => return Err(e),
        }

        let mut stopped = false;
        for _ in 0..attempts {
            if !self.is_running() {
                stopped = true;
                break;
            }
            sleep(interval).await;
        }
        if !stopped && self.is_running() {
            self.console.publish(RESTART_FAILED_MESSAGE);
            return Err(SupervisorError::restart_timeout(&self.id));
        }

        self.start()
    }

    /// Write one command line to the server console.
    ///
    /// Only an attached instance has a stdin to write to; every other
    /// state is refused as detached.
    pub async fn write_command(&self, command: &str) -> SupervisorResult<()> {
        let stdin = {
            let inner = self.inner.lock();
            match inner.state {
                SupervisorState::Attached => inner
                    .stdin
                    .clone()
                    .ok_or_else(|| SupervisorError::detached_mode(&self.id))?,
                _ => return Err(SupervisorError::detached_mode(&self.id)),
            }
        };

        let mut stdin = stdin.lock().await;
        stdin.write_all(command.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Inject a synthetic line into the instance console stream, as
    /// if the process had printed it. Installers and schedulers use
    /// this for status reporting.
    pub fn broadcast(&self, line: impl Into<String>) {
        self.console.publish(line);
    }

    pub fn register_console_sink(&self, sink: Box<dyn stoker_console::ConsoleSink>) -> SinkId {
        self.console.register(sink)
    }

    pub fn unregister_console_sink(&self, id: SinkId) {
        self.console.unregister(id);
    }

    pub fn register_stats_sink(&self, sink: Box<dyn stoker_console::StatsSink>) -> SinkId {
        self.stats.register(sink)
    }

    pub fn unregister_stats_sink(&self, id: SinkId) {
        self.stats.unregister(id);
    }

    /// Re-probe a detached process and fold a dead one back to
    /// stopped, clearing its PID file.
    fn refresh_running(&self) {
        let dir = {
            let mut inner = self.inner.lock();
            if inner.state != SupervisorState::Detached || self.probe.is_alive(inner.pid) {
                return;
            }
            self.transition(&mut inner, SupervisorState::Stopped);
            inner.pid = 0;
            if let Some(token) = inner.tail_cancel.take() {
                token.cancel();
            }
            inner.work_dir.clone()
        };

        info!(id = %self.id, "detached instance is gone");
        if let Some(dir) = dir {
            if let Err(e) = PidFile::in_dir(&dir).remove() {
                warn!(id = %self.id, error = %e, "failed to remove stale pid file");
            }
        }
    }

    fn transition(&self, inner: &mut Inner, next: SupervisorState) {
        debug_assert!(
            inner.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            inner.state
        );
        debug!(id = %self.id, from = %inner.state, to = %next, "state transition");
        inner.state = next;
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ProcessSupervisor")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("pid", &inner.pid)
            .finish_non_exhaustive()
    }
}

/// Forward one output stream to the log file and the console hub.
fn spawn_output_reader<R>(stream: R, log: LogStore, console: ConsoleHub)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(e) = log.append_line(&line) {
                        warn!(error = %e, "failed to append to log file");
                    }
                    console.publish(line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "error reading process output");
                    break;
                }
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use stoker_process_file::PID_FILE_NAME;
    use tempfile::tempdir;
    use tokio::time::timeout;

    const DEADLINE: Duration = Duration::from_secs(10);

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(DEADLINE, async {
            while !condition() {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn wait_for_line(sup: &ProcessSupervisor, needle: &str) {
        timeout(DEADLINE, async {
            loop {
                if sup.console().recent().await.iter().any(|l| l == needle) {
                    break;
                }
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("console line not observed in time");
    }

    #[tokio::test]
    async fn attached_lifecycle_start_echo_stop() {
        let dir = tempdir().unwrap();
        // `cat` echoes console writes back as output and exits on EOF.
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("cat"));
        sup.set_working_directory(dir.path()).unwrap();

        sup.start().unwrap();
        assert_eq!(sup.state(), SupervisorState::Attached);
        assert!(sup.is_running());
        assert!(sup.pid().is_some());
        assert!(dir.path().join(PID_FILE_NAME).exists());

        sup.write_command("hello console").await.unwrap();
        wait_for_line(&sup, "hello console").await;

        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
        wait_for_line(&sup, SERVER_STOPPED_MESSAGE).await;

        assert!(!sup.is_running());
        assert!(sup.pid().is_none());
        assert!(!dir.path().join(PID_FILE_NAME).exists());

        // Output also reached the log file.
        let lines = read_last_lines(dir.path().join(LOG_FILE_NAME), 100).unwrap();
        assert!(lines.iter().any(|l| l == "hello console"));
    }

    #[tokio::test]
    async fn start_while_running_is_rejected() {
        let dir = tempdir().unwrap();
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("cat"));
        sup.set_working_directory(dir.path()).unwrap();
        sup.start().unwrap();

        assert!(matches!(
            sup.start(),
            Err(SupervisorError::AlreadyRunning { .. })
        ));

        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    #[tokio::test]
    async fn start_without_working_directory_is_a_configuration_error() {
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("cat"));
        assert!(matches!(
            sup.start(),
            Err(SupervisorError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn spawn_failure_leaves_the_instance_startable() {
        let dir = tempdir().unwrap();
        let bad = LaunchSpec {
            java_path: Some("/nonexistent/jdk/bin/java".to_string()),
            ..LaunchSpec::default()
        };
        let sup = ProcessSupervisor::new("mc1", bad);
        sup.set_working_directory(dir.path()).unwrap();

        assert!(matches!(
            sup.start(),
            Err(SupervisorError::SpawnFailure { .. })
        ));
        assert_eq!(sup.state(), SupervisorState::Stopped);

        sup.update_launch_spec(LaunchSpec::from_command("cat")).unwrap();
        sup.start().unwrap();
        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    #[tokio::test]
    async fn write_command_requires_an_attached_process() {
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::default());
        assert!(matches!(
            sup.write_command("say hi").await,
            Err(SupervisorError::DetachedMode { .. })
        ));
    }

    #[tokio::test]
    async fn stop_when_stopped_is_not_running() {
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::default());
        assert!(matches!(
            sup.stop().await,
            Err(SupervisorError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn update_launch_spec_is_refused_while_running() {
        let dir = tempdir().unwrap();
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("cat"));
        sup.set_working_directory(dir.path()).unwrap();
        sup.start().unwrap();

        assert!(matches!(
            sup.update_launch_spec(LaunchSpec::default()),
            Err(SupervisorError::AlreadyRunning { .. })
        ));

        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    #[tokio::test]
    async fn restart_produces_a_fresh_process() {
        let dir = tempdir().unwrap();
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("cat"));
        sup.set_working_directory(dir.path()).unwrap();

        sup.start().unwrap();
        let first_pid = sup.pid().unwrap();

        sup.restart().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Attached);
        let second_pid = sup.pid().unwrap();
        assert_ne!(first_pid, second_pid);

        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    #[tokio::test]
    async fn restart_gives_up_when_the_process_never_stops() {
        let dir = tempdir().unwrap();
        // A process that neither reads its stdin nor exits on EOF, so
        // the graceful stop has no effect on it.
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("sleep 30"));
        sup.set_working_directory(dir.path()).unwrap();
        sup.start().unwrap();
        let pid = sup.pid().unwrap();

        let err = sup
            .restart_with_budget(3, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::RestartTimeout { .. }));
        wait_for_line(&sup, RESTART_FAILED_MESSAGE).await;

        // No second start was attempted: the stop window is still
        // open and the old process is still the associated one.
        assert_eq!(sup.state(), SupervisorState::Stopping);
        assert_eq!(sup.pid(), Some(pid));

        stoker_process::terminate_gracefully(pid).unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    #[tokio::test]
    async fn restart_of_a_stopped_instance_just_starts() {
        let dir = tempdir().unwrap();
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::from_command("cat"));
        sup.set_working_directory(dir.path()).unwrap();

        sup.restart().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Attached);

        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    #[tokio::test]
    async fn broadcast_lines_join_the_console_stream() {
        let sup = ProcessSupervisor::new("mc1", LaunchSpec::default());
        sup.broadcast("Installing modpack");
        wait_for_line(&sup, "Installing modpack").await;
    }

    #[tokio::test]
    async fn reattaches_to_a_live_process_from_the_pid_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), "old output\n").unwrap();

        let mut orphan = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        PidFile::in_dir(dir.path()).write(orphan.id()).unwrap();

        let sup = ProcessSupervisor::new("mc1", LaunchSpec::default());
        sup.set_working_directory(dir.path()).unwrap();

        assert_eq!(sup.state(), SupervisorState::Detached);
        assert!(sup.is_running());
        assert_eq!(sup.pid(), Some(orphan.id()));
        wait_for_line(&sup, "old output").await;

        // No pipe to the adopted process.
        assert!(matches!(
            sup.write_command("say hi").await,
            Err(SupervisorError::DetachedMode { .. })
        ));

        // Detached stop signals the process and clears the PID file
        // without waiting for the exit.
        sup.stop().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(!dir.path().join(PID_FILE_NAME).exists());
        wait_for_line(&sup, SERVER_STOPPED_MESSAGE).await;

        orphan.wait().unwrap();
    }

    /// Probe for a process that never dies: adoption always sees it
    /// alive and termination signals are accepted but ignored.
    struct ImmortalProbe {
        terminated: Mutex<Vec<u32>>,
    }

    impl ImmortalProbe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                terminated: Mutex::new(Vec::new()),
            })
        }
    }

    impl ProcessProbe for ImmortalProbe {
        fn is_alive(&self, _pid: u32) -> bool {
            true
        }

        fn terminate(&self, pid: u32) -> SupervisorResult<()> {
            self.terminated.lock().push(pid);
            Ok(())
        }
    }

    #[tokio::test]
    async fn detached_stop_reports_stopped_without_exit_confirmation() {
        let dir = tempdir().unwrap();
        let probe = ImmortalProbe::new();
        let sup = ProcessSupervisor::with_probe(
            "mc1",
            LaunchSpec::from_command("cat"),
            Arc::clone(&probe) as Arc<dyn ProcessProbe>,
        );

        PidFile::in_dir(dir.path()).write(12345).unwrap();
        sup.set_working_directory(dir.path()).unwrap();
        assert_eq!(sup.state(), SupervisorState::Detached);

        // Known hazard of the detached stop: the signal is sent and
        // the instance reports stopped at once, even though this
        // process never exits. The PID file is cleared regardless.
        sup.stop().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(!dir.path().join(PID_FILE_NAME).exists());
        assert_eq!(*probe.terminated.lock(), vec![12345]);

        // A follow-up start is allowed while the old process may
        // still be alive; the two can race on the working directory.
        sup.start().unwrap();
        assert_eq!(sup.state(), SupervisorState::Attached);

        sup.stop().await.unwrap();
        wait_until(|| sup.state() == SupervisorState::Stopped).await;
    }

    struct FailingTerminateProbe;

    impl ProcessProbe for FailingTerminateProbe {
        fn is_alive(&self, _pid: u32) -> bool {
            true
        }

        fn terminate(&self, _pid: u32) -> SupervisorResult<()> {
            Err(SupervisorError::configuration("no such process"))
        }
    }

    #[tokio::test]
    async fn detached_stop_clears_the_pid_file_even_when_the_signal_fails() {
        let dir = tempdir().unwrap();
        let sup = ProcessSupervisor::with_probe(
            "mc1",
            LaunchSpec::default(),
            Arc::new(FailingTerminateProbe),
        );

        PidFile::in_dir(dir.path()).write(12345).unwrap();
        sup.set_working_directory(dir.path()).unwrap();
        assert_eq!(sup.state(), SupervisorState::Detached);

        // The process most likely died between probe and signal;
        // treat the stop as done rather than stranding the PID file.
        sup.stop().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(!dir.path().join(PID_FILE_NAME).exists());
        wait_for_line(&sup, SERVER_STOPPED_MESSAGE).await;
    }

    #[tokio::test]
    async fn stale_pid_file_is_cleared_on_adoption() {
        let dir = tempdir().unwrap();
        let mut gone = std::process::Command::new("true").spawn().unwrap();
        gone.wait().unwrap();
        PidFile::in_dir(dir.path()).write(gone.id()).unwrap();

        let sup = ProcessSupervisor::new("mc1", LaunchSpec::default());
        sup.set_working_directory(dir.path()).unwrap();

        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(!dir.path().join(PID_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn garbage_pid_file_is_treated_as_stale() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(PID_FILE_NAME), "not a pid").unwrap();

        let sup = ProcessSupervisor::new("mc1", LaunchSpec::default());
        sup.set_working_directory(dir.path()).unwrap();

        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(!dir.path().join(PID_FILE_NAME).exists());
    }
}
