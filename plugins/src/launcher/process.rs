use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use batchlint_core::scheduler::{UnitHandle, UnitLauncher, UnitReporter};
use batchlint_core::worker::{Assignment, UnitMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

/// How long a unit may linger after posting its message before it is killed.
pub const DEFAULT_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Runs every batch in its own child process.
///
/// The child gets one JSON [`Assignment`] line on stdin and must answer with
/// one JSON [`UnitMessage`] line on stdout. Terminating a unit kills the
/// child.
pub struct ProcessLauncher {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    exit_grace: Duration,
}

impl ProcessLauncher {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
            exit_grace: DEFAULT_EXIT_GRACE,
        }
    }

    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }
}

impl UnitLauncher for ProcessLauncher {
    fn name(&self) -> &str {
        "process"
    }

    fn launch(
        &self,
        assignment: Assignment,
        reporter: UnitReporter,
    ) -> anyhow::Result<Box<dyn UnitHandle>> {
        let line = serde_json::to_string(&assignment).context("encode assignment")?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "spawn execution unit `{}`",
                    self.program.to_string_lossy()
                )
            })?;

        let stdin = child.stdin.take().context("child stdin not captured")?;
        let stdout = child.stdout.take().context("child stdout not captured")?;

        tracing::debug!(
            task_id = %assignment.task_id,
            pid = child.id(),
            items = assignment.items.len(),
            "spawned execution unit process"
        );

        let monitor = tokio::spawn(monitor(child, stdin, stdout, line, reporter, self.exit_grace));
        Ok(Box::new(ProcessHandle {
            monitor: Some(monitor),
        }))
    }
}

/// Owns the child for its whole life; aborting it drops the child, which kills it.
struct ProcessHandle {
    monitor: Option<JoinHandle<()>>,
}

impl UnitHandle for ProcessHandle {
    fn terminate(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

async fn monitor(
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    line: String,
    reporter: UnitReporter,
    exit_grace: Duration,
) {
    let task_id = reporter.task_id();

    if let Err(e) = send_assignment(&mut stdin, &line).await {
        reporter.error(format!("failed to send assignment: {e}"));
        let _ = child.kill().await;
        return;
    }
    drop(stdin);

    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(l)) if l.trim().is_empty() => continue,
            Ok(Some(l)) => match serde_json::from_str::<UnitMessage>(l.trim()) {
                Ok(message) => {
                    reporter.message(message);
                    break;
                }
                Err(e) => {
                    reporter.error(format!("invalid message from execution unit: {e}"));
                    let _ = child.kill().await;
                    return;
                }
            },
            Ok(None) => break,
            Err(e) => {
                reporter.error(format!("failed to read from execution unit: {e}"));
                let _ = child.kill().await;
                return;
            }
        }
    }

    match tokio::time::timeout(exit_grace, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(%task_id, code = status.code(), "execution unit process exited");
            reporter.exit(status.code());
        }
        Ok(Err(e)) => reporter.error(format!("failed to wait for execution unit: {e}")),
        Err(_) => {
            tracing::warn!(
                %task_id,
                grace_ms = exit_grace.as_millis() as u64,
                "execution unit did not exit after reporting; killing it"
            );
            let _ = child.kill().await;
            reporter.exit(None);
        }
    }
}

async fn send_assignment(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Instant;

    use batchlint_core::error::SchedulerError;
    use batchlint_core::scheduler::{silent_progress, Batch};
    use batchlint_core::{BatchProcessor, BatchResult, RunOptions};

    use super::*;

    fn sh(script: &str) -> Arc<ProcessLauncher> {
        Arc::new(
            ProcessLauncher::new("sh", ["-c", script]).with_exit_grace(Duration::from_secs(2)),
        )
    }

    async fn run_one(
        launcher: Arc<ProcessLauncher>,
        options: RunOptions,
    ) -> Result<Vec<BatchResult>, SchedulerError> {
        BatchProcessor::new()
            .with_progress(silent_progress())
            .run(
                vec![Batch::from(vec!["a.css"])],
                launcher,
                serde_json::json!({}),
                options,
            )
            .await
    }

    /// Launcher whose child records its pid in `pidfile` before running `script`.
    fn sh_with_pidfile(script: &str, pidfile: &Path, grace: Duration) -> Arc<ProcessLauncher> {
        let script = format!(r#"read -r line; echo $$ > "$BATCHLINT_PIDFILE"; {script}"#);
        Arc::new(
            ProcessLauncher::new("sh", ["-c".to_string(), script])
                .with_env("BATCHLINT_PIDFILE", pidfile.as_os_str())
                .with_exit_grace(grace),
        )
    }

    fn read_pid(pidfile: &Path) -> u32 {
        std::fs::read_to_string(pidfile)
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    /// A reaped or zombie process counts as gone.
    fn is_running(pid: u32) -> bool {
        if Path::new("/proc").exists() {
            return match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => !stat
                    .rsplit(')')
                    .next()
                    .unwrap_or_default()
                    .trim_start()
                    .starts_with('Z'),
                Err(_) => false,
            };
        }
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn wait_until_gone(pid: u32) -> bool {
        for _ in 0..40 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn child_reply_is_collected() {
        let launcher = sh(
            r#"read -r line; echo '{"status":"success","items":[{"item_id":"a.css","outcome":1}]}'"#,
        );

        let results = run_one(launcher, RunOptions::new()).await.unwrap();

        assert_eq!(results.len(), 1);
        let items = results[0].items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "a.css");
    }

    #[tokio::test]
    async fn child_receives_the_assignment_on_stdin() {
        let launcher = sh(
            r#"read -r line; case "$line" in *'"a.css"'*) echo '{"status":"success","items":[]}' ;; *) exit 9 ;; esac"#,
        );

        let results = run_one(launcher, RunOptions::new()).await.unwrap();
        assert!(results[0].success());
    }

    #[tokio::test]
    async fn silent_exit_fails_the_batch() {
        let launcher = sh("read -r line; exit 3");

        let results = run_one(launcher, RunOptions::new()).await.unwrap();

        assert!(!results[0].success());
        assert!(results[0].error().unwrap().contains("code 3"));
    }

    #[tokio::test]
    async fn garbage_output_fails_the_batch() {
        let launcher = sh("read -r line; echo 'not json'");

        let results = run_one(launcher, RunOptions::new()).await.unwrap();

        assert!(results[0]
            .error()
            .unwrap()
            .starts_with("invalid message from execution unit"));
    }

    #[tokio::test]
    async fn hung_child_is_killed_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("unit.pid");
        let launcher = sh_with_pidfile("exec sleep 30", &pidfile, Duration::from_secs(2));

        let started = Instant::now();
        let results = run_one(launcher, RunOptions::new().per_task_timeout_ms(500))
            .await
            .unwrap();

        assert!(results[0].is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = read_pid(&pidfile);
        assert!(wait_until_gone(pid).await, "unit {pid} survived its timeout");
    }

    #[tokio::test]
    async fn child_lingering_after_its_reply_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("unit.pid");
        let launcher = sh_with_pidfile(
            r#"echo '{"status":"success","items":[]}'; exec sleep 30"#,
            &pidfile,
            Duration::from_secs(60),
        );

        let results = run_one(launcher, RunOptions::new()).await.unwrap();
        assert!(results[0].success());

        let pid = read_pid(&pidfile);
        assert!(wait_until_gone(pid).await, "unit {pid} still running after the run");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_fault() {
        let launcher = Arc::new(ProcessLauncher::new(
            "/nonexistent/batchlint-worker",
            Vec::<String>::new(),
        ));

        let err = run_one(launcher, RunOptions::new()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Spawn { batch_index: 0, .. }));
    }
}
