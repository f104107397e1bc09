//! Subprocess execution bound to a cancellation scope
//!
//! Every provider call runs one child process. The child is owned by the
//! call: when the batch token fires or the deadline passes it is killed and
//! reaped before the call returns, and `kill_on_drop` covers the case where
//! the calling future itself is dropped.

use crate::config::PAYLOAD_PLACEHOLDER;
use smsguard_core::{Error, Result};
use smsguard_telemetry::MetricsCollector;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Program and argument template for a provider
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Create a new command template
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments for one call
    ///
    /// Each `{payload}` is replaced in place. Without a placeholder the payload
    /// is appended as the final argument.
    pub fn render(&self, payload: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(PAYLOAD_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(PAYLOAD_PLACEHOLDER, payload)
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push(payload.to_string());
        }
        args
    }
}

/// Runs provider commands and tracks their process lifecycle
#[derive(Clone, Default)]
pub struct ProcessRunner {
    metrics: Option<MetricsCollector>,
}

enum Settled {
    Exited(std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>),
    Cancelled,
    TimedOut,
}

impl ProcessRunner {
    /// Create a new runner
    pub fn new() -> Self {
        Self { metrics: None }
    }

    /// Record spawned and killed processes in `metrics`
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run `command` with `payload` and return its stdout
    ///
    /// Fails with `ProviderSpawn` when the program cannot start and with
    /// `ProviderProcess` (carrying stderr) on a non-zero exit. A fired token
    /// kills the child and yields `Cancelled`; no process is started when the
    /// token has already fired.
    pub async fn run(
        &self,
        provider: &str,
        command: &CommandTemplate,
        payload: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(command.render(payload))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so scripts and anything they start are killed together
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| Error::spawn(provider, e))?;
        let pid = child.id();

        if let Some(metrics) = &self.metrics {
            metrics.record_process_spawned();
        }
        debug!("Spawned provider {} (pid {:?})", provider, pid);

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("child stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::internal("child stderr was not captured"))?;

        let settled = tokio::select! {
            biased;
            _ = cancel.cancelled() => Settled::Cancelled,
            _ = deadline(timeout) => Settled::TimedOut,
            result = collect(&mut child, &mut stdout, &mut stderr) => Settled::Exited(result),
        };

        match settled {
            Settled::Exited(result) => {
                let (status, out, err) = result.map_err(|e| Error::provider_io(provider, e))?;
                if !status.success() {
                    let stderr = String::from_utf8_lossy(&err).trim().to_string();
                    return Err(Error::process(provider, status.code(), stderr));
                }
                Ok(String::from_utf8_lossy(&out).into_owned())
            }
            Settled::Cancelled => {
                self.terminate(provider, pid, &mut child).await;
                Err(Error::Cancelled)
            }
            Settled::TimedOut => {
                self.terminate(provider, pid, &mut child).await;
                Err(Error::ProviderTimeout {
                    provider: provider.to_string(),
                    timeout: timeout.unwrap_or_default(),
                })
            }
        }
    }

    async fn terminate(&self, provider: &str, pid: Option<u32>, child: &mut Child) {
        let running = matches!(child.try_wait(), Ok(None));
        kill_group(pid);

        if running {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill provider {}: {}", provider, e);
            }
        }
        if let Err(e) = child.wait().await {
            warn!("Failed to reap provider {}: {}", provider, e);
        }

        if !running {
            debug!("Provider {} had already exited", provider);
            return;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_process_killed();
        }
        debug!("Killed provider {}", provider);
    }
}

/// SIGKILL the process group led by `pid`
///
/// The group outlives its leader while descendants remain, so this runs
/// whether or not the direct child is still alive.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // ESRCH just means the group is already gone
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

async fn collect(
    child: &mut Child,
    stdout: &mut ChildStdout,
    stderr: &mut ChildStderr,
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let (status, _, _) = tokio::try_join!(
        child.wait(),
        stdout.read_to_end(&mut out),
        stderr.read_to_end(&mut err)
    )?;
    Ok((status, out, err))
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholder() {
        let command = CommandTemplate::new(
            "python3",
            vec!["gemini_api.py".to_string(), "--text={payload}".to_string()],
        );
        assert_eq!(
            command.render("Win \"big\" now"),
            vec!["gemini_api.py", "--text=Win \"big\" now"]
        );
    }

    #[test]
    fn test_render_appends_without_placeholder() {
        let command = CommandTemplate::new("python3", vec!["url_scanner_api.py".to_string()]);
        assert_eq!(
            command.render("http://x.biz"),
            vec!["url_scanner_api.py", "http://x.biz"]
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::time::Instant;

        fn sh(script: &str) -> CommandTemplate {
            CommandTemplate::new(
                "sh",
                vec![
                    "-c".to_string(),
                    script.to_string(),
                    "sh".to_string(),
                    PAYLOAD_PLACEHOLDER.to_string(),
                ],
            )
        }

        #[tokio::test]
        async fn test_captures_stdout() {
            let runner = ProcessRunner::new();
            let out = runner
                .run("echo", &sh("echo \"$1\""), "73.5", None, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(out.trim(), "73.5");
        }

        #[tokio::test]
        async fn test_non_zero_exit_carries_stderr() {
            let runner = ProcessRunner::new();
            let err = runner
                .run("broken", &sh("echo boom >&2; exit 3"), "x", None, &CancellationToken::new())
                .await
                .unwrap_err();

            match err {
                Error::ProviderProcess { provider, code, stderr } => {
                    assert_eq!(provider, "broken");
                    assert_eq!(code, Some(3));
                    assert_eq!(stderr, "boom");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_missing_program_is_spawn_error() {
            let runner = ProcessRunner::new();
            let command = CommandTemplate::new("/nonexistent/smsguard-provider", Vec::new());
            let err = runner
                .run("ghost", &command, "x", None, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ProviderSpawn { .. }));
        }

        #[tokio::test]
        async fn test_cancel_kills_running_child() {
            let metrics = MetricsCollector::new();
            let runner = ProcessRunner::new().with_metrics(metrics.clone());
            let cancel = CancellationToken::new();

            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let start = Instant::now();
            let err = runner
                .run("sleeper", &sh("sleep 30"), "x", None, &cancel)
                .await
                .unwrap_err();

            assert!(err.is_cancelled());
            assert!(start.elapsed() < Duration::from_secs(10));

            let snapshot = metrics.snapshot();
            assert_eq!(snapshot.processes_spawned, 1);
            assert_eq!(snapshot.processes_killed, 1);
        }

        #[tokio::test]
        async fn test_fired_token_spawns_nothing() {
            let metrics = MetricsCollector::new();
            let runner = ProcessRunner::new().with_metrics(metrics.clone());
            let cancel = CancellationToken::new();
            cancel.cancel();

            let err = runner
                .run("late", &sh("echo 1"), "x", None, &cancel)
                .await
                .unwrap_err();

            assert!(err.is_cancelled());
            assert_eq!(metrics.snapshot().processes_spawned, 0);
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn test_cancel_kills_grandchildren() {
            let dir = tempfile::tempdir().unwrap();
            let pid_file = dir.path().join("grandchild.pid");
            let cancel = CancellationToken::new();

            let trigger = cancel.clone();
            let watched = pid_file.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    if watched.exists() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                trigger.cancel();
            });

            let err = ProcessRunner::new()
                .run(
                    "spawner",
                    &sh("sleep 30 & echo $! > \"$1\"; wait"),
                    pid_file.to_str().unwrap(),
                    None,
                    &cancel,
                )
                .await
                .unwrap_err();
            assert!(err.is_cancelled());

            let pid = std::fs::read_to_string(&pid_file).unwrap();
            let stat = format!("/proc/{}/stat", pid.trim());
            let mut gone = false;
            for _ in 0..100 {
                match std::fs::read_to_string(&stat) {
                    Err(_) => gone = true,
                    Ok(line) => gone = line.split_whitespace().nth(2) == Some("Z"),
                }
                if gone {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            assert!(gone, "grandchild {} survived cancellation", pid.trim());
        }

        #[tokio::test]
        async fn test_exited_child_not_counted_as_killed() {
            let metrics = MetricsCollector::new();
            let runner = ProcessRunner::new().with_metrics(metrics.clone());

            let mut child = Command::new("sh")
                .args(["-c", "exit 0"])
                .spawn()
                .unwrap();
            let pid = child.id();
            tokio::time::sleep(Duration::from_millis(200)).await;

            runner.terminate("done", pid, &mut child).await;
            assert_eq!(metrics.snapshot().processes_killed, 0);

            let mut child = Command::new("sh")
                .args(["-c", "sleep 30"])
                .process_group(0)
                .spawn()
                .unwrap();
            let pid = child.id();
            runner.terminate("sleeper", pid, &mut child).await;
            assert_eq!(metrics.snapshot().processes_killed, 1);
        }

        #[tokio::test]
        async fn test_timeout_kills_child() {
            let runner = ProcessRunner::new();
            let err = runner
                .run(
                    "slow",
                    &sh("sleep 30"),
                    "x",
                    Some(Duration::from_millis(100)),
                    &CancellationToken::new(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ProviderTimeout { .. }));
        }
    }
}
