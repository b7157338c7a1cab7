//! Dev process supervision.
//!
//! Runs a long-lived development server, reports readiness once the
//! configured pattern appears on stdout or stderr, and on cancellation walks
//! the shutdown ladder: configured signal, bounded wait, SIGKILL.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::providers::{ShutdownPolicy, ShutdownSignal};

/// Specification of a supervised dev process.
#[derive(Debug, Clone)]
pub struct DevProcessSpec {
    /// Label used in log output.
    pub name: String,
    /// Shell command line, run via `sh -c`.
    pub command: String,
    pub workdir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub ready_pattern: Option<String>,
    pub shutdown: ShutdownPolicy,
}

/// Run the process until it exits or the token is cancelled.
///
/// `ready` fires once: when the ready pattern matches a line, or immediately
/// after spawn when no pattern is configured. Cancellation is a normal stop
/// and returns Ok; a spontaneous non-zero exit is an error.
pub async fn run_dev_process(
    cancel: CancellationToken,
    spec: DevProcessSpec,
    ready: Option<oneshot::Sender<()>>,
) -> Result<()> {
    let pattern = spec
        .ready_pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .with_context(|| format!("Invalid ready pattern for {}", spec.name))?;

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&spec.command)
        .current_dir(&spec.workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to start dev process {}: {}", spec.name, spec.command))?;

    let pid = child
        .id()
        .with_context(|| format!("Dev process {} exited before supervision began", spec.name))?;

    let ready = Arc::new(Mutex::new(ready));
    if pattern.is_none() {
        fire_ready(&ready, &spec.name);
    }

    let stdout_task = spawn_line_reader(
        child.stdout.take(),
        spec.name.clone(),
        pattern.clone(),
        Arc::clone(&ready),
    );
    let stderr_task = spawn_line_reader(
        child.stderr.take(),
        spec.name.clone(),
        pattern,
        Arc::clone(&ready),
    );

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            shutdown(&mut child, pid, &spec.name, spec.shutdown).await;
            Ok(())
        }
        status = child.wait() => {
            let status = status
                .with_context(|| format!("Failed to wait for dev process {}", spec.name))?;
            if status.success() {
                info!("Dev process {} exited cleanly", spec.name);
                Ok(())
            } else {
                anyhow::bail!(
                    "Dev process {} exited with status {}",
                    spec.name,
                    status.code().unwrap_or(-1)
                )
            }
        }
    };

    stdout_task.abort();
    stderr_task.abort();
    result
}

/// Signal, bounded wait, then SIGKILL.
async fn shutdown(
    child: &mut tokio::process::Child,
    pid: u32,
    name: &str,
    policy: ShutdownPolicy,
) {
    info!(
        "Stopping dev process {} with {} (timeout {:?})",
        name,
        policy.signal.as_str(),
        policy.timeout
    );
    deliver_signal(pid, policy.signal);

    match tokio::time::timeout(policy.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("Dev process {} stopped: {}", name, status);
        }
        Ok(Err(e)) => {
            warn!("Failed waiting for dev process {}: {}", name, e);
        }
        Err(_) => {
            warn!(
                "Dev process {} ignored {} for {:?}, sending SIGKILL",
                name,
                policy.signal.as_str(),
                policy.timeout
            );
            child.kill().await.ok();
        }
    }
}

fn deliver_signal(pid: u32, signal: ShutdownSignal) {
    let sig = match signal {
        ShutdownSignal::Sigint => libc::SIGINT,
        ShutdownSignal::Sigterm => libc::SIGTERM,
    };
    // Best effort: the process may already have exited.
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

fn fire_ready(ready: &Arc<Mutex<Option<oneshot::Sender<()>>>>, name: &str) {
    if let Some(tx) = ready.lock().expect("ready sender lock poisoned").take() {
        debug!("Dev process {} is ready", name);
        tx.send(()).ok();
    }
}

fn spawn_line_reader<R: AsyncRead + Unpin + Send + 'static>(
    stream: Option<R>,
    name: String,
    pattern: Option<Regex>,
    ready: Arc<Mutex<Option<oneshot::Sender<()>>>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Some(stream) = stream else { return };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!("[{}] {}", name, line);
            if let Some(re) = &pattern {
                if re.is_match(&line) {
                    fire_ready(&ready, &name);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(command: &str, ready_pattern: Option<&str>) -> DevProcessSpec {
        DevProcessSpec {
            name: "api".to_string(),
            command: command.to_string(),
            workdir: std::env::temp_dir(),
            env: BTreeMap::new(),
            ready_pattern: ready_pattern.map(|s| s.to_string()),
            shutdown: ShutdownPolicy {
                signal: ShutdownSignal::Sigterm,
                timeout: Duration::from_secs(2),
            },
        }
    }

    #[tokio::test]
    async fn test_ready_fires_on_pattern_match() {
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();

        let handle = tokio::spawn(run_dev_process(
            cancel.clone(),
            spec("echo 'listening on :3000'; sleep 5", Some("listening on")),
            Some(tx),
        ));

        tokio::time::timeout(Duration::from_secs(3), rx)
            .await
            .expect("ready signal before timeout")
            .expect("ready sender fired");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ready_fires_immediately_without_pattern() {
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();

        let handle = tokio::spawn(run_dev_process(
            cancel.clone(),
            spec("sleep 5", None),
            Some(tx),
        ));

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("ready signal before timeout")
            .expect("ready sender fired");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_process() {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_dev_process(cancel.clone(), spec("sleep 30", None), None));

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("supervisor returns promptly after cancel")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let cancel = CancellationToken::new();
        let result = run_dev_process(cancel, spec("exit 7", None), None).await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("status 7"));
    }

    #[tokio::test]
    async fn test_invalid_ready_pattern_is_rejected() {
        let cancel = CancellationToken::new();
        let result = run_dev_process(cancel, spec("true", Some("[unclosed")), None).await;
        assert!(result.is_err());
    }
}
