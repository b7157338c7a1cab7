//! Abstract command execution.
//!
//! Providers and commands never spawn processes directly against a host;
//! they go through a [`Commander`] so remote execution and tests can swap
//! the implementation. The local implementation shells out with
//! tokio::process and honors cancellation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// A command to run on a host.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Rendered command line for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Executes commands on a local or remote host.
#[async_trait]
pub trait Commander: Send + Sync {
    async fn run(&self, cancel: &CancellationToken, spec: CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands on the local machine.
#[derive(Debug, Default)]
pub struct LocalCommander;

#[async_trait]
impl Commander for LocalCommander {
    async fn run(&self, cancel: &CancellationToken, spec: CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn: {}", spec.display()))?;

        // Drain the pipes concurrently so a chatty command never blocks on a
        // full pipe buffer while we wait on its exit status.
        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        tokio::select! {
            _ = cancel.cancelled() => {
                child.kill().await.ok();
                bail!("Command cancelled: {}", spec.display());
            }
            result = child.wait() => {
                let status = result
                    .with_context(|| format!("Failed to wait for: {}", spec.display()))?;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(CommandOutput {
                    status: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                })
            }
        }
    }
}

async fn drain<R: tokio::io::AsyncRead + Unpin>(reader: Option<R>) -> String {
    use tokio::io::AsyncReadExt;

    let mut buf = String::new();
    if let Some(mut reader) = reader {
        reader.read_to_string(&mut buf).await.ok();
    }
    buf
}

/// Scripted commander for tests: records every invocation and replays
/// configured outputs.
#[cfg(test)]
#[derive(Debug)]
pub struct FakeCommander {
    pub calls: std::sync::Mutex<Vec<CommandSpec>>,
    pub outputs: std::sync::Mutex<Vec<CommandOutput>>,
}

#[cfg(test)]
impl FakeCommander {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            outputs: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn push_output(&self, status: i32, stdout: &str) {
        self.outputs.lock().unwrap().push(CommandOutput {
            status,
            stdout: stdout.to_string(),
            stderr: String::new(),
        });
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Commander for FakeCommander {
    async fn run(&self, _cancel: &CancellationToken, spec: CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec);
        let mut outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            Ok(CommandOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        } else {
            Ok(outputs.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("docker")
            .args(["compose", "up", "-d"])
            .workdir("/tmp");
        assert_eq!(spec.display(), "docker compose up -d");
    }

    #[tokio::test]
    async fn test_local_commander_captures_output() {
        let commander = LocalCommander;
        let cancel = CancellationToken::new();
        let output = commander
            .run(&cancel, CommandSpec::new("echo").arg("hello"))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_local_commander_reports_failure_status() {
        let commander = LocalCommander;
        let cancel = CancellationToken::new();
        let output = commander
            .run(&cancel, CommandSpec::new("sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.status, 3);
    }

    #[tokio::test]
    async fn test_fake_commander_records_calls() {
        let fake = FakeCommander::new();
        let cancel = CancellationToken::new();
        fake.push_output(0, "v1.0.0");

        let out = fake
            .run(&cancel, CommandSpec::new("tool").arg("--version"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "v1.0.0");
        assert_eq!(fake.call_count(), 1);
    }
}
