// src/exec/command.rs

//! Process invocations and their production backends.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::errors::BuildError;
use crate::exec::backend::{BoxFuture, BuildBackend, ChildHandle, CompileReport, ProcessLauncher};
use crate::types::StreamTarget;

/// A fully resolved external command: program, arguments and the
/// configured environment. Configured variables only fill gaps: a name
/// already present in the inherited environment keeps its inherited value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// `command args... flags... -o <artifact> <target>`
    pub fn build(config: &ConfigFile) -> Self {
        let mut args = config.build.args.clone();
        args.extend(config.build.flags.iter().cloned());
        args.push("-o".to_string());
        args.push(path_arg(&config.artifact_path()));
        args.push(path_arg(&config.build.target));
        Self {
            program: config.build.command.clone(),
            args,
            env: env_overlay(config),
        }
    }

    /// `<artifact> flags...`, or under debug mode
    /// `<debugger> debugger_args... <artifact> [-- flags...]`.
    pub fn run(config: &ConfigFile, artifact: &Path) -> Self {
        let (program, args) = if config.run.debug {
            let mut args = config.run.debugger_args.clone();
            args.push(path_arg(artifact));
            if !config.run.flags.is_empty() {
                args.push("--".to_string());
                args.extend(config.run.flags.iter().cloned());
            }
            (config.run.debugger.clone(), args)
        } else {
            (path_arg(artifact), config.run.flags.clone())
        };
        Self {
            program,
            args,
            env: env_overlay(config),
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            if std::env::var_os(key).is_none() {
                cmd.env(key, value);
            }
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn env_overlay(config: &ConfigFile) -> Vec<(String, String)> {
    config
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build a shell command appropriate for the platform.
pub fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

/// Runs the compiler as a real process.
#[derive(Debug, Clone, Default)]
pub struct CommandBuildBackend {
    stdin: StreamTarget,
}

impl CommandBuildBackend {
    pub fn new(stdin: StreamTarget) -> Self {
        Self { stdin }
    }
}

impl BuildBackend for CommandBuildBackend {
    fn compile<'a>(
        &'a self,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, std::result::Result<CompileReport, BuildError>> {
        Box::pin(async move {
            let spawn_failed = |source| BuildError::Spawn {
                source,
                stderr: String::new(),
            };

            let mut cmd = invocation.command();
            cmd.stdin(self.stdin.input().map_err(spawn_failed)?)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd.spawn().map_err(spawn_failed)?;
            let pid = child.id();

            let stdout = child.stdout.take().map(|out| tokio::spawn(log_output(out)));
            let stderr = child.stderr.take().map(|err| tokio::spawn(capture_output(err)));

            let status = child.wait().await;

            if let Some(task) = stdout {
                let _ = task.await;
            }
            let captured = match stderr {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };

            let status = status.map_err(|source| BuildError::Spawn {
                source,
                stderr: captured.clone(),
            })?;

            if status.success() {
                Ok(CompileReport { pid })
            } else {
                Err(BuildError::Exit {
                    code: status.code(),
                    stderr: captured,
                })
            }
        })
    }
}

async fn log_output<R: AsyncRead + Unpin>(reader: R) {
    for_each_line(reader, |line| debug!(target: "devloop::build", "{}", line)).await;
}

async fn capture_output<R: AsyncRead + Unpin>(reader: R) -> String {
    let mut captured = String::new();
    for_each_line(reader, |line| {
        debug!(target: "devloop::build", "{}", line);
        captured.push_str(line);
        captured.push('\n');
    })
    .await;
    captured
}

/// Read a child's pipe to EOF, one line at a time.
///
/// Lines that are not valid UTF-8 are decoded lossily; the pipe is never
/// dropped early, so the child cannot be killed by a broken pipe.
pub(crate) async fn for_each_line<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']));
            }
            Err(err) => {
                debug!(error = %err, "reading process output failed");
                break;
            }
        }
    }
}

/// Starts the built artifact as a real process.
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher {
    stdin: StreamTarget,
    stdout: StreamTarget,
    stderr: StreamTarget,
}

impl CommandLauncher {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            stdin: config.run.stdin.clone(),
            stdout: config.run.stdout.clone(),
            stderr: config.run.stderr.clone(),
        }
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<ChildHandle> {
        let mut cmd = invocation.command();
        cmd.stdin(self.stdin.input().context("opening stdin target")?)
            .stdout(self.stdout.output().context("opening stdout target")?)
            .stderr(self.stderr.output().context("opening stderr target")?)
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("starting '{invocation}'"))?;
        let pid = child.id();

        info!(pid = ?pid, command = %invocation, outcome = "success", "main running");

        Ok(ChildHandle::spawn(pid, move |kill| async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => info!(pid = ?pid, "process exited"),
                    Ok(status) => error!(pid = ?pid, ?status, "process exited with failure"),
                    Err(err) => error!(pid = ?pid, error = %err, "waiting for process failed"),
                },
                _ = kill => {
                    if let Err(err) = child.kill().await {
                        warn!(pid = ?pid, error = %err, "failed to kill process");
                    }
                }
            }
        }))
    }
}
