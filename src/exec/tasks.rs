// src/exec/tasks.rs

//! Livereload task chains.
//!
//! The configured commands run like a shell pipeline: each task's stdout is
//! connected to the next task's stdin, all tasks are started up front, and
//! the exit status of the first task decides the outcome.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncRead;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::exec::command::{for_each_line, shell_command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// No tasks configured.
    Empty,
    Success,
    /// The first task exited unsuccessfully (`None` when killed by a signal).
    Failed(Option<i32>),
}

/// Start every task of the chain and wait for the first one.
///
/// Fails when a task cannot be started or its output cannot be wired into
/// the next task. Tasks started before such a failure keep running; nothing
/// is rolled back. Tasks after the first are reaped in the background.
pub async fn run_chain(commands: &[String]) -> Result<ChainOutcome> {
    if commands.is_empty() {
        return Ok(ChainOutcome::Empty);
    }

    let last = commands.len() - 1;
    let mut upstream: Option<Stdio> = None;
    let mut started: Vec<(String, Child)> = Vec::with_capacity(commands.len());

    for (idx, line) in commands.iter().enumerate() {
        let mut cmd = shell_command(line);
        cmd.stdin(upstream.take().unwrap_or_else(Stdio::null))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("starting task '{line}'"))?;
        info!(task = %line, pid = ?child.id(), outcome = "success", "task running");

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(line.clone(), stderr));
        }

        let stdout = child
            .stdout
            .take()
            .with_context(|| format!("capturing output of task '{line}'"))?;
        if idx < last {
            let next_stdin: Stdio = stdout
                .try_into()
                .with_context(|| format!("wiring output of task '{line}' into the next task"))?;
            upstream = Some(next_stdin);
        } else {
            tokio::spawn(log_stdout(line.clone(), stdout));
        }

        started.push((line.clone(), child));
    }

    let mut tasks = started.into_iter();
    let Some((head, mut head_child)) = tasks.next() else {
        return Ok(ChainOutcome::Empty);
    };

    let status = head_child
        .wait()
        .await
        .with_context(|| format!("waiting for task '{head}'"))?;

    let rest: Vec<(String, Child)> = tasks.collect();
    if !rest.is_empty() {
        tokio::spawn(reap(rest));
    }

    if status.success() {
        debug!(task = %head, "task chain head finished");
        Ok(ChainOutcome::Success)
    } else {
        Ok(ChainOutcome::Failed(status.code()))
    }
}

async fn reap(tasks: Vec<(String, Child)>) {
    for (line, mut child) in tasks {
        match child.wait().await {
            Ok(status) if status.success() => debug!(task = %line, "task finished"),
            Ok(status) => warn!(task = %line, ?status, "task exited with failure"),
            Err(err) => warn!(task = %line, error = %err, "waiting for task failed"),
        }
    }
}

async fn log_stdout<R: AsyncRead + Unpin>(task: String, reader: R) {
    for_each_line(reader, |line| info!(task = %task, "{}", line)).await;
}

async fn log_stderr<R: AsyncRead + Unpin>(task: String, reader: R) {
    for_each_line(reader, |line| debug!(task = %task, "stderr: {}", line)).await;
}
