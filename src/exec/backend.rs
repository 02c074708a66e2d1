// src/exec/backend.rs

//! Pluggable process backends.
//!
//! The builder and the supervisor talk to these traits instead of
//! `tokio::process` directly, so tests can swap in fakes that record
//! invocations and control when a "process" finishes.
//!
//! - [`BuildBackend`] runs one compiler invocation to completion.
//! - [`ProcessLauncher`] starts the long-running artifact and hands back a
//!   [`ChildHandle`] the supervisor owns exclusively.
//!
//! Production implementations live in [`super::command`].

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::errors::BuildError;
use crate::exec::command::Invocation;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a successful compile reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileReport {
    /// Process id of the compiler, when the backend has one.
    pub pid: Option<u32>,
}

pub trait BuildBackend: Send + Sync {
    /// Run the compiler and wait for it to exit.
    fn compile<'a>(
        &'a self,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<CompileReport, BuildError>>;
}

pub trait ProcessLauncher: Send + Sync {
    /// Start the process without waiting for it.
    fn launch(&self, invocation: &Invocation) -> anyhow::Result<ChildHandle>;
}

/// Owned handle to one supervised process.
///
/// The process is watched by a background task. [`ChildHandle::terminate`]
/// asks that task to kill the process and waits until it is gone. Dropping
/// the handle without terminating also kills the process, without waiting.
pub struct ChildHandle {
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ChildHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildHandle")
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .finish()
    }
}

impl ChildHandle {
    /// Start watching a process.
    ///
    /// `supervise` receives the kill request channel; it must return once
    /// the process has exited or has been killed. The channel also resolves
    /// (with an error) when the handle is dropped.
    pub fn spawn<F, Fut>(pid: Option<u32>, supervise: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (kill, kill_rx) = oneshot::channel();
        let task = tokio::spawn(supervise(kill_rx));
        Self {
            pid,
            kill: Some(kill),
            task,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.task.is_finished()
    }

    /// Kill the process (no grace period) and wait until it is gone.
    pub async fn terminate(mut self) {
        if let Some(kill) = self.kill.take() {
            // Err means the watcher task already finished.
            let _ = kill.send(());
        }
        if let Err(err) = self.task.await {
            warn!(pid = ?self.pid, error = %err, "process watcher task failed");
        }
    }
}
