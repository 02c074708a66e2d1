// src/exec/builder.rs

//! Debounced builder.
//!
//! Every build goes through the build [`Gate`]: a trigger that arrives while
//! a build is running is dropped, so the next build always compiles the
//! latest state of the tree instead of working off a backlog.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::ConfigFile;
use crate::engine::{Gate, Session};
use crate::exec::backend::BuildBackend;
use crate::exec::command::Invocation;
use crate::fs::FileSystem;
use crate::watch::WatchEvent;

/// Handed from a successful build to the supervisor.
///
/// Sent over a single-slot channel, so the supervisor sees builds in the
/// order they completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSignal {
    /// Sequence number of the build that produced the artifact.
    pub build: u64,
    pub artifact: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded { build: u64 },
    Failed { build: u64 },
    /// The failure was unrecoverable and the session has been aborted.
    Fatal { build: u64 },
    /// The session ended before the build could start.
    Skipped,
}

/// The persisted text of the last failed build.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the log with `text`.
    pub fn record(&self, text: &str) {
        if let Err(err) = self.fs.write(&self.path, text.as_bytes()) {
            warn!(path = ?self.path, error = %err, "failed to write error log");
        }
    }

    pub fn clear(&self) {
        if !self.fs.exists(&self.path) {
            return;
        }
        if let Err(err) = self.fs.remove_file(&self.path) {
            warn!(path = ?self.path, error = %err, "failed to remove error log");
        }
    }
}

pub struct Builder {
    config: Arc<ConfigFile>,
    session: Session,
    gate: Arc<Gate>,
    backend: Arc<dyn BuildBackend>,
    error_log: ErrorLog,
    restart_tx: mpsc::Sender<RestartSignal>,
    builds: AtomicU64,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("gate", &self.gate)
            .field("error_log", &self.error_log.path)
            .field("builds", &self.builds.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Builder {
    pub fn new(
        config: Arc<ConfigFile>,
        session: Session,
        backend: Arc<dyn BuildBackend>,
        error_log: ErrorLog,
        restart_tx: mpsc::Sender<RestartSignal>,
    ) -> Self {
        Self {
            config,
            session,
            gate: Gate::new("build"),
            backend,
            error_log,
            restart_tx,
            builds: AtomicU64::new(0),
        }
    }

    pub fn gate(&self) -> &Arc<Gate> {
        &self.gate
    }

    /// Number of builds started so far.
    pub fn builds_started(&self) -> u64 {
        self.builds.load(Ordering::Acquire)
    }

    /// Start a build for `event` unless one is already running.
    ///
    /// Returns `None` when the event was dropped (gate closed or session
    /// over). The build runs on its own task; the gate reopens when it ends,
    /// however it ends.
    pub fn trigger(self: &Arc<Self>, event: WatchEvent) -> Option<JoinHandle<BuildOutcome>> {
        if self.session.is_cancelled() {
            return None;
        }
        let Some(permit) = self.gate.try_enter() else {
            debug!(path = ?event.path, "build in progress; dropping event");
            return None;
        };

        let this = Arc::clone(self);
        let span = self.session.span();
        Some(tokio::spawn(
            async move {
                let _permit = permit;
                this.build(&event).await
            }
            .instrument(span),
        ))
    }

    async fn build(&self, event: &WatchEvent) -> BuildOutcome {
        if self.session.is_cancelled() {
            return BuildOutcome::Skipped;
        }

        let build = self.builds.fetch_add(1, Ordering::AcqRel) + 1;
        let started = Instant::now();
        if event.is_startup() {
            info!(build, "initial build");
        } else {
            info!(build, path = %event.path.display(), "rebuild on change");
        }

        let invocation = Invocation::build(&self.config);
        debug!(build, command = %invocation, "invoking compiler");

        match self.backend.compile(&invocation).await {
            Ok(report) => {
                self.error_log.clear();
                info!(
                    build,
                    pid = ?report.pid,
                    elapsed = ?started.elapsed(),
                    outcome = "success",
                    "build completed"
                );

                let signal = RestartSignal {
                    build,
                    artifact: self.config.artifact_path(),
                };
                tokio::select! {
                    biased;
                    _ = self.session.cancelled() => {
                        debug!(build, "session ended before restart");
                    }
                    sent = self.restart_tx.send(signal) => {
                        if sent.is_err() {
                            debug!(build, "supervisor gone; restart not delivered");
                        }
                    }
                }
                BuildOutcome::Succeeded { build }
            }
            Err(err) => {
                if err.is_unrecoverable(&self.config.build.fatal_markers) {
                    self.session.abort(format!("build {build} failed: {err}"));
                    return BuildOutcome::Fatal { build };
                }

                self.error_log.record(&err.to_string());
                error!(build, error = %err, "build failed");
                BuildOutcome::Failed { build }
            }
        }
    }
}
