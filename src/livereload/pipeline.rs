// src/livereload/pipeline.rs

//! Reload pipeline: task chain, then a push notification.
//!
//! Cycles go through their own [`Gate`], independent of the build gate, so
//! an asset change reloads browsers even while a build is running.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::config::ConfigFile;
use crate::engine::Gate;
use crate::exec::tasks::{run_chain, ChainOutcome};
use crate::watch::path_utils::display_relative;
use crate::watch::WatchEvent;

/// Push side of livereload: tells connected clients to reload `path`.
pub trait ReloadNotifier: Send + Sync {
    fn notify_reload(&self, path: &str);
}

/// Used when livereload is inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn notify_reload(&self, path: &str) {
        debug!(path, "livereload inactive; reload not pushed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Clients were told to reload `path`.
    Notified { path: String, chain: ChainOutcome },
    /// A task could not be started or wired; nothing was pushed.
    Aborted,
}

pub struct ReloadPipeline {
    root: PathBuf,
    tasks: Vec<String>,
    gate: Arc<Gate>,
    notifier: Arc<dyn ReloadNotifier>,
    span: Span,
}

impl std::fmt::Debug for ReloadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadPipeline")
            .field("root", &self.root)
            .field("tasks", &self.tasks)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl ReloadPipeline {
    pub fn new(config: &ConfigFile, notifier: Arc<dyn ReloadNotifier>) -> Self {
        Self {
            root: config.watch.app_root.clone(),
            tasks: config.livereload.tasks.clone(),
            gate: Gate::new("livereload"),
            notifier,
            span: Span::current(),
        }
    }

    pub fn gate(&self) -> &Arc<Gate> {
        &self.gate
    }

    /// Start a reload cycle for `event` unless one is already running.
    pub fn trigger(self: &Arc<Self>, event: WatchEvent) -> Option<JoinHandle<ReloadOutcome>> {
        let Some(permit) = self.gate.try_enter() else {
            debug!(path = ?event.path, "reload in progress; dropping event");
            return None;
        };

        let this = Arc::clone(self);
        let span = self.span.clone();
        Some(tokio::spawn(
            async move {
                let _permit = permit;
                this.cycle(&event).await
            }
            .instrument(span),
        ))
    }

    async fn cycle(&self, event: &WatchEvent) -> ReloadOutcome {
        let chain = match run_chain(&self.tasks).await {
            Ok(ChainOutcome::Failed(code)) => {
                warn!(exit_code = ?code, "livereload task chain failed; reloading anyway");
                ChainOutcome::Failed(code)
            }
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %format!("{err:#}"), "livereload task chain aborted");
                return ReloadOutcome::Aborted;
            }
        };

        let path = display_relative(&self.root, &event.path);
        info!(path = %path, "pushing reload");
        self.notifier.notify_reload(&path);
        ReloadOutcome::Notified { path, chain }
    }
}
