// src/exec/supervisor.rs

//! Process supervisor.
//!
//! Owns the one running instance of the built artifact. Each
//! [`RestartSignal`] kills the current instance, waits for it to go away,
//! then starts the new artifact. Signals are handled one at a time in the
//! order they arrive, so two instances never overlap.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, Instrument};

use crate::config::ConfigFile;
use crate::engine::Session;
use crate::exec::backend::{ChildHandle, ProcessLauncher};
use crate::exec::builder::RestartSignal;
use crate::exec::command::Invocation;

pub struct Supervisor {
    config: Arc<ConfigFile>,
    launcher: Arc<dyn ProcessLauncher>,
    session: Session,
    current: Option<ChildHandle>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        config: Arc<ConfigFile>,
        launcher: Arc<dyn ProcessLauncher>,
        session: Session,
    ) -> Self {
        Self {
            config,
            launcher,
            session,
            current: None,
        }
    }

    /// Handle restart signals until the session ends or every sender is
    /// gone, then stop the running process.
    pub async fn run(mut self, mut restart_rx: mpsc::Receiver<RestartSignal>) {
        let span = self.session.span();
        async move {
            loop {
                tokio::select! {
                    biased;
                    _ = self.session.cancelled() => break,
                    signal = restart_rx.recv() => match signal {
                        Some(signal) => self.restart(signal).await,
                        None => break,
                    },
                }
            }

            if let Some(child) = self.current.take() {
                info!(pid = ?child.pid(), "stopping process on shutdown");
                child.terminate().await;
            }
            debug!("supervisor stopped");
        }
        .instrument(span)
        .await
    }

    async fn restart(&mut self, signal: RestartSignal) {
        if let Some(previous) = self.current.take() {
            info!(pid = ?previous.pid(), outcome = "success", "stopping previous process");
            previous.terminate().await;
        }

        let invocation = Invocation::run(&self.config, &signal.artifact);
        match self.launcher.launch(&invocation) {
            Ok(child) => self.current = Some(child),
            Err(err) => {
                // Nothing runs until the next successful build.
                error!(build = signal.build, error = %format!("{err:#}"), "failed to start process");
            }
        }
    }
}
