// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, Instrument};

use crate::config::ConfigFile;
use crate::errors::{DevloopError, Result};
use crate::exec::{
    BuildBackend, Builder, CommandBuildBackend, CommandLauncher, ErrorLog, ProcessLauncher,
    RestartSignal, Supervisor,
};
use crate::fs::{FileSystem, RealFileSystem};
use crate::livereload::{LivereloadServer, NoopNotifier, ReloadNotifier, ReloadPipeline};
use crate::watch::{TreeScanner, WatchEvent, WatchRegistry, WatchSet, WatchStreams};

use super::dispatch::{drain_errors, Dispatcher};
use super::Session;

/// The two watch sets an orchestrator runs against.
pub struct Watchers {
    pub build_set: Arc<dyn WatchRegistry>,
    pub build_streams: WatchStreams,
    pub reload_set: Arc<dyn WatchRegistry>,
    pub reload_streams: WatchStreams,
}

impl fmt::Debug for Watchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchers").finish_non_exhaustive()
    }
}

/// Top-level wiring of one dev-loop session.
///
/// Owns nothing long-lived itself: [`Orchestrator::run`] hands the pieces
/// to the scanner, the dispatch loops and the supervisor, and returns once
/// the session has ended and those tasks have stopped.
pub struct Orchestrator {
    config: Arc<ConfigFile>,
    session: Session,
    fs: Arc<dyn FileSystem>,
    build_backend: Arc<dyn BuildBackend>,
    launcher: Arc<dyn ProcessLauncher>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("session", &self.session)
            .field("root", &self.config.watch.app_root)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator with the real compiler, launcher and filesystem.
    pub fn new(config: ConfigFile, session: Session) -> Self {
        let build_backend = Arc::new(CommandBuildBackend::new(config.run.stdin.clone()));
        let launcher = Arc::new(CommandLauncher::from_config(&config));
        Self {
            config: Arc::new(config),
            session,
            fs: Arc::new(RealFileSystem),
            build_backend,
            launcher,
        }
    }

    pub fn with_backends(
        mut self,
        build_backend: Arc<dyn BuildBackend>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        self.build_backend = build_backend;
        self.launcher = launcher;
        self
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Create the watch sets (and the livereload server, if active) and run.
    pub async fn run(self) -> Result<()> {
        let mode = self.config.watch.mode;
        let poll = self.config.poll_interval();
        let (build_set, build_streams) = WatchSet::new("build", mode, poll)?;
        let (reload_set, reload_streams) = WatchSet::new("livereload", mode, poll)?;

        let notifier: Arc<dyn ReloadNotifier> = if self.config.livereload_active() {
            LivereloadServer::start(self.config.livereload.port, &self.session).await?
        } else {
            Arc::new(NoopNotifier)
        };

        let watchers = Watchers {
            build_set,
            build_streams,
            reload_set,
            reload_streams,
        };
        self.run_with(watchers, notifier).await
    }

    /// Run against caller-supplied watch sets and notifier.
    ///
    /// Returns [`DevloopError::Aborted`] when the session was torn down by
    /// an unrecoverable condition, `Ok(())` on a plain cancel.
    pub async fn run_with(
        self,
        watchers: Watchers,
        notifier: Arc<dyn ReloadNotifier>,
    ) -> Result<()> {
        let span = self.session.span();
        self.drive(watchers, notifier).instrument(span).await
    }

    async fn drive(self, watchers: Watchers, notifier: Arc<dyn ReloadNotifier>) -> Result<()> {
        let Orchestrator {
            config,
            session,
            fs,
            build_backend,
            launcher,
        } = self;
        let Watchers {
            build_set,
            build_streams,
            reload_set,
            reload_streams,
        } = watchers;

        info!(
            root = ?config.watch.app_root,
            artifact = ?config.artifact_path(),
            debug = config.run.debug,
            livereload = config.livereload_active(),
            "devloop starting"
        );

        let (restart_tx, restart_rx) = mpsc::channel::<RestartSignal>(1);
        let error_log = ErrorLog::new(config.error_log_path(), Arc::clone(&fs));
        let builder = Arc::new(Builder::new(
            Arc::clone(&config),
            session.clone(),
            build_backend,
            error_log,
            restart_tx,
        ));
        let reloader = Arc::new(ReloadPipeline::new(&config, notifier));
        let scanner = Arc::new(TreeScanner::new(
            &config,
            fs,
            Arc::clone(&build_set),
            reload_set,
        ));

        let mut tasks = JoinSet::new();
        tasks.spawn(scanner.run(session.clone()));
        tasks.spawn(drain_errors(
            session.clone(),
            build_streams.errors,
            reload_streams.errors,
        ));

        if config.run.debug {
            info!("debug mode: changes will not trigger rebuilds");
        } else {
            let dispatcher = Dispatcher::new(
                Arc::clone(&builder),
                reloader,
                build_set,
                session.clone(),
            );
            tasks.spawn(dispatcher.run(build_streams.events, reload_streams.events));
        }

        let _ = builder.trigger(WatchEvent::startup());

        Supervisor::new(Arc::clone(&config), launcher, session.clone())
            .run(restart_rx)
            .await;

        session.cancel();
        while tasks.join_next().await.is_some() {}
        debug!("all session tasks stopped");

        match session.abort_reason() {
            Some(reason) => Err(DevloopError::Aborted(reason.to_string())),
            None => {
                info!("devloop stopped");
                Ok(())
            }
        }
    }
}
