// src/engine/dispatch.rs

//! Routes watch events to the builder and the reload pipeline.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn, Instrument};

use crate::engine::Session;
use crate::exec::Builder;
use crate::livereload::ReloadPipeline;
use crate::watch::{WatchEvent, WatchRegistry};

pub struct Dispatcher {
    builder: Arc<Builder>,
    reloader: Arc<ReloadPipeline>,
    build_set: Arc<dyn WatchRegistry>,
    session: Session,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("builder", &self.builder)
            .field("reloader", &self.reloader)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        builder: Arc<Builder>,
        reloader: Arc<ReloadPipeline>,
        build_set: Arc<dyn WatchRegistry>,
        session: Session,
    ) -> Self {
        Self {
            builder,
            reloader,
            build_set,
            session,
        }
    }

    /// Consume both event streams until the session ends or both close.
    pub async fn run(
        self,
        mut build_events: UnboundedReceiver<WatchEvent>,
        mut reload_events: UnboundedReceiver<WatchEvent>,
    ) {
        let span = self.session.span();
        async move {
            loop {
                tokio::select! {
                    biased;
                    _ = self.session.cancelled() => break,
                    Some(event) = build_events.recv() => self.on_build_event(event),
                    Some(event) = reload_events.recv() => self.on_reload_event(event),
                    else => break,
                }
            }
            debug!("dispatch loop stopped");
        }
        .instrument(span)
        .await
    }

    fn on_build_event(&self, event: WatchEvent) {
        if event.is_permission_only() {
            debug!(path = ?event.path, "ignoring permission change");
            return;
        }

        // Handles returned here are detached; the gate tracks completion.
        let _ = self.builder.trigger(event.clone());

        if let Err(err) = self.build_set.rearm(&event.path) {
            debug!(path = ?event.path, error = %format!("{err:#}"), "re-arming watch failed");
        }
    }

    fn on_reload_event(&self, event: WatchEvent) {
        if event.is_permission_only() {
            debug!(path = ?event.path, "ignoring permission change");
            return;
        }
        let _ = self.reloader.trigger(event);
    }
}

/// Log asynchronous watcher errors from both sets until they close.
pub async fn drain_errors(
    session: Session,
    mut build_errors: UnboundedReceiver<notify::Error>,
    mut reload_errors: UnboundedReceiver<notify::Error>,
) {
    let span = session.span();
    async move {
        loop {
            tokio::select! {
                biased;
                _ = session.cancelled() => break,
                Some(err) = build_errors.recv() => {
                    warn!(watch_set = "build", error = %err, "watcher error");
                }
                Some(err) = reload_errors.recv() => {
                    warn!(watch_set = "livereload", error = %err, "watcher error");
                }
                else => break,
            }
        }
    }
    .instrument(span)
    .await
}
