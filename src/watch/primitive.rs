// src/watch/primitive.rs

//! Watch sets on top of `notify`.
//!
//! A watch set is a collection of individually registered paths. Changes
//! and asynchronous watcher errors come out of two separate channels
//! ([`WatchStreams`]). The native event backend and the polling backend are
//! interchangeable behind [`WatchSet::new`]; the rest of the crate only sees
//! the [`WatchRegistry`] trait and the streams.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::types::WatchMode;

/// Path used by the synthetic event that forces the initial build.
pub const START_SENTINEL: &str = ":start:";

/// Kind of change reported for a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Rename,
    Remove,
    /// Metadata-only change (chmod and friends).
    Permission,
}

impl ChangeKind {
    /// Map a `notify` event kind; pure access events yield `None`.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(ChangeKind::Create),
            EventKind::Remove(_) => Some(ChangeKind::Remove),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeKind::Permission),
            EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Write),
        }
    }
}

/// A single change on a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// The synthetic event used once at startup to force a build.
    pub fn startup() -> Self {
        Self::new(START_SENTINEL, ChangeKind::Write)
    }

    pub fn is_startup(&self) -> bool {
        self.path.as_os_str() == START_SENTINEL
    }

    pub fn is_permission_only(&self) -> bool {
        self.kind == ChangeKind::Permission
    }
}

/// Registration side of a watch set.
pub trait WatchRegistry: Send + Sync {
    /// Start watching `path`. Returns `false` if it was already watched.
    fn add(&self, path: &Path) -> Result<bool>;

    /// Stop watching `path`. Unknown paths are ignored.
    fn remove(&self, path: &Path) -> Result<()>;

    fn contains(&self, path: &Path) -> bool;

    /// Drop and re-register `path`.
    ///
    /// Editors that save through a rename leave a per-file watch pointing at
    /// the old inode; re-adding picks up the new one.
    fn rearm(&self, path: &Path) -> Result<()> {
        self.remove(path)?;
        self.add(path).map(|_| ())
    }
}

/// Receiving side of a watch set.
#[derive(Debug)]
pub struct WatchStreams {
    pub events: mpsc::UnboundedReceiver<WatchEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

/// A `notify`-backed watch set.
///
/// Dropping it stops watching.
pub struct WatchSet {
    name: &'static str,
    watcher: Mutex<Box<dyn Watcher + Send>>,
    watched: Mutex<HashSet<PathBuf>>,
}

impl fmt::Debug for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSet")
            .field("name", &self.name)
            .field("watched", &self.len())
            .finish()
    }
}

impl WatchSet {
    pub fn new(
        name: &'static str,
        mode: WatchMode,
        poll_interval: Duration,
    ) -> Result<(Arc<Self>, WatchStreams)> {
        let (event_tx, events) = mpsc::unbounded_channel::<WatchEvent>();
        let (error_tx, errors) = mpsc::unbounded_channel::<notify::Error>();

        // Called synchronously on notify's own thread.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = ChangeKind::from_notify(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    // Receiver gone means the orchestrator is shutting down.
                    let _ = event_tx.send(WatchEvent::new(path, kind));
                }
            }
            Err(err) => {
                let _ = error_tx.send(err);
            }
        };

        let watcher: Box<dyn Watcher + Send> = match mode {
            WatchMode::Event => Box::new(
                RecommendedWatcher::new(handler, Config::default())
                    .with_context(|| format!("creating {name} watcher"))?,
            ),
            WatchMode::Polling => Box::new(
                PollWatcher::new(handler, Config::default().with_poll_interval(poll_interval))
                    .with_context(|| format!("creating {name} polling watcher"))?,
            ),
        };

        info!(watch_set = name, ?mode, "watch set created");

        let set = Arc::new(Self {
            name,
            watcher: Mutex::new(watcher),
            watched: Mutex::new(HashSet::new()),
        });
        Ok((set, WatchStreams { events, errors }))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.watched.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WatchRegistry for WatchSet {
    fn add(&self, path: &Path) -> Result<bool> {
        let mut watched = self
            .watched
            .lock()
            .map_err(|_| anyhow!("{} watch set lock poisoned", self.name))?;
        if watched.contains(path) {
            return Ok(false);
        }

        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watcher
            .lock()
            .map_err(|_| anyhow!("{} watcher lock poisoned", self.name))?
            .watch(path, mode)
            .with_context(|| format!("watching {:?}", path))?;

        debug!(watch_set = self.name, ?path, "watching path");
        watched.insert(path.to_path_buf());
        Ok(true)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut watched = self
            .watched
            .lock()
            .map_err(|_| anyhow!("{} watch set lock poisoned", self.name))?;
        if !watched.remove(path) {
            return Ok(());
        }

        if let Err(err) = self
            .watcher
            .lock()
            .map_err(|_| anyhow!("{} watcher lock poisoned", self.name))?
            .unwatch(path)
        {
            // The backend usually drops watches of deleted files on its own.
            debug!(watch_set = self.name, ?path, error = %err, "unwatch failed");
        }
        Ok(())
    }

    fn contains(&self, path: &Path) -> bool {
        self.watched
            .lock()
            .map(|w| w.contains(path))
            .unwrap_or(false)
    }
}
