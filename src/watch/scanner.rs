// src/watch/scanner.rs

//! Periodic tree scanner.
//!
//! Native watchers do not pick up files in directories created after the
//! watch was set up, so the scanner walks the root once per interval and
//! registers every matching file with the build watch set. Registration is
//! idempotent; stale paths are never removed here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

use crate::config::ConfigFile;
use crate::engine::Session;
use crate::fs::{EntryKind, FileSystem};
use crate::watch::primitive::WatchRegistry;
use crate::watch::rules::WatchRules;

/// Counters for one pass over the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files newly registered with the build watch set.
    pub registered: usize,
    /// Matching files that were already registered.
    pub already_watched: usize,
    pub skipped_dirs: usize,
}

pub struct TreeScanner {
    root: PathBuf,
    rules: WatchRules,
    fs: Arc<dyn FileSystem>,
    build_set: Arc<dyn WatchRegistry>,
    reload_set: Arc<dyn WatchRegistry>,
    reload_folders: Vec<PathBuf>,
    /// Livereload folders whose last registration attempt failed.
    unwatchable: Mutex<HashSet<PathBuf>>,
    interval: Duration,
}

impl std::fmt::Debug for TreeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeScanner")
            .field("root", &self.root)
            .field("rules", &self.rules)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl TreeScanner {
    pub fn new(
        config: &ConfigFile,
        fs: Arc<dyn FileSystem>,
        build_set: Arc<dyn WatchRegistry>,
        reload_set: Arc<dyn WatchRegistry>,
    ) -> Self {
        let reload_folders = if config.livereload_active() {
            config.livereload_folders()
        } else {
            Vec::new()
        };
        Self {
            root: config.watch.app_root.clone(),
            rules: WatchRules::from_config(config),
            fs,
            build_set,
            reload_set,
            reload_folders,
            unwatchable: Mutex::new(HashSet::new()),
            interval: config.scan_interval(),
        }
    }

    /// Walk the tree once.
    ///
    /// Fails if any visited entry cannot be inspected or listed.
    pub fn scan_once(&self) -> Result<ScanReport> {
        for folder in &self.reload_folders {
            self.register_reload_folder(folder);
        }

        let mut report = ScanReport::default();
        self.visit(&self.root, &mut report)?;
        Ok(report)
    }

    /// Warns on the first failure for a folder; repeats go to debug until
    /// the folder can be watched.
    fn register_reload_folder(&self, folder: &Path) {
        let result = self.reload_set.add(folder);
        let mut unwatchable = match self.unwatchable.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match result {
            Ok(added) => {
                if added {
                    info!(?folder, "watching livereload folder");
                }
                unwatchable.remove(folder);
            }
            Err(err) => {
                if unwatchable.insert(folder.to_path_buf()) {
                    warn!(?folder, error = %err, "cannot watch livereload folder");
                } else {
                    debug!(?folder, error = %err, "livereload folder still unwatchable");
                }
            }
        }
    }

    fn visit(&self, path: &Path, report: &mut ScanReport) -> Result<()> {
        match self.fs.entry_kind(path)? {
            EntryKind::Dir => {
                if self.rules.skips_dir(&self.root, path) {
                    report.skipped_dirs += 1;
                    return Ok(());
                }
                for child in self.fs.read_dir(path)? {
                    self.visit(&child, report)?;
                }
            }
            EntryKind::File => {
                if !self.rules.is_watched_file(path) {
                    return Ok(());
                }
                match self.build_set.add(path) {
                    Ok(true) => report.registered += 1,
                    Ok(false) => report.already_watched += 1,
                    // Typically descriptor exhaustion; the next pass retries.
                    Err(err) => warn!(?path, error = %err, "cannot watch file"),
                }
            }
        }
        Ok(())
    }

    /// Rescan until the session ends.
    ///
    /// A failed pass aborts the session.
    pub async fn run(self: Arc<Self>, session: Session) {
        let span = session.span();
        async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = session.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let scanner = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || scanner.scan_once()).await {
                    Ok(Ok(report)) => {
                        if report.registered > 0 {
                            info!(registered = report.registered, "new files watched");
                        }
                        debug!(?report, "scan pass finished");
                    }
                    Ok(Err(err)) => {
                        session.abort(format!("scanning {:?}: {err:#}", self.root));
                        break;
                    }
                    Err(err) => {
                        session.abort(format!("scan task failed: {err}"));
                        break;
                    }
                }
            }
            debug!("tree scanner stopped");
        }
        .instrument(span)
        .await
    }
}
