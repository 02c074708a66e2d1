//! In-process stand-ins for the compiler, the supervised program, the
//! livereload server and a watch set.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use devloop::errors::BuildError;
use devloop::exec::{BoxFuture, BuildBackend, ChildHandle, CompileReport, Invocation, ProcessLauncher};
use devloop::livereload::ReloadNotifier;
use devloop::watch::WatchRegistry;
use tokio::sync::Semaphore;

/// Scripted result of one fake compile.
#[derive(Debug, Clone)]
pub enum FakeBuild {
    Succeed,
    /// Non-zero exit with this stderr.
    Fail(String),
    /// The compiler could not be started.
    SpawnError(String),
}

/// A fake compiler that:
/// - records every invocation
/// - returns scripted results in order (success once the script runs out)
/// - optionally holds each compile until the test releases it
#[derive(Debug, Default)]
pub struct FakeBuildBackend {
    script: Mutex<VecDeque<FakeBuild>>,
    invocations: Mutex<Vec<Invocation>>,
    started: AtomicUsize,
    finished: AtomicUsize,
    hold: Option<Arc<Semaphore>>,
}

impl FakeBuildBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(results: impl IntoIterator<Item = FakeBuild>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Every compile waits for one permit on the returned semaphore.
    pub fn held(mut self) -> (Self, Arc<Semaphore>) {
        let release = Arc::new(Semaphore::new(0));
        self.hold = Some(Arc::clone(&release));
        (self, release)
    }

    pub fn push(&self, result: FakeBuild) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl BuildBackend for FakeBuildBackend {
    fn compile<'a>(
        &'a self,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, std::result::Result<CompileReport, BuildError>> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(invocation.clone());
            let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(hold) = &self.hold {
                if let Ok(permit) = hold.acquire().await {
                    permit.forget();
                }
            }

            let result = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(FakeBuild::Succeed);
            self.finished.fetch_add(1, Ordering::SeqCst);

            match result {
                FakeBuild::Succeed => Ok(CompileReport {
                    pid: Some(1000 + n as u32),
                }),
                FakeBuild::Fail(stderr) => Err(BuildError::Exit {
                    code: Some(2),
                    stderr,
                }),
                FakeBuild::SpawnError(stderr) => Err(BuildError::Spawn {
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "compiler not found"),
                    stderr,
                }),
            }
        })
    }
}

/// Lifecycle events of fake processes, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    Spawned { id: u32, program: String, args: Vec<String> },
    Killed { id: u32 },
}

/// A fake process launcher whose "processes" live until killed.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    events: Arc<Mutex<Vec<LaunchEvent>>>,
    next_id: AtomicU32,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    fail: AtomicBool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent launches fail (or succeed again).
    pub fn fail_launches(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<LaunchEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, LaunchEvent::Spawned { .. }))
            .count()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of processes that were alive at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<ChildHandle> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("cannot start '{invocation}'"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().unwrap().push(LaunchEvent::Spawned {
            id,
            program: invocation.program.clone(),
            args: invocation.args.clone(),
        });
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);

        let events = Arc::clone(&self.events);
        let live = Arc::clone(&self.live);
        Ok(ChildHandle::spawn(Some(id), move |kill| async move {
            // Resolves on an explicit kill and when the handle is dropped.
            let _ = kill.await;
            live.fetch_sub(1, Ordering::SeqCst);
            events.lock().unwrap().push(LaunchEvent::Killed { id });
        }))
    }
}

/// Records every reload push.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    paths: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl ReloadNotifier for RecordingNotifier {
    fn notify_reload(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOp {
    Add(PathBuf),
    Remove(PathBuf),
}

/// A watch set that only remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    watched: Mutex<HashSet<PathBuf>>,
    ops: Mutex<Vec<RegistryOp>>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `add(path)` fail from now on.
    pub fn fail_add(&self, path: impl AsRef<Path>) {
        self.failing
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    pub fn allow_add(&self, path: impl AsRef<Path>) {
        self.failing.lock().unwrap().remove(path.as_ref());
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.watched.lock().unwrap().iter().cloned().collect();
        paths.sort();
        paths
    }

    pub fn ops(&self) -> Vec<RegistryOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl WatchRegistry for RecordingRegistry {
    fn add(&self, path: &Path) -> Result<bool> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(anyhow!("too many open files: {:?}", path));
        }
        self.ops.lock().unwrap().push(RegistryOp::Add(path.to_path_buf()));
        Ok(self.watched.lock().unwrap().insert(path.to_path_buf()))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.ops
            .lock()
            .unwrap()
            .push(RegistryOp::Remove(path.to_path_buf()));
        self.watched.lock().unwrap().remove(path);
        Ok(())
    }

    fn contains(&self, path: &Path) -> bool {
        self.watched.lock().unwrap().contains(path)
    }
}
