// tests/orchestrator.rs

mod common;
use crate::common::{
    init_tracing, manual_streams, registry, wait_until, with_timeout, ConfigFileBuilder,
    FakeBuild, FakeBuildBackend, FakeLauncher, LaunchEvent, RecordingNotifier,
    RecordingRegistry, RegistryOp, StreamFeed,
};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use devloop::config::ConfigFile;
use devloop::engine::{Orchestrator, Session, Watchers};
use devloop::errors::{DevloopError, Result as DevloopResult};
use devloop::fs::mock::MockFileSystem;
use devloop::watch::{ChangeKind, WatchEvent};

type TestResult = Result<(), Box<dyn Error>>;

struct Running {
    session: Session,
    backend: Arc<FakeBuildBackend>,
    launcher: Arc<FakeLauncher>,
    notifier: Arc<RecordingNotifier>,
    build_set: Arc<RecordingRegistry>,
    reload_set: Arc<RecordingRegistry>,
    build_feed: StreamFeed,
    reload_feed: StreamFeed,
    handle: tokio::task::JoinHandle<DevloopResult<()>>,
}

fn start(config: ConfigFile, backend: FakeBuildBackend) -> Running {
    let session = Session::new();
    let backend = Arc::new(backend);
    let launcher = Arc::new(FakeLauncher::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let build_set = registry();
    let reload_set = registry();
    let (build_feed, build_streams) = manual_streams();
    let (reload_feed, reload_streams) = manual_streams();

    let orchestrator = Orchestrator::new(config, session.clone())
        .with_backends(backend.clone(), launcher.clone())
        .with_filesystem(Arc::new(MockFileSystem::new()));
    let watchers = Watchers {
        build_set: build_set.clone(),
        build_streams,
        reload_set: reload_set.clone(),
        reload_streams,
    };
    let handle = tokio::spawn(orchestrator.run_with(watchers, notifier.clone()));

    Running {
        session,
        backend,
        launcher,
        notifier,
        build_set,
        reload_set,
        build_feed,
        reload_feed,
        handle,
    }
}

fn write(path: &str) -> WatchEvent {
    WatchEvent::new(path, ChangeKind::Write)
}

#[tokio::test]
async fn startup_build_then_rebuild_and_restart_on_change() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new()
        .target("./cmd/app")
        .output("/tmp/devloop-out", "app")
        .build();
    let rt = start(config, FakeBuildBackend::new());

    wait_until(|| rt.launcher.spawned() == 1).await;
    let startup = &rt.backend.invocations()[0];
    assert_eq!(startup.program, "go");
    assert_eq!(startup.args[..3], ["build", "-v", "-o"]);
    assert_eq!(startup.args[4], "./cmd/app");

    rt.build_feed.events.send(write("./main.go"))?;
    wait_until(|| rt.launcher.spawned() == 2).await;
    assert_eq!(rt.backend.started(), 2);

    let events = rt.launcher.events();
    assert!(matches!(events[1], LaunchEvent::Killed { id: 1 }));
    assert_eq!(rt.launcher.max_live(), 1);

    // The changed file is re-armed on the build watch set.
    let ops = rt.build_set.ops();
    let main = PathBuf::from("./main.go");
    assert!(ops.contains(&RegistryOp::Remove(main.clone())));
    assert_eq!(ops.last(), Some(&RegistryOp::Add(main)));

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    assert_eq!(rt.launcher.live(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_rebuild_leaves_running_process_alone() -> TestResult {
    init_tracing();
    let backend = FakeBuildBackend::with_script([
        FakeBuild::Succeed,
        FakeBuild::Fail("main.go:1: syntax error".to_string()),
    ]);
    let rt = start(ConfigFileBuilder::new().build(), backend);

    wait_until(|| rt.launcher.live() == 1).await;
    rt.build_feed.events.send(write("./main.go"))?;
    wait_until(|| rt.backend.finished() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(rt.launcher.spawned(), 1);
    assert_eq!(rt.launcher.live(), 1);
    assert!(!rt.session.is_cancelled());

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    Ok(())
}

#[tokio::test]
async fn unrecoverable_build_failure_ends_the_run_with_an_error() -> TestResult {
    init_tracing();
    let backend = FakeBuildBackend::with_script([FakeBuild::Fail(
        "no buildable Go source files in /src/app".to_string(),
    )]);
    let rt = start(ConfigFileBuilder::new().build(), backend);

    let result = with_timeout(rt.handle).await?;
    match result {
        Err(DevloopError::Aborted(reason)) => {
            assert!(reason.contains("no buildable Go source files"));
        }
        other => panic!("expected an aborted session, got {other:?}"),
    }
    assert_eq!(rt.launcher.spawned(), 0);
    assert!(rt.session.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn permission_only_changes_are_ignored() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new().livereload(&["assets"]).build();
    let rt = start(config, FakeBuildBackend::new());
    wait_until(|| rt.launcher.spawned() == 1).await;

    rt.build_feed
        .events
        .send(WatchEvent::new("./main.go", ChangeKind::Permission))?;
    rt.reload_feed
        .events
        .send(WatchEvent::new("./assets/app.css", ChangeKind::Permission))?;
    // Build events are handled before reload events, so once this reload
    // shows up the permission events above have been seen.
    rt.reload_feed.events.send(write("./assets/site.css"))?;
    wait_until(|| !rt.notifier.paths().is_empty()).await;

    assert_eq!(rt.backend.started(), 1);
    assert_eq!(rt.notifier.paths(), vec!["assets/site.css".to_string()]);

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    Ok(())
}

#[tokio::test]
async fn asset_change_reloads_without_rebuilding() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new().livereload(&["assets"]).build();
    let rt = start(config, FakeBuildBackend::new());
    wait_until(|| rt.launcher.spawned() == 1).await;

    rt.reload_feed.events.send(write("./assets/css/app.css"))?;
    wait_until(|| rt.notifier.paths().len() == 1).await;

    assert_eq!(rt.notifier.paths(), vec!["assets/css/app.css".to_string()]);
    assert_eq!(rt.backend.started(), 1);
    assert_eq!(rt.launcher.spawned(), 1);
    wait_until(|| rt.reload_set.watched() == vec![PathBuf::from("./assets")]).await;

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    Ok(())
}

#[tokio::test]
async fn asset_reload_proceeds_while_a_build_is_in_flight() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new().livereload(&["assets"]).build();
    let (backend, release) = FakeBuildBackend::new().held();
    let rt = start(config, backend);

    wait_until(|| rt.backend.started() == 1).await;
    rt.reload_feed.events.send(write("./assets/x.css"))?;
    wait_until(|| !rt.notifier.paths().is_empty()).await;

    assert_eq!(rt.notifier.paths(), vec!["assets/x.css".to_string()]);
    assert_eq!(rt.backend.finished(), 0);
    assert_eq!(rt.launcher.spawned(), 0);

    release.add_permits(1);
    wait_until(|| rt.launcher.spawned() == 1).await;

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    Ok(())
}

#[tokio::test]
async fn debug_mode_builds_once_and_ignores_changes() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new().debug(true).build();
    let rt = start(config, FakeBuildBackend::new());

    wait_until(|| rt.launcher.spawned() == 1).await;
    match &rt.launcher.events()[0] {
        LaunchEvent::Spawned { program, .. } => assert_eq!(program, "dlv"),
        other => panic!("expected a spawn, got {other:?}"),
    }

    let _ = rt.build_feed.events.send(write("./main.go"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rt.backend.started(), 1);
    assert_eq!(rt.launcher.spawned(), 1);

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    Ok(())
}

#[tokio::test]
async fn watcher_errors_are_logged_not_fatal() -> TestResult {
    init_tracing();
    let rt = start(ConfigFileBuilder::new().build(), FakeBuildBackend::new());
    wait_until(|| rt.launcher.spawned() == 1).await;

    rt.build_feed
        .errors
        .send(notify::Error::generic("inotify watch limit reached"))?;
    rt.reload_feed.errors.send(notify::Error::generic("boom"))?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!rt.session.is_cancelled());

    rt.build_feed.events.send(write("./main.go"))?;
    wait_until(|| rt.launcher.spawned() == 2).await;

    rt.session.cancel();
    with_timeout(rt.handle).await??;
    Ok(())
}
