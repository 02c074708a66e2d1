// tests/builder.rs

mod common;
use crate::common::{init_tracing, with_timeout, ConfigFileBuilder, FakeBuild, FakeBuildBackend};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use devloop::config::ConfigFile;
use devloop::engine::Session;
use devloop::exec::{BuildOutcome, Builder, ErrorLog, RestartSignal};
use devloop::fs::mock::MockFileSystem;
use devloop::watch::{ChangeKind, WatchEvent};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    builder: Arc<Builder>,
    backend: Arc<FakeBuildBackend>,
    fs: MockFileSystem,
    session: Session,
    restart_rx: mpsc::Receiver<RestartSignal>,
    error_log: PathBuf,
}

fn harness(config: ConfigFile, backend: FakeBuildBackend) -> Harness {
    let config = Arc::new(config);
    let backend = Arc::new(backend);
    let fs = MockFileSystem::new();
    let session = Session::new();
    let (restart_tx, restart_rx) = mpsc::channel(1);
    let error_log = config.error_log_path().to_path_buf();

    let builder = Arc::new(Builder::new(
        Arc::clone(&config),
        session.clone(),
        backend.clone(),
        ErrorLog::new(&error_log, Arc::new(fs.clone())),
        restart_tx,
    ));
    Harness {
        builder,
        backend,
        fs,
        session,
        restart_rx,
        error_log,
    }
}

fn change(path: &str) -> WatchEvent {
    WatchEvent::new(path, ChangeKind::Write)
}

#[tokio::test]
async fn successful_build_raises_restart_signal() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new().output("/tmp/out", "app").build();
    let mut h = harness(config, FakeBuildBackend::new());

    let handle = h.builder.trigger(WatchEvent::startup()).expect("gate open");
    assert_eq!(with_timeout(handle).await?, BuildOutcome::Succeeded { build: 1 });

    let signal = with_timeout(h.restart_rx.recv()).await.expect("restart signal");
    assert_eq!(signal.build, 1);
    assert_eq!(signal.artifact, PathBuf::from("/tmp/out").join(if cfg!(windows) {
        "app.exe"
    } else {
        "app"
    }));
    assert!(h.builder.gate().is_open());
    Ok(())
}

#[tokio::test]
async fn events_during_a_build_are_dropped() -> TestResult {
    init_tracing();
    let (backend, release) = FakeBuildBackend::new().held();
    let mut h = harness(ConfigFileBuilder::new().build(), backend);

    let first = h.builder.trigger(change("main.go")).expect("gate open");
    common::wait_until(|| h.backend.started() == 1).await;

    for name in ["a.go", "b.go", "c.go"] {
        assert!(h.builder.trigger(change(name)).is_none());
    }
    assert_eq!(h.builder.builds_started(), 1);

    release.add_permits(1);
    assert_eq!(with_timeout(first).await?, BuildOutcome::Succeeded { build: 1 });
    assert!(with_timeout(h.restart_rx.recv()).await.is_some());

    // The next change after completion builds again.
    release.add_permits(1);
    let second = h.builder.trigger(change("main.go")).expect("gate reopened");
    assert_eq!(with_timeout(second).await?, BuildOutcome::Succeeded { build: 2 });
    assert_eq!(h.backend.started(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_build_writes_error_log_and_success_removes_it() -> TestResult {
    init_tracing();
    let backend = FakeBuildBackend::with_script([
        FakeBuild::Fail("main.go:3: undefined: x".to_string()),
        FakeBuild::Succeed,
    ]);
    let mut h = harness(ConfigFileBuilder::new().build(), backend);

    let failed = h.builder.trigger(change("main.go")).expect("gate open");
    assert_eq!(with_timeout(failed).await?, BuildOutcome::Failed { build: 1 });

    let logged = h.fs.contents(&h.error_log).expect("error log written");
    let text = String::from_utf8(logged)?;
    assert!(text.contains("exit status 2"));
    assert!(text.contains("undefined: x"));
    assert!(h.restart_rx.try_recv().is_err(), "failed build must not restart");
    assert!(!h.session.is_cancelled());

    let ok = h.builder.trigger(change("main.go")).expect("gate open");
    assert_eq!(with_timeout(ok).await?, BuildOutcome::Succeeded { build: 2 });
    assert!(h.fs.contents(&h.error_log).is_none(), "error log removed");
    Ok(())
}

#[tokio::test]
async fn compiler_that_cannot_start_is_a_recoverable_failure() -> TestResult {
    init_tracing();
    let backend = FakeBuildBackend::with_script([FakeBuild::SpawnError(String::new())]);
    let h = harness(ConfigFileBuilder::new().build(), backend);

    let handle = h.builder.trigger(change("main.go")).expect("gate open");
    assert_eq!(with_timeout(handle).await?, BuildOutcome::Failed { build: 1 });
    let text = String::from_utf8(h.fs.contents(&h.error_log).expect("error log"))?;
    assert!(text.contains("compiler not found"));
    Ok(())
}

#[tokio::test]
async fn fatal_marker_aborts_the_session_once() -> TestResult {
    init_tracing();
    let backend = FakeBuildBackend::with_script([FakeBuild::Fail(
        "no buildable Go source files in /src".to_string(),
    )]);
    let mut h = harness(ConfigFileBuilder::new().build(), backend);

    let handle = h.builder.trigger(WatchEvent::startup()).expect("gate open");
    assert_eq!(with_timeout(handle).await?, BuildOutcome::Fatal { build: 1 });

    assert!(h.session.is_cancelled());
    let reason = h.session.abort_reason().expect("abort reason recorded");
    assert!(reason.contains("no buildable Go source files"));
    assert!(h.restart_rx.try_recv().is_err());
    assert!(h.fs.contents(&h.error_log).is_none(), "fatal failures are not logged to file");

    // A second abort does not replace the reason.
    assert!(!h.session.abort("later"));
    assert!(h.builder.trigger(change("main.go")).is_none());
    Ok(())
}

#[tokio::test]
async fn custom_fatal_marker_is_honoured() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new().fatal_marker("cannot find package").build();
    let backend =
        FakeBuildBackend::with_script([FakeBuild::Fail("cannot find package \"x\"".to_string())]);
    let h = harness(config, backend);

    let handle = h.builder.trigger(change("main.go")).expect("gate open");
    assert_eq!(with_timeout(handle).await?, BuildOutcome::Fatal { build: 1 });
    assert!(h.session.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn cancelled_session_refuses_triggers() {
    init_tracing();
    let h = harness(ConfigFileBuilder::new().build(), FakeBuildBackend::new());
    h.session.cancel();

    assert!(h.builder.trigger(change("main.go")).is_none());
    assert_eq!(h.backend.started(), 0);
}

#[tokio::test]
async fn build_uses_configured_invocation() -> TestResult {
    init_tracing();
    let config = ConfigFileBuilder::new()
        .build_flag("-race")
        .target("./cmd/server")
        .output("/tmp/out", "server")
        .env("GOFLAGS", "-mod=vendor")
        .build();
    let h = harness(config, FakeBuildBackend::new());

    let handle = h.builder.trigger(change("main.go")).expect("gate open");
    with_timeout(handle).await?;

    let invocations = h.backend.invocations();
    assert_eq!(invocations.len(), 1);
    let inv = &invocations[0];
    assert_eq!(inv.program, "go");
    assert_eq!(&inv.args[..3], &["build", "-v", "-race"]);
    assert_eq!(inv.args[3], "-o");
    assert!(inv.args[4].ends_with("server") || inv.args[4].ends_with("server.exe"));
    assert_eq!(inv.args[5], "./cmd/server");
    assert_eq!(inv.env, vec![("GOFLAGS".to_string(), "-mod=vendor".to_string())]);
    Ok(())
}
