// tests/supervisor.rs

mod common;
use crate::common::{init_tracing, wait_until, with_timeout, ConfigFileBuilder, FakeLauncher, LaunchEvent};

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use devloop::config::ConfigFile;
use devloop::engine::Session;
use devloop::exec::{RestartSignal, Supervisor};

fn signal(build: u64) -> RestartSignal {
    RestartSignal {
        build,
        artifact: PathBuf::from("/tmp/devloop-build"),
    }
}

fn start(
    config: ConfigFile,
) -> (
    Arc<FakeLauncher>,
    Session,
    mpsc::Sender<RestartSignal>,
    tokio::task::JoinHandle<()>,
) {
    let launcher = Arc::new(FakeLauncher::new());
    let session = Session::new();
    let (tx, rx) = mpsc::channel(1);
    let supervisor = Supervisor::new(Arc::new(config), launcher.clone(), session.clone());
    let handle = tokio::spawn(supervisor.run(rx));
    (launcher, session, tx, handle)
}

#[tokio::test]
async fn each_restart_kills_before_spawning() {
    init_tracing();
    let (launcher, session, tx, handle) = start(ConfigFileBuilder::new().build());

    for build in 1..=3 {
        tx.send(signal(build)).await.expect("supervisor alive");
    }
    wait_until(|| launcher.spawned() == 3).await;

    session.cancel();
    with_timeout(handle).await.expect("supervisor task");

    let events = launcher.events();
    let order: Vec<(bool, u32)> = events
        .iter()
        .map(|e| match e {
            LaunchEvent::Spawned { id, .. } => (true, *id),
            LaunchEvent::Killed { id } => (false, *id),
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (true, 1),
            (false, 1),
            (true, 2),
            (false, 2),
            (true, 3),
            (false, 3),
        ]
    );
    assert_eq!(launcher.max_live(), 1);
    assert_eq!(launcher.live(), 0);
}

#[tokio::test]
async fn launch_failure_leaves_no_process_until_next_build() {
    init_tracing();
    let (launcher, session, tx, handle) = start(ConfigFileBuilder::new().build());

    tx.send(signal(1)).await.expect("supervisor alive");
    wait_until(|| launcher.live() == 1).await;

    launcher.fail_launches(true);
    tx.send(signal(2)).await.expect("supervisor alive");
    // The old process is stopped even though its replacement cannot start.
    wait_until(|| launcher.live() == 0).await;
    assert!(!handle.is_finished(), "launch failures are not fatal");

    launcher.fail_launches(false);
    tx.send(signal(3)).await.expect("supervisor alive");
    wait_until(|| launcher.live() == 1).await;
    assert_eq!(launcher.spawned(), 2);

    session.cancel();
    with_timeout(handle).await.expect("supervisor task");
    assert_eq!(launcher.live(), 0);
}

#[tokio::test]
async fn runs_artifact_with_flags() {
    init_tracing();
    let config = ConfigFileBuilder::new()
        .run_flag("--port")
        .run_flag("3000")
        .build();
    let (launcher, session, tx, handle) = start(config);

    tx.send(signal(1)).await.expect("supervisor alive");
    wait_until(|| launcher.spawned() == 1).await;
    session.cancel();
    with_timeout(handle).await.expect("supervisor task");

    match &launcher.events()[0] {
        LaunchEvent::Spawned { program, args, .. } => {
            assert_eq!(PathBuf::from(program), PathBuf::from("/tmp/devloop-build"));
            assert_eq!(args, &vec!["--port".to_string(), "3000".to_string()]);
        }
        other => panic!("expected a spawn, got {other:?}"),
    }
}

#[tokio::test]
async fn debug_mode_runs_under_debugger() {
    init_tracing();
    let config = ConfigFileBuilder::new().debug(true).run_flag("-v").build();
    let (launcher, session, tx, handle) = start(config);

    tx.send(signal(1)).await.expect("supervisor alive");
    wait_until(|| launcher.spawned() == 1).await;
    session.cancel();
    with_timeout(handle).await.expect("supervisor task");

    match &launcher.events()[0] {
        LaunchEvent::Spawned { program, args, .. } => {
            assert_eq!(program, "dlv");
            assert_eq!(
                args,
                &vec![
                    "exec".to_string(),
                    "/tmp/devloop-build".to_string(),
                    "--".to_string(),
                    "-v".to_string(),
                ]
            );
        }
        other => panic!("expected a spawn, got {other:?}"),
    }
}

#[tokio::test]
async fn stops_when_all_senders_are_gone() {
    init_tracing();
    let (launcher, _session, tx, handle) = start(ConfigFileBuilder::new().build());

    tx.send(signal(1)).await.expect("supervisor alive");
    wait_until(|| launcher.live() == 1).await;
    drop(tx);

    with_timeout(handle).await.expect("supervisor task");
    assert_eq!(launcher.live(), 0);
}
