// tests/filesystem.rs

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use devloop::exec::ErrorLog;
use devloop::fs::mock::MockFileSystem;
use devloop::fs::{EntryKind, FileSystem, RealFileSystem};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn real_fs_lists_sorted_and_creates_parents() -> TestResult {
    let dir = tempfile::tempdir()?;
    let fs = RealFileSystem;

    fs.write(&dir.path().join("b.go"), b"package b")?;
    fs.write(&dir.path().join("nested/deeper/a.go"), b"package a")?;

    let entries = fs.read_dir(dir.path())?;
    assert_eq!(
        entries,
        vec![dir.path().join("b.go"), dir.path().join("nested")]
    );
    assert_eq!(fs.entry_kind(&dir.path().join("nested"))?, EntryKind::Dir);
    assert_eq!(fs.entry_kind(&dir.path().join("b.go"))?, EntryKind::File);
    assert!(fs.entry_kind(&dir.path().join("missing")).is_err());

    fs.remove_file(&dir.path().join("b.go"))?;
    assert!(!fs.exists(&dir.path().join("b.go")));
    Ok(())
}

#[test]
fn mock_fs_tracks_tree_and_injected_failures() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("./cmd/app/main.go", "package main");
    fs.add_dir("./empty");

    assert_eq!(
        fs.read_dir(Path::new("."))?,
        vec![PathBuf::from("./cmd"), PathBuf::from("./empty")]
    );
    assert_eq!(fs.entry_kind(Path::new("./cmd/app"))?, EntryKind::Dir);

    fs.fail_stat("./cmd/app/main.go");
    assert!(fs.entry_kind(Path::new("./cmd/app/main.go")).is_err());

    fs.remove_file(Path::new("./cmd/app/main.go"))?;
    assert!(fs.read_dir(Path::new("./cmd/app"))?.is_empty());
    assert!(fs.remove_file(Path::new("./cmd")).is_err());
    Ok(())
}

#[test]
fn error_log_is_overwritten_and_cleared() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("logs").join("errors.log");
    let log = ErrorLog::new(&path, Arc::new(RealFileSystem));

    log.clear();
    log.record("first failure");
    log.record("second failure");
    assert_eq!(std::fs::read_to_string(&path)?, "second failure");

    log.clear();
    assert!(!path.exists());
    Ok(())
}
