// src/watch/rules.rs

use std::path::{Component, Path, PathBuf};

use crate::config::ConfigFile;

/// Which files the tree scanner registers and which folders it skips.
///
/// - Files match on their extension: everything from the last `.` of the
///   file name, compared exactly and case-sensitively (`".go"`).
/// - Folders are skipped when their name starts with `_` or `.`, or when
///   their path relative to the root starts with an ignored folder
///   (`"vendor"` skips `vendor/` but not `pkg/vendor/`).
#[derive(Debug, Clone, Default)]
pub struct WatchRules {
    extensions: Vec<String>,
    ignored: Vec<PathBuf>,
}

impl WatchRules {
    pub fn new<E, I>(extensions: E, ignored: I) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            ignored: ignored
                .into_iter()
                .map(|p| normalize(p.as_ref()))
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        }
    }

    /// Rules for a validated config.
    ///
    /// Active livereload folders are ignored for builds so a change there
    /// reloads browsers without also rebuilding.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let root = &cfg.watch.app_root;
        let mut ignored: Vec<PathBuf> =
            cfg.watch.ignored_folders.iter().map(PathBuf::from).collect();
        if cfg.livereload_active() {
            ignored.extend(cfg.livereload.included_folders.iter().map(|folder| {
                folder
                    .strip_prefix(root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| folder.clone())
            }));
        }
        Self::new(&cfg.watch.included_extensions, ignored)
    }

    pub fn is_watched_file(&self, path: &Path) -> bool {
        match file_extension(path) {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }

    /// `rel` is relative to the watch root.
    pub fn is_ignored_folder(&self, rel: &Path) -> bool {
        let rel = normalize(rel);
        self.ignored.iter().any(|ignored| rel.starts_with(ignored))
    }

    /// Whether the scanner should leave the subtree at `dir` alone.
    ///
    /// `_`-prefixed directories are skipped everywhere, the root included;
    /// `.`-prefixed ones everywhere but the root.
    pub fn skips_dir(&self, root: &Path, dir: &Path) -> bool {
        let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('_') {
            return true;
        }
        if dir == root {
            return false;
        }
        if name.starts_with('.') {
            return true;
        }
        let rel = dir.strip_prefix(root).unwrap_or(dir);
        self.is_ignored_folder(rel)
    }
}

fn file_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.rfind('.').map(|idx| &name[idx..])
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
