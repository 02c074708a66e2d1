// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::{StreamTarget, WatchMode};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// app_root = "."
/// included_extensions = [".go"]
///
/// [build]
/// flags = ["-race"]
///
/// [run]
/// flags = ["--port", "3000"]
///
/// [env]
/// APP_ENV = "development"
///
/// [livereload]
/// enable = true
/// included_folders = ["assets"]
/// tasks = ["npm run css"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub run: RunSection,

    /// Environment overlay for the build and run steps.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub livereload: LivereloadSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on the invariants checked there. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub build: BuildSection,
    pub run: RunSection,
    pub env: BTreeMap<String, String>,
    pub livereload: LivereloadSection,
    scan_interval: Duration,
    poll_interval: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        scan_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            watch: raw.watch,
            build: raw.build,
            run: raw.run,
            env: raw.env,
            livereload: raw.livereload,
            scan_interval,
            poll_interval,
        }
    }

    /// Where the compiler writes the artifact and the supervisor runs it from.
    pub fn artifact_path(&self) -> PathBuf {
        let mut name = self.build.binary_name.clone();
        if cfg!(windows) && !name.ends_with(".exe") {
            name.push_str(".exe");
        }
        self.build.output_dir.join(name)
    }

    pub fn error_log_path(&self) -> &Path {
        &self.build.error_log
    }

    /// Livereload only runs when enabled *and* there is something to watch.
    pub fn livereload_active(&self) -> bool {
        self.livereload.enable && !self.livereload.included_folders.is_empty()
    }

    /// Livereload folders resolved against the watch root.
    pub fn livereload_folders(&self) -> Vec<PathBuf> {
        self.livereload
            .included_folders
            .iter()
            .map(|folder| {
                if folder.is_absolute() {
                    folder.clone()
                } else {
                    self.watch.app_root.join(folder)
                }
            })
            .collect()
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Debug mode, optionally forced on from the command line.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.run.debug = self.run.debug || debug;
        self
    }
}

/// `[watch]` section: what the tree scanner registers.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_app_root")]
    pub app_root: PathBuf,

    /// Extensions (with the leading dot) whose files trigger builds.
    #[serde(default = "default_included_extensions")]
    pub included_extensions: Vec<String>,

    /// Top-level folders never descended into.
    #[serde(default = "default_ignored_folders")]
    pub ignored_folders: Vec<String>,

    #[serde(default)]
    pub mode: WatchMode,

    /// Interval between stat sweeps in polling mode (e.g. `"500ms"`).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Interval between tree rescans (e.g. `"1s"`).
    #[serde(default = "default_scan_interval")]
    pub scan_interval: String,
}

fn default_app_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_included_extensions() -> Vec<String> {
    vec![".go".to_string()]
}

fn default_ignored_folders() -> Vec<String> {
    ["vendor", "log", "logs", "tmp", "node_modules", "bin", "templates"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_poll_interval() -> String {
    "500ms".to_string()
}

fn default_scan_interval() -> String {
    "1s".to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            included_extensions: default_included_extensions(),
            ignored_folders: default_ignored_folders(),
            mode: WatchMode::default(),
            poll_interval: default_poll_interval(),
            scan_interval: default_scan_interval(),
        }
    }
}

/// `[build]` section: the compiler invocation.
///
/// The full command line is `command args... flags... -o <artifact> <target>`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    #[serde(default = "default_build_command")]
    pub command: String,

    /// Base arguments placed before `flags`.
    #[serde(default = "default_build_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub flags: Vec<String>,

    /// What the compiler builds (package path or directory).
    #[serde(default = "default_build_target")]
    pub target: PathBuf,

    #[serde(default = "std::env::temp_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Compiler output fragments that mean "nothing to build": the session
    /// is aborted instead of waiting for the next change.
    #[serde(default = "default_fatal_markers")]
    pub fatal_markers: Vec<String>,

    /// Holds the text of the most recent failed build.
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
}

fn default_build_command() -> String {
    "go".to_string()
}

fn default_build_args() -> Vec<String> {
    vec!["build".to_string(), "-v".to_string()]
}

fn default_build_target() -> PathBuf {
    PathBuf::from(".")
}

fn default_binary_name() -> String {
    "devloop-build".to_string()
}

fn default_fatal_markers() -> Vec<String> {
    vec!["no buildable Go source files".to_string()]
}

pub fn default_error_log() -> PathBuf {
    std::env::temp_dir().join("devloop-errors.log")
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            args: default_build_args(),
            flags: Vec::new(),
            target: default_build_target(),
            output_dir: std::env::temp_dir(),
            binary_name: default_binary_name(),
            fatal_markers: default_fatal_markers(),
            error_log: default_error_log(),
        }
    }
}

/// `[run]` section: how the built artifact is started.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Arguments passed to the artifact.
    #[serde(default)]
    pub flags: Vec<String>,

    /// Run the artifact under a debugger; file changes no longer rebuild.
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_debugger")]
    pub debugger: String,

    #[serde(default = "default_debugger_args")]
    pub debugger_args: Vec<String>,

    #[serde(default)]
    pub stdin: StreamTarget,

    #[serde(default)]
    pub stdout: StreamTarget,

    #[serde(default)]
    pub stderr: StreamTarget,
}

fn default_debugger() -> String {
    "dlv".to_string()
}

fn default_debugger_args() -> Vec<String> {
    vec!["exec".to_string()]
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            flags: Vec::new(),
            debug: false,
            debugger: default_debugger(),
            debugger_args: default_debugger_args(),
            stdin: StreamTarget::default(),
            stdout: StreamTarget::default(),
            stderr: StreamTarget::default(),
        }
    }
}

/// `[livereload]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LivereloadSection {
    #[serde(default)]
    pub enable: bool,

    #[serde(default = "default_livereload_port")]
    pub port: u16,

    /// Folders (relative to `watch.app_root`) whose changes reload browsers
    /// instead of rebuilding.
    #[serde(default)]
    pub included_folders: Vec<PathBuf>,

    /// Shell commands run as a pipe chain before each reload.
    #[serde(default)]
    pub tasks: Vec<String>,
}

pub const DEFAULT_LIVERELOAD_PORT: u16 = 35729;

fn default_livereload_port() -> u16 {
    DEFAULT_LIVERELOAD_PORT
}

impl Default for LivereloadSection {
    fn default() -> Self {
        Self {
            enable: false,
            port: DEFAULT_LIVERELOAD_PORT,
            included_folders: Vec::new(),
            tasks: Vec::new(),
        }
    }
}
