#![allow(dead_code)]

use std::path::{Path, PathBuf};

use devloop::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the defaults, except that the error log goes to a path that
/// is unique per builder so parallel tests never share it.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.build.error_log = std::env::temp_dir().join(format!(
            "devloop-test-errors-{}-{}.log",
            std::process::id(),
            next_id()
        ));
        Self { config }
    }

    pub fn app_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.watch.app_root = root.as_ref().to_path_buf();
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.config.watch.included_extensions = exts.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn ignored(mut self, folders: &[&str]) -> Self {
        self.config.watch.ignored_folders = folders.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn scan_interval(mut self, interval: &str) -> Self {
        self.config.watch.scan_interval = interval.to_string();
        self
    }

    pub fn build_command(mut self, command: &str, args: &[&str]) -> Self {
        self.config.build.command = command.to_string();
        self.config.build.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn build_flag(mut self, flag: &str) -> Self {
        self.config.build.flags.push(flag.to_string());
        self
    }

    pub fn target(mut self, target: impl AsRef<Path>) -> Self {
        self.config.build.target = target.as_ref().to_path_buf();
        self
    }

    pub fn output(mut self, dir: impl AsRef<Path>, binary: &str) -> Self {
        self.config.build.output_dir = dir.as_ref().to_path_buf();
        self.config.build.binary_name = binary.to_string();
        self
    }

    pub fn fatal_marker(mut self, marker: &str) -> Self {
        self.config.build.fatal_markers.push(marker.to_string());
        self
    }

    pub fn error_log(mut self, path: impl AsRef<Path>) -> Self {
        self.config.build.error_log = path.as_ref().to_path_buf();
        self
    }

    pub fn run_flag(mut self, flag: &str) -> Self {
        self.config.run.flags.push(flag.to_string());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.run.debug = debug;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn livereload(mut self, folders: &[&str]) -> Self {
        self.config.livereload.enable = true;
        self.config.livereload.included_folders = folders.iter().map(PathBuf::from).collect();
        self
    }

    pub fn livereload_port(mut self, port: u16) -> Self {
        self.config.livereload.port = port;
        self
    }

    pub fn task(mut self, command: &str) -> Self {
        self.config.livereload.tasks.push(command.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn next_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
