// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevloopError, Result};

/// Template written by `devloop --init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# devloop configuration

[watch]
# Directory tree scanned for source files.
app_root = "."
# Files with these extensions trigger a rebuild.
included_extensions = [".go"]
# Top-level folders that are never scanned. Folders starting with "_" or "."
# are always skipped.
ignored_folders = ["vendor", "log", "logs", "tmp", "node_modules", "bin", "templates"]
# "event" for native notifications, "polling" for network mounts and the like.
mode = "event"
poll_interval = "500ms"
scan_interval = "1s"

[build]
command = "go"
args = ["build", "-v"]
flags = []
target = "."
binary_name = "devloop-build"
fatal_markers = ["no buildable Go source files"]

[run]
flags = []
debug = false
debugger = "dlv"
debugger_args = ["exec"]
stdin = "inherit"
stdout = "inherit"
stderr = "inherit"

[env]

[livereload]
enable = false
port = 35729
included_folders = []
tasks = []
"#;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks extensions, env keys, livereload settings and durations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        return ConfigFile::try_from(RawConfigFile::default());
    }
    load_and_validate(path)
}

/// Write [`DEFAULT_CONFIG_TEMPLATE`] to `path`, refusing to overwrite.
pub fn write_default_config(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(DevloopError::ConfigError(format!(
            "{} already exists; not overwriting",
            path.display()
        )));
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(())
}
