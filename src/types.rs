use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// How the watch sets learn about filesystem changes.
///
/// - `Event`: native OS notifications (inotify, FSEvents, ...).
/// - `Polling`: periodic stat-based comparison, for filesystems where native
///   events are unreliable (network mounts, some container volumes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Event,
    Polling,
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::Event
    }
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event" => Ok(WatchMode::Event),
            "polling" | "poll" => Ok(WatchMode::Polling),
            other => Err(format!(
                "invalid watch mode: {other} (expected \"event\" or \"polling\")"
            )),
        }
    }
}

/// Where one standard stream of a spawned process is connected.
///
/// Deserialized from a plain string: `"inherit"`, `"null"`, or anything
/// else, which is taken as a file path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum StreamTarget {
    /// Share the orchestrator's own stream.
    #[default]
    Inherit,
    Null,
    /// Read from (stdin) or append to (stdout/stderr) this file.
    File(PathBuf),
}

impl From<String> for StreamTarget {
    fn from(value: String) -> Self {
        match value.trim() {
            "" | "inherit" => StreamTarget::Inherit,
            "null" => StreamTarget::Null,
            path => StreamTarget::File(PathBuf::from(path)),
        }
    }
}

impl StreamTarget {
    /// Open this target as a child's stdin.
    pub fn input(&self) -> std::io::Result<Stdio> {
        Ok(match self {
            StreamTarget::Inherit => Stdio::inherit(),
            StreamTarget::Null => Stdio::null(),
            StreamTarget::File(path) => Stdio::from(File::open(path)?),
        })
    }

    /// Open this target as a child's stdout or stderr.
    pub fn output(&self) -> std::io::Result<Stdio> {
        Ok(match self {
            StreamTarget::Inherit => Stdio::inherit(),
            StreamTarget::Null => Stdio::null(),
            StreamTarget::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Stdio::from(file)
            }
        })
    }
}

/// Parse a simple duration string like `"500ms"`, `"1s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
