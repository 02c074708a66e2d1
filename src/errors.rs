// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    /// The session was torn down by an unrecoverable condition.
    #[error("session aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single compiler invocation.
///
/// Both variants carry whatever the compiler wrote to stderr, so the
/// rendered message is exactly what ends up in the error log.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{source}\n{stderr}")]
    Spawn {
        #[source]
        source: std::io::Error,
        stderr: String,
    },

    #[error("{}\n{}", describe_exit(.code), .stderr)]
    Exit { code: Option<i32>, stderr: String },
}

impl BuildError {
    /// True when the rendered failure contains any of the given markers.
    ///
    /// Blank markers never match.
    pub fn is_unrecoverable(&self, markers: &[String]) -> bool {
        let message = self.to_string();
        markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .any(|m| message.contains(m))
    }

    pub fn stderr(&self) -> &str {
        match self {
            BuildError::Spawn { stderr, .. } | BuildError::Exit { stderr, .. } => stderr,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevloopError>;
