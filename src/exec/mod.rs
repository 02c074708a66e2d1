// src/exec/mod.rs

//! Process execution layer.
//!
//! Everything that spawns an external process lives here:
//!
//! - [`command`] composes compiler/artifact invocations and provides the
//!   production backends on top of `tokio::process::Command`.
//! - [`backend`] holds the backend traits and the owned [`ChildHandle`].
//! - [`builder`] is the single-flight builder that raises restart signals.
//! - [`supervisor`] replaces the running artifact on each restart signal.
//! - [`tasks`] runs livereload task chains as a pipeline.

pub mod backend;
pub mod builder;
pub mod command;
pub mod supervisor;
pub mod tasks;

pub use backend::{BoxFuture, BuildBackend, ChildHandle, CompileReport, ProcessLauncher};
pub use builder::{BuildOutcome, Builder, ErrorLog, RestartSignal};
pub use command::{shell_command, CommandBuildBackend, CommandLauncher, Invocation};
pub use supervisor::Supervisor;
pub use tasks::{run_chain, ChainOutcome};
