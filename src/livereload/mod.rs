// src/livereload/mod.rs

//! Browser livereload: the reload pipeline and the push server it talks to.

pub mod pipeline;
pub mod server;

pub use pipeline::{NoopNotifier, ReloadNotifier, ReloadOutcome, ReloadPipeline};
pub use server::LivereloadServer;
