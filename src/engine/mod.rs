// src/engine/mod.rs

//! Orchestration engine for devloop.
//!
//! This module ties together:
//! - the session lifecycle every long-running task watches ([`session`])
//! - the single-flight gates in front of builds and reloads ([`gate`])
//! - the loops that route watch events to the builder and the reload
//!   pipeline ([`dispatch`])
//! - the top-level wiring in [`runtime`]

pub mod dispatch;
pub mod gate;
pub mod runtime;
pub mod session;

pub use dispatch::{drain_errors, Dispatcher};
pub use gate::{Gate, GatePermit};
pub use runtime::{Orchestrator, Watchers};
pub use session::Session;
