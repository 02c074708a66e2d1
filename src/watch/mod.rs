// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Two `notify`-backed watch sets (build and livereload) behind a small
//!   registry trait ([`primitive`]).
//! - The include/ignore rules derived from the config ([`rules`]).
//! - The periodic tree scanner that registers files ([`scanner`]).
//!
//! It does **not** decide what a change means; the engine's dispatch loop
//! turns events into builds and reloads.

pub mod path_utils;
pub mod primitive;
pub mod rules;
pub mod scanner;

pub use primitive::{
    ChangeKind, WatchEvent, WatchRegistry, WatchSet, WatchStreams, START_SENTINEL,
};
pub use rules::WatchRules;
pub use scanner::{ScanReport, TreeScanner};
