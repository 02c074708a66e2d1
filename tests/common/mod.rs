#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use devloop::watch::{WatchEvent, WatchStreams};

pub use devloop_test_utils::builders::ConfigFileBuilder;
pub use devloop_test_utils::fakes::{
    FakeBuild, FakeBuildBackend, FakeLauncher, LaunchEvent, RecordingNotifier, RecordingRegistry,
    RegistryOp,
};
pub use devloop_test_utils::{init_tracing, wait_until, with_timeout};

/// Sending half of a hand-driven watch set.
pub struct StreamFeed {
    pub events: mpsc::UnboundedSender<WatchEvent>,
    pub errors: mpsc::UnboundedSender<notify::Error>,
}

/// Watch streams that the test feeds by hand.
pub fn manual_streams() -> (StreamFeed, WatchStreams) {
    let (event_tx, events) = mpsc::unbounded_channel();
    let (error_tx, errors) = mpsc::unbounded_channel();
    (
        StreamFeed {
            events: event_tx,
            errors: error_tx,
        },
        WatchStreams { events, errors },
    )
}

pub fn registry() -> Arc<RecordingRegistry> {
    Arc::new(RecordingRegistry::new())
}
