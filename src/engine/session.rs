// src/engine/session.rs

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, Span};
use uuid::Uuid;

/// One orchestrator run.
///
/// Cheap to clone; all clones share the same lifecycle. Cancelling the
/// session stops the scan loop, both dispatch loops and the supervisor.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    token: CancellationToken,
    abort_reason: OnceLock<String>,
    span: Span,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .field("abort_reason", &self.abort_reason())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Session driven by an existing token, e.g. `parent.child_token()`.
    pub fn with_token(token: CancellationToken) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!("session", id = %id);
        Self {
            inner: Arc::new(SessionInner {
                id,
                token,
                abort_reason: OnceLock::new(),
                span,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Span that orchestration work is entered into.
    pub fn span(&self) -> Span {
        self.inner.span.clone()
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Graceful shutdown (e.g. Ctrl-C).
    pub fn cancel(&self) {
        if !self.is_cancelled() {
            info!(session = %self.inner.id, "shutting down");
        }
        self.inner.token.cancel();
    }

    /// Tear the session down because of an unrecoverable condition.
    ///
    /// Only the first abort is recorded; returns `true` for that call.
    pub fn abort(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let first = self.inner.abort_reason.set(reason.clone()).is_ok();
        if first {
            error!(session = %self.inner.id, %reason, "aborting session");
        }
        self.inner.token.cancel();
        first
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.inner.abort_reason.get().map(String::as_str)
    }
}
