//! Request-scoped deadline and cooperative cancellation.

use mira_error::{ServerError, ServerErrorKind};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Lifetime of one request: a cancellation token plus the deadline that
/// fires it.
///
/// Creating a scope with [`RequestScope::with_timeout`] spawns a watchdog
/// that cancels the token once the deadline passes. Dropping the scope also
/// cancels the token, which stops the watchdog, so a scope owned by a
/// response body ends with that body whether it completes or the client
/// goes away.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct RequestScope {
    token: CancellationToken,
    deadline: Instant,
    _release: DropGuard,
}

impl RequestScope {
    /// Start a scope that cancels itself after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::from_token(CancellationToken::new(), timeout)
    }

    /// Start a scope around an existing token.
    ///
    /// Cancelling `token` from outside cancels the scope; dropping the scope
    /// cancels `token`.
    pub fn from_token(token: CancellationToken, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let watchdog = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(timeout_ms = timeout.as_millis() as u64, "Request deadline exceeded");
                    watchdog.cancel();
                }
                _ = watchdog.cancelled() => {}
            }
        });

        Self {
            _release: token.clone().drop_guard(),
            token,
            deadline,
        }
    }

    /// Cancel all outstanding work of this request.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the request was cancelled or ran out of time.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the request is cancelled or runs out of time.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Instant at which the scope cancels itself.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fail with [`ServerErrorKind::Timeout`] if the scope is cancelled.
    #[track_caller]
    pub fn ensure_live(&self) -> Result<(), ServerError> {
        if self.is_cancelled() {
            Err(ServerError::new(ServerErrorKind::Timeout))
        } else {
            Ok(())
        }
    }

    /// Cancellable wait.
    ///
    /// Resolves after `duration`, or early with [`ServerErrorKind::Timeout`]
    /// if the scope is cancelled first. A scope that is already cancelled
    /// fails without waiting.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ServerError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ServerError::new(ServerErrorKind::Timeout)),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
