//! Cooperative cancellation tokens composed from multiple sources (spec
//! §4.4, §5).
//!
//! Modeled on `perl_lsp::cancellation::PerlLspCancellationToken`: an atomic
//! flag checked on the hot path, generalized here into one token per
//! in-flight request that any of the invoker's four cancellation sources can
//! fire. Whichever source fires first wins; later firings are coalesced so
//! only one reply is ever produced (spec §4.4 "Policy precedence").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Which of the invoker's cancellation sources cancelled a request (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `$/cancelRequest` from the peer.
    PeerCancelled,
    /// A tracked document was mutated while the request was in flight.
    ContentModified,
    /// `maximum_request_timeout` elapsed.
    TimedOut,
    /// Host-initiated shutdown.
    ShutDown,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    notify: Notify,
}

/// A cancellation signal shared between an invocation's handler task and the
/// invoker's cancellation sources.
///
/// Cloning shares the same underlying signal. `cancel` is idempotent and
/// first-wins: only the reason from the call that actually transitions the
/// token is retained.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Fire this token with `reason`.
    ///
    /// Returns `true` if this call won (the token was not already
    /// cancelled), `false` if a prior source got there first and this call
    /// was coalesced into a no-op.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.inner.reason.lock() = Some(reason);
            self.inner.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// True if some source has already fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// The winning reason, if cancelled.
    pub fn reason(&self) -> Option<CancelReason> {
        *self.inner.reason.lock()
    }

    /// Resolve once this token is cancelled by any source.
    ///
    /// Race-free: the `Notified` future is created before the flag is
    /// checked, so a `cancel()` landing between the check and the await is
    /// still observed — tokio's `Notify` guarantees a `notify_waiters` call
    /// is seen by any `Notified` future created before it, even one not yet
    /// polled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn first_cancel_wins() {
        let token = CancelToken::new();
        assert!(token.cancel(CancelReason::PeerCancelled));
        assert!(!token.cancel(CancelReason::TimedOut));
        assert_eq!(token.reason(), Some(CancelReason::PeerCancelled));
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        token.cancel(CancelReason::ShutDown);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel(CancelReason::TimedOut);
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .expect("should not have to wait for an already-cancelled token");
    }
}
