//! Cooperative cancellation for long-running queries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shareable cancellation flag.
///
/// Queries check the token before each ball-tree descent step and between
/// candidate verifications; once cancelled, partial results are discarded
/// and [`Error::Cancelled`](crate::Error::Cancelled) is surfaced. The
/// engine installs no timers of its own — callers impose wall-clock
/// deadlines by cancelling from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// A token that never fires; used by the non-cancellable query
    /// entry points.
    pub fn never() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Error-or-continue check used at query checkpoints.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
