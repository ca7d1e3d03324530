// ── Reactive rule-set streams ──
//
// Subscription types for consuming a scope's published snapshots.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::RuleSetState;

/// A subscription to one scope's rule list.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct RuleSetStream {
    current: RuleSetState,
    receiver: watch::Receiver<RuleSetState>,
}

impl RuleSetStream {
    pub(crate) fn new(receiver: watch::Receiver<RuleSetState>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The state captured at creation or at the last `changed()`.
    pub fn current(&self) -> &RuleSetState {
        &self.current
    }

    /// The latest published state.
    pub fn latest(&self) -> RuleSetState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<RuleSetState> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    pub fn into_stream(self) -> RuleSetWatchStream {
        RuleSetWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every published [`RuleSetState`].
pub struct RuleSetWatchStream {
    inner: WatchStream<RuleSetState>,
}

impl Stream for RuleSetWatchStream {
    type Item = RuleSetState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
