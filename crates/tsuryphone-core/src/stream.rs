// ── Reactive state stream ──
//
// Subscription adapter for consuming coordinator state changes with
// `StreamExt` combinators.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::coordinator::CurrentState;

/// `Stream` adapter backed by the coordinator's state `watch` channel.
///
/// Yields a fresh [`CurrentState`] each time a merge or a health
/// transition publishes. The first poll yields the state at
/// subscription time.
pub struct StateStream {
    inner: WatchStream<CurrentState>,
}

impl StateStream {
    pub(crate) fn new(receiver: watch::Receiver<CurrentState>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for StateStream {
    type Item = CurrentState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin when the inner type is Unpin, and
        // CurrentState is always Unpin.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
