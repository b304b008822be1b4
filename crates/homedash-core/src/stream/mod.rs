// ── Reactive view stream ──
//
// Subscription type for consuming merged dashboard views.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::DashboardView;

/// A subscription to the dashboard view.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct ViewStream {
    current: Arc<DashboardView>,
    receiver: watch::Receiver<Arc<DashboardView>>,
}

impl ViewStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<DashboardView>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The view captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Arc<DashboardView> {
        &self.current
    }

    /// The latest published view.
    pub fn latest(&self) -> Arc<DashboardView> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Arc<DashboardView>> {
        self.receiver.changed().await.ok()?;
        let view = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&view);
        Some(view)
    }

    /// Wait until `pred` holds for the latest view, checking the current
    /// one first.
    pub async fn wait_for(
        &mut self,
        mut pred: impl FnMut(&DashboardView) -> bool,
    ) -> Option<Arc<DashboardView>> {
        let view = self.receiver.wait_for(|view| pred(view.as_ref())).await.ok()?.clone();
        self.current = Arc::clone(&view);
        Some(view)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ViewWatchStream {
        ViewWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a new view each time the store publishes.
pub struct ViewWatchStream {
    inner: WatchStream<Arc<DashboardView>>,
}

impl Stream for ViewWatchStream {
    type Item = Arc<DashboardView>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn changed_tracks_latest() {
        let (tx, rx) = watch::channel(Arc::new(DashboardView::default()));
        let mut stream = ViewStream::new(rx);
        assert!(stream.current().snapshot.is_none());

        let next = DashboardView {
            last_server_error: Some("x".into()),
            ..DashboardView::default()
        };
        tx.send_replace(Arc::new(next));

        let seen = stream.changed().await.unwrap();
        assert_eq!(seen.last_server_error.as_deref(), Some("x"));
        assert_eq!(stream.current().last_server_error.as_deref(), Some("x"));

        drop(tx);
        assert!(stream.changed().await.is_none());
    }

    #[tokio::test]
    async fn into_stream_yields_current_first() {
        let (_tx, rx) = watch::channel(Arc::new(DashboardView {
            stale: true,
            ..DashboardView::default()
        }));
        let mut stream = ViewStream::new(rx).into_stream();
        assert!(stream.next().await.unwrap().stale);
    }
}
