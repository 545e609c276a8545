// ── Snapshot subscriptions ──
//
// Watch-backed view of the published `MonitorSnapshot`. One value per poll
// cycle; slow consumers only ever see the latest.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::MonitorSnapshot;

/// A subscription to the monitor's published state.
pub struct SnapshotStream {
    current: Arc<MonitorSnapshot>,
    receiver: watch::Receiver<Arc<MonitorSnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<MonitorSnapshot>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation time or by the last `changed()`.
    pub fn current(&self) -> &Arc<MonitorSnapshot> {
        &self.current
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<MonitorSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. `None` once the monitor is dropped.
    pub async fn changed(&mut self) -> Option<Arc<MonitorSnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream`. The first item is the current snapshot.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each published snapshot.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<MonitorSnapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<MonitorSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
