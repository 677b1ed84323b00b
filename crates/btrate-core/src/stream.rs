// ── Monitor event subscription ──
//
// Handle returned by `Monitor::subscribe`. Carries the snapshot table as
// it was at subscription time plus the live event feed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::model::{DeviceSnapshot, MonitorEvent};

/// A continuous subscription to monitor events.
///
/// Each subscriber has its own bounded queue. When it falls behind, the
/// oldest events are dropped and a single [`MonitorEvent::Lagged`] reports
/// how many were missed; the monitor itself never waits for a subscriber.
///
/// Dropping the stream unsubscribes. Once the last subscriber is gone the
/// background cycle task stops before its next cycle.
pub struct EventStream {
    initial: Vec<Arc<DeviceSnapshot>>,
    inner: BroadcastStream<MonitorEvent>,
}

impl EventStream {
    pub(crate) fn new(
        initial: Vec<Arc<DeviceSnapshot>>,
        receiver: broadcast::Receiver<MonitorEvent>,
    ) -> Self {
        Self {
            initial,
            inner: BroadcastStream::new(receiver),
        }
    }

    /// Snapshots of the last completed cycle at subscription time.
    pub fn initial(&self) -> &[Arc<DeviceSnapshot>] {
        &self.initial
    }

    /// Next event; `None` once the monitor is gone.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        self.next().await
    }
}

impl Stream for EventStream {
    type Item = MonitorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx).map(|item| {
            item.map(|result| match result {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(missed)) => MonitorEvent::Lagged { missed },
            })
        })
    }
}
