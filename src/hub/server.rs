//! TCP side of the relay: accept loop, per-subscriber delivery and the
//! ingestion/dispatch pipeline around them.

use crate::hub::broadcaster::{Broadcaster, Line, Subscription};
use crate::hub::queue::DropOldestQueue;
use crate::hub::{HubError, RelayConfig};
use crate::source::{LineReceiver, next_line};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// How long [`Relay::shutdown`] waits for subscribers to drain their queues.
pub const DELIVERY_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Counters reported when a relay shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Lines handed to the relay
    pub lines: u64,
    /// Lines evicted from the ingestion queue before they were published
    pub evicted: u64,
    /// Lines published to the registry
    pub published: u64,
}

/// A running relay: listener, dispatcher and the shared registry.
///
/// Feed it with [`Relay::push`]; finish with [`Relay::shutdown`].
pub struct Relay {
    local_addr: SocketAddr,
    broadcaster: Arc<Broadcaster>,
    queue: Arc<DropOldestQueue<Line>>,
    accept_cancel: CancellationToken,
    accept_task: JoinHandle<()>,
    deliveries: TaskTracker,
    dispatch_task: JoinHandle<u64>,
    lines: AtomicU64,
    evicted: AtomicU64,
}

impl Relay {
    /// Bind the listener and start accepting subscribers.
    ///
    /// The accept loop stops when `cancel` fires or at [`Relay::shutdown`].
    pub async fn start(config: &RelayConfig, cancel: &CancellationToken) -> Result<Self, HubError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| HubError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| HubError::Bind {
            addr: config.bind_addr,
            source,
        })?;
        tracing::info!(addr = %local_addr, "relay listening");

        let broadcaster = Arc::new(Broadcaster::new(config.subscriber_queue));
        let queue = Arc::new(DropOldestQueue::new(config.queue_capacity));
        let accept_cancel = cancel.child_token();
        let deliveries = TaskTracker::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&broadcaster),
            deliveries.clone(),
            accept_cancel.clone(),
        ));
        let dispatch_task = tokio::spawn(dispatch(
            Arc::clone(&queue),
            Arc::clone(&broadcaster),
            cancel.clone(),
        ));

        Ok(Self {
            local_addr,
            broadcaster,
            queue,
            accept_cancel,
            accept_task,
            deliveries,
            dispatch_task,
            lines: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Queue a line for publishing. Never waits.
    pub fn push(&self, line: impl Into<Line>) {
        self.lines.fetch_add(1, Ordering::Relaxed);
        if self.queue.push(line.into()).is_some() {
            let evicted = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(evicted, "ingestion queue full, dropped oldest line");
        }
    }

    /// Publish what is still queued, stop accepting and disconnect everybody.
    ///
    /// Waits up to [`DELIVERY_DRAIN_TIMEOUT`] for subscribers to receive the
    /// lines already in their own queues. Connections still busy after that are
    /// left to finish on their own.
    pub async fn shutdown(self) -> RelayStats {
        self.queue.close();
        let published = match self.dispatch_task.await {
            Ok(published) => published,
            Err(e) => {
                tracing::error!(error = %e, "relay dispatcher failed");
                0
            }
        };

        self.accept_cancel.cancel();
        if let Err(e) = self.accept_task.await {
            tracing::error!(error = %e, "relay accept loop failed");
        }

        let subscribers = self.broadcaster.close();
        self.deliveries.close();
        if tokio::time::timeout(DELIVERY_DRAIN_TIMEOUT, self.deliveries.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                pending = self.deliveries.len(),
                "subscribers did not drain before shutdown"
            );
        }

        let stats = RelayStats {
            lines: self.lines.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            published,
        };
        tracing::info!(
            subscribers,
            lines = stats.lines,
            evicted = stats.evicted,
            published = stats.published,
            "relay stopped"
        );
        stats
    }
}

/// Relay every line of `lines` until end of input or cancellation.
pub async fn run_relay(
    config: &RelayConfig,
    lines: &mut LineReceiver,
    cancel: &CancellationToken,
) -> Result<RelayStats, HubError> {
    let relay = Relay::start(config, cancel).await?;
    loop {
        match next_line(lines, cancel).await {
            Ok(Some(line)) => relay.push(line),
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read input");
                break;
            }
        }
    }
    Ok(relay.shutdown().await)
}

async fn dispatch(
    queue: Arc<DropOldestQueue<Line>>,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
) -> u64 {
    let mut published = 0;
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = queue.pop() => line,
        };
        let Some(line) = line else { break };
        let delivered = broadcaster.publish(&line);
        tracing::trace!(delivered, "published line");
        published += 1;
    }
    published
}

async fn accept_loop(
    listener: TcpListener,
    broadcaster: Arc<Broadcaster>,
    deliveries: TaskTracker,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                }
                let subscription = broadcaster.subscribe();
                tracing::info!(
                    %peer,
                    subscriber = %subscription.id(),
                    subscribers = broadcaster.subscriber_count(),
                    "subscriber connected"
                );
                let broadcaster = Arc::clone(&broadcaster);
                deliveries.spawn(async move {
                    let _ = deliver(subscription, &broadcaster, stream, peer).await;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept subscriber");
            }
        }
    }
    tracing::debug!("relay listener closed");
}

/// Write every line of `subscription` to `writer`, one per line.
///
/// On a write error the subscriber removes itself from `broadcaster` and the
/// writer is shut down.
pub async fn deliver<W>(
    mut subscription: Subscription,
    broadcaster: &Broadcaster,
    mut writer: W,
    peer: SocketAddr,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let id = subscription.id();
    let mut buf = Vec::new();
    while let Some(line) = subscription.recv().await {
        if let Err(e) = write_line(&mut writer, &mut buf, &line).await {
            tracing::info!(%peer, subscriber = %id, error = %e, "subscriber disconnected");
            broadcaster.unsubscribe(id);
            let _ = writer.shutdown().await;
            return Err(e);
        }
    }
    tracing::debug!(%peer, subscriber = %id, "subscription closed");
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write `line` and its terminator with a single `write_all`.
async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    buf: &mut Vec<u8>,
    line: &str,
) -> io::Result<()> {
    buf.clear();
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    writer.write_all(buf).await
}
