//! Request/response correlation over the signal channel.
//!
//! The requesting side of the bridge: `invoke` assigns a sequence
//! identifier, records a resolver, and emits the signal; the node answers by
//! calling `resolve` or `reject` with the same seq, which completes the
//! pending future. Sequence identifiers follow the ordered-map scheme of the
//! node protocol: one greater than the highest outstanding seq, or 0 when
//! none are outstanding, so they regenerate after quiescence.
//!
//! Unsolicited node events (transfer created/resolved) bypass correlation
//! entirely and fan out on a tokio broadcast channel; lagging receivers skip
//! old notifications.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, trace};

use crate::channel::events::{NodeEvent, NodeNotification, NotificationKind, Seq, Signal};
use crate::channel::source::SignalEmitter;
use crate::config::TransportConfig;
use crate::error::{LinkError, NodeError};

type Resolver = oneshot::Sender<Result<Value, NodeError>>;

/// Shared state between the transport and in-flight responses.
struct TransportInner {
    /// Outstanding requests by seq. Ordered so that seq allocation can read
    /// the highest key.
    pending: Mutex<BTreeMap<Seq, Resolver>>,

    /// Requests that hit the response timeout.
    timed_out: AtomicU64,
}

impl TransportInner {
    /// Next seq: highest outstanding + 1, or 0 when none are outstanding.
    fn next_seq(pending: &BTreeMap<Seq, Resolver>) -> Seq {
        pending.keys().next_back().map_or(0, |seq: &Seq| seq + 1)
    }
}

/// Correlates requests emitted into the channel with node responses.
pub struct RequestTransport {
    emitter: Arc<dyn SignalEmitter>,

    inner: Arc<TransportInner>,

    response_timeout: Duration,

    notify_tx: broadcast::Sender<NodeNotification>,
}

impl RequestTransport {
    /// Create a transport emitting into the given channel.
    pub fn new(emitter: Arc<dyn SignalEmitter>, config: &TransportConfig) -> Self {
        let (notify_tx, _) = broadcast::channel(config.notification_buffer);

        Self {
            emitter,
            inner: Arc::new(TransportInner {
                pending: Mutex::new(BTreeMap::new()),
                timed_out: AtomicU64::new(0),
            }),
            response_timeout: config.response_timeout,
            notify_tx,
        }
    }

    /// Emit a request signal and return a handle to the pending response.
    ///
    /// The payload is passed through opaque; seq-only events take `None`.
    pub fn invoke(
        &self,
        event: NodeEvent,
        payload: Option<Value>,
    ) -> Result<PendingResponse, LinkError> {
        let (tx, rx) = oneshot::channel();

        let seq: Seq = {
            let mut pending = self.inner.pending.lock();
            let seq = TransportInner::next_seq(&pending);
            pending.insert(seq, tx);
            seq
        };

        trace!("Invoking '{event}' with seq {seq}");

        match self.emitter.emit(Signal {
            event,
            seq,
            payload,
        }) {
            Ok(()) => Ok(PendingResponse {
                event,
                seq,
                rx,
                timeout: self.response_timeout,
                inner: Arc::clone(&self.inner),
            }),

            Err(e) => {
                // The signal never entered the channel; forget the resolver.
                self.inner.pending.lock().remove(&seq);

                Err(e)
            }
        }
    }

    /// Complete the pending request for `seq` with a success payload.
    pub fn resolve(&self, seq: Seq, payload: Value) {
        match self.inner.pending.lock().remove(&seq) {
            Some(resolver) => {
                if resolver.send(Ok(payload)).is_err() {
                    debug!("Response for seq {seq} arrived after the waiter gave up");
                }
            }

            None => error!("Could not find pending request for seq {seq}"),
        }
    }

    /// Fail the pending request for `seq` with the node's rejection value.
    pub fn reject(&self, seq: Seq, error: Value) {
        match self.inner.pending.lock().remove(&seq) {
            Some(resolver) => {
                if resolver.send(Err(NodeError::from_value(error))).is_err() {
                    debug!("Rejection for seq {seq} arrived after the waiter gave up");
                }
            }

            None => error!("Could not find pending request for seq {seq}"),
        }
    }

    /// Fan out an unsolicited node event to all subscribers.
    pub fn notify(&self, kind: NotificationKind, payload: Value) {
        // No subscribers is fine; the send result only reports that.
        let _ = self.notify_tx.send(NodeNotification { kind, payload });
    }

    /// Subscribe to unsolicited node events.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<NodeNotification> {
        self.notify_tx.subscribe()
    }

    /// Outstanding request count.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Requests that hit the response timeout so far.
    pub fn timed_out(&self) -> u64 {
        self.inner.timed_out.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RequestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTransport")
            .field("pending", &self.pending_count())
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

/// Handle to one in-flight request.
pub struct PendingResponse {
    event: NodeEvent,
    seq: Seq,
    rx: oneshot::Receiver<Result<Value, NodeError>>,
    timeout: Duration,
    inner: Arc<TransportInner>,
}

impl PendingResponse {
    /// The seq assigned to this request.
    pub fn seq(&self) -> Seq {
        self.seq
    }

    /// The event this request was emitted for.
    pub fn event(&self) -> NodeEvent {
        self.event
    }

    /// Await the node's answer, bounded by the configured timeout.
    ///
    /// On timeout the pending entry is removed so a late answer is reported
    /// as unknown-seq instead of resolving into nowhere.
    pub async fn wait(self) -> Result<Value, LinkError> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(Ok(value))) => Ok(value),

            Ok(Ok(Err(node))) => Err(LinkError::Node(node)),

            // Transport dropped while we were waiting.
            Ok(Err(_recv)) => Err(LinkError::Cancelled),

            Err(_elapsed) => {
                self.inner.pending.lock().remove(&self.seq);
                self.inner.timed_out.fetch_add(1, Ordering::Relaxed);

                Err(LinkError::response_timeout(
                    self.event,
                    self.seq,
                    self.timeout,
                ))
            }
        }
    }
}
