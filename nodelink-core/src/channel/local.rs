//! In-process channel powered by [`kanal`](https://docs.rs/kanal) channels.
//!
//! `LocalChannel` implements both sides of the channel boundary: hosts and
//! the request transport inject signals through [`SignalEmitter`], and the
//! dispatch shim subscribes through [`SignalSource`]. Signals are queued on
//! a bounded kanal channel and delivered by [`LocalChannel::pump`] (or
//! [`LocalChannel::drain`] in tests), synchronously and in order, to every
//! sink connected to the fired event.
//!
//! Sends use `try_send_option` so a full buffer does not drop the signal;
//! the caller gets it back and decides what to do. The sink list is held in
//! an [`ArcSwap`](https://docs.rs/arc-swap) snapshot, read lock-free on
//! every delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use enum_map::EnumMap;
use kanal::{AsyncReceiver, AsyncSender, bounded_async};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::channel::events::{NodeEvent, Seq, Signal};
use crate::channel::source::{SignalEmitter, SignalSink, SignalSource};
use crate::config::ChannelConfig;
use crate::error::LinkError;

/// One registered subscription.
#[derive(Clone)]
struct SinkEntry {
    /// Event this sink is connected to.
    event: NodeEvent,

    /// The sink itself, shared between snapshots.
    sink: Arc<SignalSink>,
}

/// Delivery metrics with lock-free counters.
#[derive(Debug, Default)]
struct ChannelMetrics {
    /// Signals handed to at least one sink.
    delivered: AtomicU64,

    /// Signals returned to callers on a full buffer.
    dropped: AtomicU64,

    /// Deliveries by event.
    event_counts: EnumMap<NodeEvent, AtomicU64>,
}

/// Snapshot of channel metrics for reporting.
#[derive(Debug, Clone)]
pub struct ChannelMetricsSnapshot {
    pub delivered: u64,
    pub dropped: u64,
    pub event_counts: EnumMap<NodeEvent, u64>,
}

/// In-process implementation of the channel boundary.
pub struct LocalChannel {
    tx: AsyncSender<Signal>,
    rx: AsyncReceiver<Signal>,

    /// Registered sinks. Registering clones the current snapshot and swaps
    /// in the extended list; delivery reads the snapshot without locking.
    sinks: ArcSwap<Vec<SinkEntry>>,

    metrics: ChannelMetrics,
}

impl LocalChannel {
    /// Create a channel with the configured buffer size.
    pub fn new(config: &ChannelConfig) -> Self {
        Self::with_capacity(config.event_buffer)
    }

    /// Create a channel with an explicit buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded_async(capacity);

        Self {
            tx,
            rx,
            sinks: ArcSwap::from_pointee(Vec::new()),
            metrics: ChannelMetrics::default(),
        }
    }

    /// Inject a signal, building it from parts. Test and demo convenience.
    pub fn fire(
        &self,
        event: NodeEvent,
        seq: Seq,
        payload: Option<Value>,
    ) -> Result<(), LinkError> {
        self.emit(Signal {
            event,
            seq,
            payload,
        })
    }

    /// Deliver queued signals until the channel is closed.
    pub async fn pump(&self) {
        while let Ok(signal) = self.rx.recv().await {
            self.deliver(signal);
        }

        debug!("Channel closed, pump exiting");
    }

    /// Deliver all currently queued signals without blocking. Returns the
    /// number of signals delivered.
    pub fn drain(&self) -> usize {
        let mut count: usize = 0;

        loop {
            match self.rx.try_recv() {
                Ok(Some(signal)) => {
                    self.deliver(signal);
                    count += 1;
                }

                Ok(None) => break,

                Err(_e) => break,
            }
        }

        count
    }

    /// Close the channel; `pump` exits once the channel is closed.
    pub fn close(&self) {
        self.tx.close();
    }

    /// Queued signal count.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Get a snapshot of the current metrics.
    pub fn metrics(&self) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            delivered: self.metrics.delivered.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
            event_counts: EnumMap::from_fn(|event: NodeEvent| {
                self.metrics.event_counts[event].load(Ordering::Relaxed)
            }),
        }
    }

    /// Invoke every sink connected to the fired event, in registration
    /// order.
    fn deliver(&self, signal: Signal) {
        trace!("Delivering signal: {:?}", signal);

        let sinks: Arc<Vec<SinkEntry>> = self.sinks.load_full();

        let mut hit = false;

        for entry in sinks.iter().filter(|e: &&SinkEntry| e.event == signal.event) {
            (*entry.sink)(signal.clone());
            hit = true;
        }

        if hit {
            self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
            self.metrics.event_counts[signal.event].fetch_add(1, Ordering::Relaxed);
        } else {
            debug!("No sink connected for '{}'", signal.event);
        }
    }
}

impl SignalSource for LocalChannel {
    fn connect(&self, event: NodeEvent, sink: SignalSink) -> Result<(), LinkError> {
        let entry = SinkEntry {
            event,
            sink: Arc::new(sink),
        };

        debug!("Connecting sink for '{event}'");

        let current: Arc<Vec<SinkEntry>> = self.sinks.load_full();

        let mut new_vec: Vec<SinkEntry> = current.as_ref().clone();
        new_vec.push(entry);

        self.sinks.store(Arc::new(new_vec));

        Ok(())
    }
}

impl SignalEmitter for LocalChannel {
    /// Submit a signal without blocking. If the buffer is full, the signal
    /// is returned to the caller. Kanal's `try_send_option` stores the
    /// signal in an `Option` and only consumes it upon success, allowing us
    /// to recover it on failure.
    fn emit(&self, signal: Signal) -> Result<(), LinkError> {
        let mut opt: Option<Signal> = Some(signal);

        match self.tx.try_send_option(&mut opt) {
            Ok(true) => Ok(()),

            Ok(false) => {
                let sig = opt
                    .take()
                    .expect("signal should still be present on failed send");

                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);

                warn!("Channel buffer full, returning signal for '{}'", sig.event);

                Err(LinkError::ChannelFull(Box::new(sig)))
            }

            Err(_e) => Err(LinkError::ChannelClosed),
        }
    }
}

impl std::fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalChannel")
            .field("queued", &self.rx.len())
            .field("sinks", &self.sinks.load().len())
            .finish()
    }
}
