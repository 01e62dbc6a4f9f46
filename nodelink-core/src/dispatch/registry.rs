//! HandlerRegistry: explicit event-name-to-handler mapping
//!
//! Replaces ambient global handler lookup with an injected registry:
//! - One handler per event name, latest registration wins
//! - Exact lookup only, no fallback chain
//! - Per-event dispatch counters
//! - Configurable behavior for signals with no registered handler
//!
//! The registry never inspects, mutates, or retains signal arguments; it
//! passes `(seq, payload)` through to the handler verbatim.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use enum_map::EnumMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::events::{NodeEvent, Seq, Signal};
use crate::error::LinkError;

/// Handler trait for named channel events.
pub trait SignalHandler: Send + Sync {
    /// Process one forwarded firing. Arguments arrive exactly as delivered
    /// by the channel.
    fn handle(&mut self, seq: Seq, payload: Option<Value>) -> Result<(), LinkError>;

    /// Handler name for diagnostics.
    fn name(&self) -> &'static str;
}

/// What to do when a signal arrives for an event with no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingHandlerPolicy {
    /// Log at warn level, count the drop, and continue.
    #[default]
    Warn,

    /// Surface [`LinkError::NoHandler`] to the dispatching caller.
    Fail,
}

/// Internal representation of a registered handler.
///
/// The handler is referenced via an `Arc` so that registry snapshots share
/// the same underlying instance; cloning a `HandlerSlot` only clones the
/// `Arc`.
#[derive(Clone)]
struct HandlerSlot {
    /// Event this handler answers for.
    event: NodeEvent,

    /// Handler name for diagnostics.
    name: &'static str,

    /// The actual handler wrapped in an `Arc<Mutex<...>>`.
    handler: Arc<Mutex<Box<dyn SignalHandler>>>,
}

/// Registry statistics snapshot.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Successful dispatches by event.
    pub dispatched: EnumMap<NodeEvent, u64>,

    /// Signals that found no handler.
    pub unhandled: u64,

    /// Handler invocations that returned an error.
    pub failed: u64,
}

/// Event-name-keyed handler registry.
pub struct HandlerRegistry {
    /// Registered handlers, read as a lock-free snapshot on every dispatch.
    handlers: ArcSwap<Vec<HandlerSlot>>,

    policy: MissingHandlerPolicy,

    dispatched: EnumMap<NodeEvent, AtomicU64>,
    unhandled: AtomicU64,
    failed: AtomicU64,
}

impl HandlerRegistry {
    /// Create an empty registry with the default (warn) policy.
    pub fn new() -> Self {
        Self::with_policy(MissingHandlerPolicy::default())
    }

    /// Create an empty registry with an explicit missing-handler policy.
    pub fn with_policy(policy: MissingHandlerPolicy) -> Self {
        Self {
            handlers: ArcSwap::from_pointee(Vec::new()),
            policy,
            dispatched: EnumMap::default(),
            unhandled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Register a handler for one event. A previous handler for the same
    /// event is replaced; latest registration wins.
    pub fn register(&self, event: NodeEvent, handler: Box<dyn SignalHandler>) {
        let slot = HandlerSlot {
            event,
            name: handler.name(),
            handler: Arc::new(Mutex::new(handler)),
        };

        let current: Arc<Vec<HandlerSlot>> = self.handlers.load_full();

        let mut new_vec: Vec<HandlerSlot> = current.as_ref().clone();

        if let Some(pos) = new_vec.iter().position(|s: &HandlerSlot| s.event == event) {
            warn!(
                "Replacing handler '{}' for '{event}' with '{}'",
                new_vec[pos].name, slot.name
            );
            new_vec.remove(pos);
        } else {
            debug!("Registered handler '{}' for '{event}'", slot.name);
        }

        new_vec.push(slot);

        self.handlers.store(Arc::new(new_vec));
    }

    /// Whether a handler is registered for the event.
    pub fn has_handler(&self, event: NodeEvent) -> bool {
        self.handlers
            .load()
            .iter()
            .any(|s: &HandlerSlot| s.event == event)
    }

    /// Registered handler count.
    pub fn handler_count(&self) -> usize {
        self.handlers.load().len()
    }

    /// Dispatch one signal to the handler registered for its event,
    /// passing `(seq, payload)` through unchanged.
    ///
    /// Handler failures are logged and counted but do not propagate; the
    /// dispatch path stays available for the next signal. Only the
    /// missing-handler case is policy-controlled.
    pub fn dispatch(&self, signal: Signal) -> Result<(), LinkError> {
        let handlers: Arc<Vec<HandlerSlot>> = self.handlers.load_full();

        let Some(slot) = handlers.iter().find(|s: &&HandlerSlot| s.event == signal.event) else {
            self.unhandled.fetch_add(1, Ordering::Relaxed);

            return match self.policy {
                MissingHandlerPolicy::Warn => {
                    warn!("No handler for '{}' (seq {})", signal.event, signal.seq);
                    Ok(())
                }

                MissingHandlerPolicy::Fail => Err(LinkError::NoHandler(signal.event)),
            };
        };

        let Signal {
            event,
            seq,
            payload,
        } = signal;

        // Lock only around the invocation itself.
        let mut guard = slot.handler.lock();

        match guard.handle(seq, payload) {
            Ok(()) => {
                self.dispatched[event].fetch_add(1, Ordering::Relaxed);

                Ok(())
            }

            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);

                warn!("Handler '{}' failed for '{event}': {e}", slot.name);

                Ok(())
            }
        }
    }

    /// Get a snapshot of registry statistics.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            dispatched: EnumMap::from_fn(|event: NodeEvent| {
                self.dispatched[event].load(Ordering::Relaxed)
            }),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.load().len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Records every invocation for assertion.
    struct RecordingHandler {
        log: Arc<Mutex<Vec<(Seq, Option<Value>)>>>,
    }

    impl SignalHandler for RecordingHandler {
        fn handle(&mut self, seq: Seq, payload: Option<Value>) -> Result<(), LinkError> {
            self.log.lock().push((seq, payload));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct FailingHandler;

    impl SignalHandler for FailingHandler {
        fn handle(&mut self, _seq: Seq, _payload: Option<Value>) -> Result<(), LinkError> {
            Err(LinkError::handler(NodeEvent::Setup, "boom"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn recording(log: &Arc<Mutex<Vec<(Seq, Option<Value>)>>>) -> Box<dyn SignalHandler> {
        Box::new(RecordingHandler {
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_dispatch_passes_arguments_through() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(NodeEvent::ConditionalTransfer, recording(&log));

        registry
            .dispatch(Signal::with_payload(
                NodeEvent::ConditionalTransfer,
                42,
                json!({"transferId": "abc"}),
            ))
            .unwrap();

        let seen = log.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 42);
        assert_eq!(seen[0].1, Some(json!({"transferId": "abc"})));
    }

    #[test]
    fn test_latest_registration_wins() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        registry.register(NodeEvent::GetConfig, recording(&first));
        registry.register(NodeEvent::GetConfig, recording(&second));

        assert_eq!(registry.handler_count(), 1);

        registry
            .dispatch(Signal::seq_only(NodeEvent::GetConfig, 1))
            .unwrap();

        assert!(first.lock().is_empty());
        assert_eq!(second.lock().len(), 1);
    }

    #[test]
    fn test_missing_handler_warn_policy_continues() {
        let registry = HandlerRegistry::new();

        let result = registry.dispatch(Signal::seq_only(NodeEvent::GetConfig, 1));

        assert!(result.is_ok());
        assert_eq!(registry.stats().unhandled, 1);
    }

    #[test]
    fn test_missing_handler_fail_policy_errors() {
        let registry = HandlerRegistry::with_policy(MissingHandlerPolicy::Fail);

        let result = registry.dispatch(Signal::seq_only(NodeEvent::GetStateChannels, 1));

        assert!(matches!(
            result,
            Err(LinkError::NoHandler(NodeEvent::GetStateChannels))
        ));
    }

    #[test]
    fn test_handler_failure_is_counted_not_propagated() {
        let registry = HandlerRegistry::new();

        registry.register(NodeEvent::Setup, Box::new(FailingHandler));

        let result = registry.dispatch(Signal::with_payload(NodeEvent::Setup, 1, json!({})));

        assert!(result.is_ok());

        let stats = registry.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.dispatched[NodeEvent::Setup], 0);
    }
}
