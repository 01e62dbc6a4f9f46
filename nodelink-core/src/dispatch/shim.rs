//! DispatchShim: routing glue between the channel and the handler registry.
//!
//! For each of the twelve recognized events the shim installs one forwarding
//! sink on the channel. When the channel fires an event, the sink invokes
//! the like-named registered handler with the exact arguments received: a
//! sequence identifier and, for most events, an opaque payload. The shim
//! carries no state of its own: each registration is independent, each
//! forwarded call runs to completion inside the channel's delivery, and no
//! argument is inspected or retained.

use std::sync::Arc;

use tracing::{info, warn};

use crate::channel::events::{NodeEvent, Signal};
use crate::channel::source::SignalSource;
use crate::dispatch::registry::HandlerRegistry;
use crate::error::LinkError;

/// Forwards channel firings to the injected handler registry.
pub struct DispatchShim {
    registry: Arc<HandlerRegistry>,
}

impl DispatchShim {
    /// Create a shim around an injected registry.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Subscribe to all twelve events on the source.
    ///
    /// Registrations are independent and unconditional; there is no ordering
    /// dependency between them. Each installed sink does exactly one thing:
    /// hand the signal to the registry unchanged.
    pub fn attach(&self, source: &dyn SignalSource) -> Result<(), LinkError> {
        for event in NodeEvent::ALL {
            let registry = Arc::clone(&self.registry);

            source.connect(
                event,
                Box::new(move |signal: Signal| {
                    // The sink has no failure path back into the channel;
                    // strict-policy dispatch errors surface here as logs.
                    if let Err(e) = registry.dispatch(signal) {
                        warn!("Dispatch failed: {e}");
                    }
                }),
            )?;
        }

        info!("Dispatch shim attached for {} events", NodeEvent::ALL.len());

        Ok(())
    }

    /// The registry this shim forwards to.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for DispatchShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchShim")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::events::Seq;
    use crate::channel::local::LocalChannel;
    use crate::dispatch::registry::SignalHandler;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    type CallLog = Arc<Mutex<Vec<(NodeEvent, Seq, Option<Value>)>>>;

    struct TaggedHandler {
        event: NodeEvent,
        log: CallLog,
    }

    impl SignalHandler for TaggedHandler {
        fn handle(&mut self, seq: Seq, payload: Option<Value>) -> Result<(), LinkError> {
            self.log.lock().push((self.event, seq, payload));
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.event.wire_name()
        }
    }

    fn shim_over_local() -> (LocalChannel, Arc<HandlerRegistry>, CallLog) {
        let channel = LocalChannel::with_capacity(64);
        let registry = Arc::new(HandlerRegistry::new());
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));

        for event in NodeEvent::ALL {
            registry.register(
                event,
                Box::new(TaggedHandler {
                    event,
                    log: Arc::clone(&log),
                }),
            );
        }

        DispatchShim::new(Arc::clone(&registry))
            .attach(&channel)
            .unwrap();

        (channel, registry, log)
    }

    #[test]
    fn test_every_event_forwards_to_its_own_handler() {
        let (channel, _registry, log) = shim_over_local();

        for event in NodeEvent::ALL {
            let payload = event.carries_payload().then(|| json!({"x": 1}));
            channel.fire(event, 1, payload).unwrap();
        }

        channel.drain();

        let seen = log.lock();
        assert_eq!(seen.len(), NodeEvent::ALL.len());

        for (i, event) in NodeEvent::ALL.iter().enumerate() {
            assert_eq!(seen[i].0, *event);
            assert_eq!(seen[i].1, 1);
            assert_eq!(
                seen[i].2,
                event.carries_payload().then(|| json!({"x": 1}))
            );
        }
    }

    #[test]
    fn test_no_cross_talk() {
        let (channel, _registry, log) = shim_over_local();

        channel
            .fire(
                NodeEvent::ConditionalTransfer,
                42,
                Some(json!({"transferId": "abc"})),
            )
            .unwrap();
        channel.drain();

        let seen = log.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            (
                NodeEvent::ConditionalTransfer,
                42,
                Some(json!({"transferId": "abc"}))
            )
        );
    }

    #[test]
    fn test_double_fire_forwards_twice() {
        let (channel, _registry, log) = shim_over_local();

        channel.fire(NodeEvent::GetConfig, 1, None).unwrap();
        channel.fire(NodeEvent::GetConfig, 2, None).unwrap();
        channel.drain();

        let seen = log.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, 1);
        assert_eq!(seen[1].1, 2);
    }

    #[test]
    fn test_registration_order_is_irrelevant() {
        let channel = LocalChannel::with_capacity(8);
        let registry = Arc::new(HandlerRegistry::new());
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));

        // Register in reverse declaration order.
        for event in NodeEvent::ALL.iter().rev() {
            registry.register(
                *event,
                Box::new(TaggedHandler {
                    event: *event,
                    log: Arc::clone(&log),
                }),
            );
        }

        DispatchShim::new(Arc::clone(&registry))
            .attach(&channel)
            .unwrap();

        channel
            .fire(NodeEvent::GetTransfers, 5, Some(json!({})))
            .unwrap();
        channel.fire(NodeEvent::Initialize, 6, Some(json!({}))).unwrap();
        channel.drain();

        let seen = log.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, NodeEvent::GetTransfers);
        assert_eq!(seen[1].0, NodeEvent::Initialize);
    }
}
