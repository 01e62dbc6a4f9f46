//! The subscription boundary between the bridge and the host transport.
//!
//! The host's channel object is reached only through these two traits, so
//! the real transport and the in-process [`LocalChannel`] used in tests are
//! interchangeable.
//!
//! [`LocalChannel`]: crate::channel::local::LocalChannel

use crate::channel::events::{NodeEvent, Signal};
use crate::error::LinkError;

/// Callback invoked for every firing of a subscribed event.
///
/// Sinks run synchronously inside the source's delivery loop and must not
/// block on the channel they were delivered from.
pub type SignalSink = Box<dyn Fn(Signal) + Send + Sync>;

/// Receiving side of the channel: per-event subscription.
///
/// Each `connect` call registers one sink for one named event. Sources keep
/// sinks for the lifetime of the channel and deliver to all sinks of a fired
/// event in registration order.
pub trait SignalSource: Send + Sync {
    /// Register a sink for one named event.
    fn connect(&self, event: NodeEvent, sink: SignalSink) -> Result<(), LinkError>;
}

/// Sending side of the channel: signal injection.
///
/// Implemented by in-process channels and by the host-facing transport; the
/// request transport only needs this narrow capability.
pub trait SignalEmitter: Send + Sync {
    /// Inject one signal into the channel.
    ///
    /// Must not block; a full buffer is reported via
    /// [`LinkError::ChannelFull`] with the signal handed back.
    fn emit(&self, signal: Signal) -> Result<(), LinkError>;
}
