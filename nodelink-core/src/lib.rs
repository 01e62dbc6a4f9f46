//! # nodelink-core - Channel Bridge for an Embedded Payment Node
//!
//! Links a host wallet application to an embedded payment-node runtime over
//! a channel of named, subscribable signals.
//!
//! ## Key pieces
//! - Typed event vocabulary for the twelve node operations
//! - Narrow subscription boundary so the host transport stays mockable
//! - Explicit handler registry instead of ambient global handlers
//! - Dispatch shim forwarding each firing, unmodified, to its handler
//! - Request transport correlating responses by sequence identifier

pub mod error;

pub mod config;

pub mod channel {
    pub mod events;
    pub use events::{NodeEvent, NodeNotification, NotificationKind, Seq, Signal};

    pub mod source;
    pub use source::{SignalEmitter, SignalSink, SignalSource};

    pub mod local;
    pub use local::{ChannelMetricsSnapshot, LocalChannel};
}

pub mod dispatch {
    pub mod registry;
    pub use registry::{HandlerRegistry, MissingHandlerPolicy, RegistryStats, SignalHandler};

    pub mod shim;
    pub use shim::DispatchShim;
}

pub mod transport {
    pub mod requests;
    pub use requests::{PendingResponse, RequestTransport};
}

pub mod logging;
pub use logging::Logger;

pub use channel::{NodeEvent, Signal};
pub use config::LinkConfig;
pub use dispatch::{DispatchShim, HandlerRegistry};
pub use error::{LinkError, NodeError};
