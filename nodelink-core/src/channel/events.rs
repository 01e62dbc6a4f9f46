//! Event vocabulary shared by the channel, the dispatch shim, and the
//! request transport.
//!
//! The node exposes exactly twelve named operations. They are modeled as a
//! field-less enum so that event-keyed lookups and counters can use
//! [`enum_map`](https://docs.rs/enum-map) instead of string maps, while the
//! wire names stay the channel's camelCase strings via serde.

use std::fmt;

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation identifier carried by every signal.
///
/// Opaque to the dispatch path; only the request transport assigns and
/// matches them.
pub type Seq = i32;

/// The twelve operations the node channel can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeEvent {
    /// Bring the node up with keys and provider endpoints.
    Initialize,

    /// Open a state channel with a counterparty.
    Setup,

    /// Node configuration snapshot (no payload).
    GetConfig,

    /// Addresses of all known state channels (no payload).
    GetStateChannels,

    /// Full state of a single channel.
    GetStateChannel,

    /// Create a conditional transfer.
    ConditionalTransfer,

    /// Resolve a previously created transfer.
    ResolveTransfer,

    /// Reconcile an on-chain deposit into a channel.
    ReconcileDeposit,

    /// Withdraw funds from a channel.
    WithdrawDeposit,

    /// Ask the host to broadcast a deposit transaction.
    SendDepositTx,

    /// Restore node state from a remote backup.
    RestoreState,

    /// List transfers matching a filter.
    GetTransfers,
}

impl NodeEvent {
    /// All events, in declaration order.
    pub const ALL: [NodeEvent; 12] = [
        NodeEvent::Initialize,
        NodeEvent::Setup,
        NodeEvent::GetConfig,
        NodeEvent::GetStateChannels,
        NodeEvent::GetStateChannel,
        NodeEvent::ConditionalTransfer,
        NodeEvent::ResolveTransfer,
        NodeEvent::ReconcileDeposit,
        NodeEvent::WithdrawDeposit,
        NodeEvent::SendDepositTx,
        NodeEvent::RestoreState,
        NodeEvent::GetTransfers,
    ];

    /// The exact event name used on the wire.
    pub const fn wire_name(&self) -> &'static str {
        match self {
            NodeEvent::Initialize => "initialize",
            NodeEvent::Setup => "setup",
            NodeEvent::GetConfig => "getConfig",
            NodeEvent::GetStateChannels => "getStateChannels",
            NodeEvent::GetStateChannel => "getStateChannel",
            NodeEvent::ConditionalTransfer => "conditionalTransfer",
            NodeEvent::ResolveTransfer => "resolveTransfer",
            NodeEvent::ReconcileDeposit => "reconcileDeposit",
            NodeEvent::WithdrawDeposit => "withdrawDeposit",
            NodeEvent::SendDepositTx => "sendDepositTx",
            NodeEvent::RestoreState => "restoreState",
            NodeEvent::GetTransfers => "getTransfers",
        }
    }

    /// Whether the event carries a payload alongside the sequence
    /// identifier. Only `getConfig` and `getStateChannels` are seq-only.
    pub const fn carries_payload(&self) -> bool {
        !matches!(self, NodeEvent::GetConfig | NodeEvent::GetStateChannels)
    }
}

impl fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One delivered firing of a channel event.
///
/// The payload is opaque: it is never inspected, mutated, or retained by the
/// dispatch path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub event: NodeEvent,

    pub seq: Seq,

    /// `None` for seq-only events; verbatim JSON otherwise.
    pub payload: Option<Value>,
}

impl Signal {
    /// Convenience constructor for payload-carrying events.
    pub fn with_payload(event: NodeEvent, seq: Seq, payload: Value) -> Self {
        Self {
            event,
            seq,
            payload: Some(payload),
        }
    }

    /// Convenience constructor for seq-only events.
    pub fn seq_only(event: NodeEvent, seq: Seq) -> Self {
        Self {
            event,
            seq,
            payload: None,
        }
    }
}

/// Unsolicited events pushed by the node outside of any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// A counterparty created a conditional transfer towards us.
    ConditionalTransferCreated,

    /// A transfer we participated in was resolved.
    ConditionalTransferResolved,
}

/// A pushed node event. Carries a payload but no sequence identifier; there
/// is no request to correlate with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeNotification {
    pub kind: NotificationKind,

    pub payload: Value,
}
