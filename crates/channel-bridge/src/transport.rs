//! Transport abstraction the bridge is built over
//!
//! The bridge treats delivery as fire-and-forget: [`Transport::send`]
//! returns nothing and implementations log their own failures. Received
//! packets and peer disconnects flow back into the bridge as
//! [`TransportEvent`]s pushed into the sender returned by
//! [`crate::ChannelRegistry::start`].

use async_trait::async_trait;
use bridge_core::{ActorId, Destination, PacketMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One multiplexed message as it crosses the transport
///
/// Carrying the channel name on the wire is what lets many channels share a
/// single underlying connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WirePacket {
    pub channel: String,
    pub packet_type: String,
    pub payload: Value,
    pub metadata: PacketMetadata,
}

/// Fire-and-forget delivery primitive
///
/// A broadcast destination is expanded to "every peer connected at delivery
/// time" by the implementation, never earlier. Sends to a peer that has
/// already gone away must be dropped silently.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination: Destination, packet: WirePacket);
}

/// Events a concrete transport pushes into the registry's event loop
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A packet arrived from a peer. `sender` is None when the peer carries
    /// no actor identity (a client receiving from its server).
    Message {
        sender: Option<ActorId>,
        packet: WirePacket,
    },
    /// A peer went away; triggers rate-limiter and batch-queue cleanup
    ActorDisconnected(ActorId),
}
