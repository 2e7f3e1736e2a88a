//! # channel-bridge
//!
//! Named-channel message bridge. Multiplexes many logical packet types over
//! a shared transport connection, enforcing per-packet-type rate limits
//! independently on sender and receiver, validating payloads before
//! dispatch, and opportunistically batching outgoing messages to reduce
//! transport overhead.
//!
//! The transport itself is an external collaborator: anything that can
//! deliver a [`WirePacket`] to one or all connected peers and push received
//! packets back as [`TransportEvent`]s. [`MemoryTransport`] is the
//! in-process implementation used for loopback setups and tests.

pub mod batch;
pub mod channel;
pub mod memory;
pub mod rate_limit;
pub mod registry;
pub mod transport;

pub use batch::{BatchQueue, OutgoingBatchEntry};
pub use channel::{Channel, Handler, HandlerHandle, SendOptions};
pub use memory::MemoryTransport;
pub use rate_limit::{RATE_WINDOW, RateActor, RateKey, RateLimiterService};
pub use registry::{BridgeConfig, ChannelRegistry};
pub use transport::{Transport, TransportEvent, WirePacket};

pub use bridge_core::{
    ActorId, BridgeError, Destination, PacketConfig, PacketDefinition, PacketMetadata, Priority,
    Result, Validator,
};
