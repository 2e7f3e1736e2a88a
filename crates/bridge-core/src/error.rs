//! Error types for the message bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
///
/// Only programmer errors surface as `Err` values: sending a packet type
/// nobody defined, or defining the same type twice. Runtime conditions
/// caused by remote peers (malformed payloads, rate-limit hits) are dropped
/// with a log entry instead, so a misbehaving peer can never crash the
/// local process.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Packet type was never defined on this channel
    #[error("Undefined packet type: {0}")]
    UndefinedPacket(String),

    /// Second define() for a type that already exists on the channel
    #[error("Packet type already defined: {0}")]
    PacketAlreadyDefined(String),

    /// Transport-level failure outside the fire-and-forget send path
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}
