//! # bridge-core
//!
//! Core types for the channel message bridge.
//!
//! This crate provides the foundational types shared by every bridge
//! component:
//! - Actor identity and message destinations
//! - Packet definitions, configuration, and per-message metadata
//! - The bridge error taxonomy

pub mod actor;
pub mod error;
pub mod packet;

pub use actor::{ActorId, Destination};
pub use error::{BridgeError, Result};
pub use packet::{PacketConfig, PacketDefinition, PacketMetadata, Priority, Validator};
