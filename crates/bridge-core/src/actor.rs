//! Actor identity and message destinations

use serde::{Deserialize, Serialize};

/// Unique identifier for a remote peer (a player session in practice)
pub type ActorId = String;

/// Where an outgoing packet is headed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Destination {
    /// Every actor connected at delivery time, not at enqueue time
    Broadcast,
    /// One specific actor
    Actor(ActorId),
}

impl Destination {
    /// The actor this destination targets, if it targets exactly one
    pub fn actor(&self) -> Option<&ActorId> {
        match self {
            Destination::Actor(actor) => Some(actor),
            Destination::Broadcast => None,
        }
    }
}
