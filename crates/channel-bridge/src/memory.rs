//! In-process loopback transport
//!
//! Delivers wire packets to per-actor queues. Broadcast expands to the
//! actors attached at delivery time, which is what gives batched broadcasts
//! their late-binding behavior. Sends to detached actors are dropped
//! silently, matching the fire-and-forget transport contract.

use crate::transport::{Transport, WirePacket};
use async_trait::async_trait;
use bridge_core::{ActorId, Destination};
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

/// Loopback transport for same-process peers
#[derive(Default)]
pub struct MemoryTransport {
    peers: Mutex<HashMap<ActorId, mpsc::UnboundedSender<WirePacket>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an actor. Packets addressed to it, and broadcasts flushed
    /// while it is attached, arrive on the returned receiver.
    pub async fn attach(&self, actor: impl Into<ActorId>) -> mpsc::UnboundedReceiver<WirePacket> {
        let actor = actor.into();
        let (tx, rx) = mpsc::unbounded_channel();
        debug!("actor '{}' attached to memory transport", actor);
        self.peers.lock().await.insert(actor, tx);
        rx
    }

    /// Detach an actor; later sends to it are dropped
    pub async fn detach(&self, actor: &ActorId) {
        if self.peers.lock().await.remove(actor).is_some() {
            debug!("actor '{}' detached from memory transport", actor);
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, destination: Destination, packet: WirePacket) {
        let peers = self.peers.lock().await;
        match destination {
            Destination::Broadcast => {
                for (actor, tx) in peers.iter() {
                    if tx.send(packet.clone()).is_err() {
                        trace!("broadcast to '{}' dropped, receiver gone", actor);
                    }
                }
            }
            Destination::Actor(actor) => match peers.get(&actor) {
                Some(tx) => {
                    if tx.send(packet).is_err() {
                        trace!("send to '{}' dropped, receiver gone", actor);
                    }
                }
                None => debug!("dropping packet for detached actor '{}'", actor),
            },
        }
    }
}
