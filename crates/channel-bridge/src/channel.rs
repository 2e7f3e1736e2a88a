//! The per-domain channel façade
//!
//! One channel exists per named messaging domain ("Economy", "Effects", ...)
//! and owns that domain's packet definitions and receive handlers. Rate
//! limiters and the batch queue are shared bridge-wide and injected by the
//! registry.

use crate::batch::{BatchQueue, OutgoingBatchEntry};
use crate::rate_limit::{RateKey, RateLimiterService};
use crate::transport::{Transport, WirePacket};
use bridge_core::{
    ActorId, BridgeError, Destination, PacketConfig, PacketDefinition, PacketMetadata, Result,
};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Receive handler: (sender, packet type, payload)
///
/// `sender` is None for packets arriving without an actor identity.
pub type Handler = Arc<dyn Fn(Option<&ActorId>, &str, &Value) + Send + Sync>;

/// Options for [`Channel::send`]
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub destination: Destination,
    /// Defer through the batch queue instead of sending immediately
    pub batch: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            destination: Destination::Broadcast,
            batch: false,
        }
    }
}

impl SendOptions {
    /// Immediate send to one actor
    pub fn to_actor(actor: impl Into<ActorId>) -> Self {
        Self {
            destination: Destination::Actor(actor.into()),
            batch: false,
        }
    }

    pub fn batched(mut self) -> Self {
        self.batch = true;
        self
    }
}

/// Token returned by [`Channel::connect`]; dropping it changes nothing,
/// calling [`unsubscribe`](Self::unsubscribe) removes the handler
pub struct HandlerHandle {
    id: u64,
    handlers: Arc<RwLock<Vec<(u64, Handler)>>>,
}

impl HandlerHandle {
    /// Remove the handler; later dispatches skip it
    pub async fn unsubscribe(self) {
        let mut handlers = self.handlers.write().await;
        handlers.retain(|(id, _)| *id != self.id);
    }
}

/// A named messaging domain bound to one transport connection
///
/// Created once per name through [`crate::ChannelRegistry::get`] and never
/// destroyed; its lifetime is the process's, not a connection's.
pub struct Channel {
    name: String,
    packets: RwLock<HashMap<String, PacketDefinition>>,
    handlers: Arc<RwLock<Vec<(u64, Handler)>>>,
    next_handler_id: AtomicU64,
    outbound: Arc<RateLimiterService>,
    inbound: Arc<RateLimiterService>,
    batch: Arc<BatchQueue>,
    transport: Arc<dyn Transport>,
}

impl Channel {
    pub(crate) fn new(
        name: &str,
        outbound: Arc<RateLimiterService>,
        inbound: Arc<RateLimiterService>,
        batch: Arc<BatchQueue>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.to_string(),
            packets: RwLock::new(HashMap::new()),
            handlers: Arc::new(RwLock::new(Vec::new())),
            next_handler_id: AtomicU64::new(0),
            outbound,
            inbound,
            batch,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a packet type on this channel
    ///
    /// Redefining an existing type is an error: a duplicated or typo'd
    /// define is a programming defect that must surface during development,
    /// the same policy as sending an undefined type.
    pub async fn define(&self, packet_type: &str, config: PacketConfig) -> Result<()> {
        let mut packets = self.packets.write().await;
        if packets.contains_key(packet_type) {
            return Err(BridgeError::PacketAlreadyDefined(packet_type.to_string()));
        }
        debug!("[{}] defined packet type '{}'", self.name, packet_type);
        packets.insert(
            packet_type.to_string(),
            PacketDefinition::new(packet_type, config),
        );
        Ok(())
    }

    /// Look up a packet definition
    pub async fn definition(&self, packet_type: &str) -> Result<PacketDefinition> {
        self.packets
            .read()
            .await
            .get(packet_type)
            .cloned()
            .ok_or_else(|| BridgeError::UndefinedPacket(packet_type.to_string()))
    }

    /// Register a receive handler. Handlers run in registration order and
    /// are never deduplicated; use the returned handle to unsubscribe.
    pub async fn connect<F>(&self, handler: F) -> HandlerHandle
    where
        F: Fn(Option<&ActorId>, &str, &Value) + Send + Sync + 'static,
    {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().await.push((id, Arc::new(handler)));
        HandlerHandle {
            id,
            handlers: self.handlers.clone(),
        }
    }

    /// Send one message
    ///
    /// Returns `Err` only for an undefined packet type. Validation failures
    /// and outbound rate-limit hits drop the message with a log entry and
    /// return `Ok(false)`, so callers can layer retry or backoff without
    /// error-handling overhead.
    pub async fn send(&self, packet_type: &str, payload: Value, options: SendOptions) -> Result<bool> {
        let def = self.definition(packet_type).await?;

        if !def.validate(&payload) {
            warn!(
                "[{}] outgoing '{}' failed validation, dropping",
                self.name, packet_type
            );
            return Ok(false);
        }

        // Advisory self-limit; the receiving side runs the authoritative check
        let key = RateKey::local(&self.name, packet_type);
        if !self.outbound.check_and_consume(&key, def.rate_limit).await {
            warn!(
                "[{}] outbound rate limit hit for '{}', dropping",
                self.name, packet_type
            );
            return Ok(false);
        }

        let metadata = self.metadata_for(&def, &payload);
        if options.batch {
            self.batch
                .enqueue(
                    options.destination,
                    OutgoingBatchEntry {
                        channel: self.name.clone(),
                        packet_type: packet_type.to_string(),
                        payload,
                        metadata,
                    },
                )
                .await;
        } else {
            self.transport
                .send(
                    options.destination,
                    WirePacket {
                        channel: self.name.clone(),
                        packet_type: packet_type.to_string(),
                        payload,
                        metadata,
                    },
                )
                .await;
        }
        Ok(true)
    }

    /// Deliver a received packet to this channel's handlers
    ///
    /// Every rejection path here drops silently with a log entry: a received
    /// unknown type, a rate-limit hit, or a failing validator are untrusted
    /// input conditions, and a remote peer must never be able to raise into
    /// the local process. The validator runs again even though the sender
    /// already validated, since the payload may have been tampered with in
    /// transit.
    pub async fn dispatch(&self, sender: Option<ActorId>, packet_type: &str, payload: Value) {
        let def = match self.packets.read().await.get(packet_type).cloned() {
            Some(def) => def,
            None => {
                warn!(
                    "[{}] received undefined packet type '{}', dropping",
                    self.name, packet_type
                );
                return;
            }
        };

        // Authoritative inbound check, keyed by the sending actor
        let key = match &sender {
            Some(actor) => RateKey::remote(&self.name, actor, packet_type),
            None => RateKey::local(&self.name, packet_type),
        };
        if !self.inbound.check_and_consume(&key, def.rate_limit).await {
            warn!(
                "[{}] inbound rate limit hit for '{}' from {:?}, dropping",
                self.name, packet_type, sender
            );
            return;
        }

        if !def.validate(&payload) {
            warn!(
                "[{}] incoming '{}' failed validation, dropping",
                self.name, packet_type
            );
            return;
        }

        // Each handler runs as its own task so a slow or panicking handler
        // cannot stall siblings, later dispatches, or other channels
        let handlers: Vec<(u64, Handler)> = self.handlers.read().await.clone();
        for (id, handler) in handlers {
            let sender = sender.clone();
            let packet_type = packet_type.to_string();
            let payload = payload.clone();
            let channel = self.name.clone();
            tokio::spawn(async move {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    handler(sender.as_ref(), &packet_type, &payload)
                }));
                if outcome.is_err() {
                    error!(
                        "[{}] handler {} panicked on '{}'",
                        channel, id, packet_type
                    );
                }
            });
        }
    }

    fn metadata_for(&self, def: &PacketDefinition, payload: &Value) -> PacketMetadata {
        let size = serde_json::to_vec(payload).map(|b| b.len()).unwrap_or(0);
        PacketMetadata {
            timestamp_ms: epoch_ms(),
            priority: def.priority,
            compressed: size >= def.compression_threshold,
        }
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
