//! Process-wide channel registry and background tasks
//!
//! The registry is the single owner of every channel instance plus the
//! shared services behind them: the two rate limiters, the batch queue, and
//! the bound transport. `start` spawns the transport event loop and the
//! periodic batch flush.

use crate::batch::BatchQueue;
use crate::channel::Channel;
use crate::rate_limit::RateLimiterService;
use crate::transport::{Transport, TransportEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Bridge-wide tuning knobs
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How often the batch queue is drained (default: 100 ms)
    pub flush_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(100),
        }
    }
}

/// Process-wide map from channel name to channel instance
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
    outbound: Arc<RateLimiterService>,
    inbound: Arc<RateLimiterService>,
    batch: Arc<BatchQueue>,
    transport: Arc<dyn Transport>,
    config: BridgeConfig,
}

impl ChannelRegistry {
    /// Create a registry bound to a transport, with default configuration
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_config(transport, BridgeConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: BridgeConfig) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            outbound: Arc::new(RateLimiterService::new()),
            inbound: Arc::new(RateLimiterService::new()),
            batch: Arc::new(BatchQueue::new()),
            transport,
            config,
        })
    }

    /// Get or create the channel with the given name. Idempotent: every
    /// call with the same name returns the same instance.
    pub async fn get(&self, name: &str) -> Arc<Channel> {
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get(name) {
            return channel.clone();
        }
        info!("creating channel '{}'", name);
        let channel = Arc::new(Channel::new(
            name,
            self.outbound.clone(),
            self.inbound.clone(),
            self.batch.clone(),
            self.transport.clone(),
        ));
        channels.insert(name.to_string(), channel.clone());
        channel
    }

    /// Spawn the transport event loop and the periodic batch flush
    ///
    /// Returns the sender a concrete transport feeds received packets and
    /// disconnect notifications into. Both tasks live as long as the
    /// process; there is no shutdown path by design.
    pub fn start(self: &Arc<Self>) -> mpsc::UnboundedSender<TransportEvent> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let registry = self.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                registry.handle_event(event).await;
            }
            debug!("transport event channel closed, event loop exiting");
        });

        let registry = self.clone();
        let interval = self.config.flush_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.batch.flush_all(registry.transport.as_ref()).await;
            }
        });

        event_tx
    }

    /// Route one transport event
    ///
    /// Public so embedders driving their own receive loop can bypass
    /// [`start`](Self::start); tests do the same for determinism.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message { sender, packet } => {
                let channel = { self.channels.lock().await.get(&packet.channel).cloned() };
                match channel {
                    Some(channel) => {
                        channel.dispatch(sender, &packet.packet_type, packet.payload).await;
                    }
                    None => warn!(
                        "received packet for unknown channel '{}', dropping",
                        packet.channel
                    ),
                }
            }
            TransportEvent::ActorDisconnected(actor) => {
                debug!("actor '{}' disconnected, purging bridge state", actor);
                self.inbound.purge_actor(&actor).await;
                self.outbound.purge_actor(&actor).await;
                self.batch.drop_destination(&actor).await;
            }
        }
    }

    /// Drain the batch queue immediately, outside the timer
    pub async fn flush_now(&self) {
        self.batch.flush_all(self.transport.as_ref()).await;
    }
}
