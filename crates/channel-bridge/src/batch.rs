//! Outgoing batch queue with a periodic flush
//!
//! Messages sent with the batch option land here instead of going straight
//! to the transport. A background task (spawned by
//! [`crate::ChannelRegistry::start`]) drains every destination queue on a
//! fixed interval, grouping entries by channel and preserving FIFO order
//! within each (channel, destination) pair. No ordering is guaranteed
//! across channels or across destinations.

use crate::transport::{Transport, WirePacket};
use bridge_core::{ActorId, Destination, PacketMetadata};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// One queued outgoing message
#[derive(Debug, Clone)]
pub struct OutgoingBatchEntry {
    pub channel: String,
    pub packet_type: String,
    pub payload: Value,
    pub metadata: PacketMetadata,
}

impl OutgoingBatchEntry {
    fn into_wire(self) -> WirePacket {
        WirePacket {
            channel: self.channel,
            packet_type: self.packet_type,
            payload: self.payload,
            metadata: self.metadata,
        }
    }
}

/// Per-destination queues drained by the periodic flush
///
/// Broadcast entries keep [`Destination::Broadcast`] as their key until
/// flush: expansion to the currently connected peers happens in the
/// transport at delivery time, so an actor connecting between enqueue and
/// flush still receives the broadcast.
#[derive(Default)]
pub struct BatchQueue {
    queues: Mutex<HashMap<Destination, Vec<OutgoingBatchEntry>>>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, destination: Destination, entry: OutgoingBatchEntry) {
        trace!(
            "queueing [{}] {} for {:?}",
            entry.channel, entry.packet_type, destination
        );
        let mut queues = self.queues.lock().await;
        queues.entry(destination).or_default().push(entry);
    }

    /// Discard everything queued for a disconnected actor, silently
    pub async fn drop_destination(&self, actor: &ActorId) {
        let mut queues = self.queues.lock().await;
        if let Some(dropped) = queues.remove(&Destination::Actor(actor.clone())) {
            debug!(
                "dropping {} queued entries for disconnected actor '{}'",
                dropped.len(),
                actor
            );
        }
    }

    /// Number of entries currently queued across all destinations
    pub async fn pending(&self) -> usize {
        self.queues.lock().await.values().map(Vec::len).sum()
    }

    /// Drain every destination queue into the transport
    ///
    /// Entries for one destination are partitioned by channel (first-seen
    /// channel order) and sent FIFO within each channel. The lock is not
    /// held across transport sends.
    pub async fn flush_all(&self, transport: &dyn Transport) {
        let drained: Vec<(Destination, Vec<OutgoingBatchEntry>)> = {
            let mut queues = self.queues.lock().await;
            queues.drain().collect()
        };

        for (destination, entries) in drained {
            let mut channel_order: Vec<String> = Vec::new();
            let mut by_channel: HashMap<String, Vec<OutgoingBatchEntry>> = HashMap::new();
            for entry in entries {
                if !by_channel.contains_key(&entry.channel) {
                    channel_order.push(entry.channel.clone());
                }
                by_channel.entry(entry.channel.clone()).or_default().push(entry);
            }

            for channel in channel_order {
                if let Some(batch) = by_channel.remove(&channel) {
                    trace!(
                        "flushing {} entries on [{}] to {:?}",
                        batch.len(),
                        channel,
                        destination
                    );
                    for entry in batch {
                        transport.send(destination.clone(), entry.into_wire()).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_core::Priority;
    use serde_json::json;

    struct RecordingTransport {
        sent: Mutex<Vec<(Destination, WirePacket)>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        async fn take(&self) -> Vec<(Destination, WirePacket)> {
            self.sent.lock().await.drain(..).collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, destination: Destination, packet: WirePacket) {
            self.sent.lock().await.push((destination, packet));
        }
    }

    fn entry(channel: &str, packet_type: &str, payload: Value) -> OutgoingBatchEntry {
        OutgoingBatchEntry {
            channel: channel.to_string(),
            packet_type: packet_type.to_string(),
            payload,
            metadata: PacketMetadata {
                timestamp_ms: 0,
                priority: Priority::Normal,
                compressed: false,
            },
        }
    }

    #[tokio::test]
    async fn fifo_within_channel_and_destination() {
        let queue = BatchQueue::new();
        let transport = RecordingTransport::new();
        let dest = Destination::Actor("player-1".to_string());
        let other = Destination::Actor("player-2".to_string());

        // Interleave another destination between A, B, C
        queue.enqueue(dest.clone(), entry("Economy", "Tick", json!("A"))).await;
        queue.enqueue(other.clone(), entry("Economy", "Tick", json!("X"))).await;
        queue.enqueue(dest.clone(), entry("Economy", "Tick", json!("B"))).await;
        queue.enqueue(other.clone(), entry("Economy", "Tick", json!("Y"))).await;
        queue.enqueue(dest.clone(), entry("Economy", "Tick", json!("C"))).await;

        queue.flush_all(&transport).await;

        let sent = transport.take().await;
        let for_dest: Vec<&Value> = sent
            .iter()
            .filter(|(d, _)| *d == dest)
            .map(|(_, p)| &p.payload)
            .collect();
        assert_eq!(for_dest, vec![&json!("A"), &json!("B"), &json!("C")]);
        assert_eq!(sent.len(), 5);
    }

    #[tokio::test]
    async fn entries_grouped_by_channel() {
        let queue = BatchQueue::new();
        let transport = RecordingTransport::new();
        let dest = Destination::Actor("player-1".to_string());

        queue.enqueue(dest.clone(), entry("Economy", "Tick", json!(1))).await;
        queue.enqueue(dest.clone(), entry("Effects", "Spark", json!(2))).await;
        queue.enqueue(dest.clone(), entry("Economy", "Tick", json!(3))).await;
        queue.enqueue(dest.clone(), entry("Effects", "Spark", json!(4))).await;

        queue.flush_all(&transport).await;

        let channels: Vec<String> = transport
            .take()
            .await
            .into_iter()
            .map(|(_, p)| format!("{}:{}", p.channel, p.payload))
            .collect();
        // One contiguous run per channel, FIFO inside each run
        assert_eq!(
            channels,
            vec!["Economy:1", "Economy:3", "Effects:2", "Effects:4"]
        );
    }

    #[tokio::test]
    async fn dropped_destination_never_reaches_transport() {
        let queue = BatchQueue::new();
        let transport = RecordingTransport::new();
        let actor = "player-leaving".to_string();

        queue
            .enqueue(
                Destination::Actor(actor.clone()),
                entry("Economy", "Tick", json!(1)),
            )
            .await;
        assert_eq!(queue.pending().await, 1);

        queue.drop_destination(&actor).await;
        queue.flush_all(&transport).await;

        assert!(transport.take().await.is_empty());
        assert_eq!(queue.pending().await, 0);
    }

    #[tokio::test]
    async fn broadcast_keeps_broadcast_destination_until_flush() {
        let queue = BatchQueue::new();
        let transport = RecordingTransport::new();

        queue
            .enqueue(Destination::Broadcast, entry("Effects", "Spark", json!(1)))
            .await;
        queue.flush_all(&transport).await;

        let sent = transport.take().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Destination::Broadcast);
    }

    #[tokio::test]
    async fn flush_on_empty_queue_is_a_no_op() {
        let queue = BatchQueue::new();
        let transport = RecordingTransport::new();
        queue.flush_all(&transport).await;
        assert!(transport.take().await.is_empty());
    }
}
