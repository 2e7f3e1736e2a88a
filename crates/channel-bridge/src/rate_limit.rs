//! Fixed-window rate limiting keyed by (channel, actor, packet type)
//!
//! A running bridge holds two independent services: an advisory outbound
//! one that keeps the local side from spamming its own connection, and the
//! authoritative inbound one applied to everything received. Only the
//! inbound check matters for abuse protection; a modified remote client can
//! always skip its own outbound check.

use bridge_core::ActorId;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Length of one rate-limit window. Fixed, not sliding: bursts at window
/// boundaries are possible by design.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// The actor half of a rate key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateActor {
    /// The local endpoint: outbound self-limiting, or senderless inbound
    Local,
    /// A remote peer
    Remote(ActorId),
}

/// Structured key for one rate window
///
/// A tuple rather than a concatenated string, so similarly named
/// channel/packet/actor combinations cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub channel: String,
    pub actor: RateActor,
    pub packet_type: String,
}

impl RateKey {
    pub fn local(channel: &str, packet_type: &str) -> Self {
        Self {
            channel: channel.to_string(),
            actor: RateActor::Local,
            packet_type: packet_type.to_string(),
        }
    }

    pub fn remote(channel: &str, actor: &ActorId, packet_type: &str) -> Self {
        Self {
            channel: channel.to_string(),
            actor: RateActor::Remote(actor.clone()),
            packet_type: packet_type.to_string(),
        }
    }
}

struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Process-wide fixed-window counters, shared by every channel
///
/// Check-and-consume is a read-modify-write sequence, so the whole map sits
/// behind one async mutex.
#[derive(Default)]
pub struct RateLimiterService {
    windows: Mutex<HashMap<RateKey, RateWindow>>,
}

impl RateLimiterService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or deny one message. Denial consumes nothing from the window.
    pub async fn check_and_consume(&self, key: &RateKey, limit: u32) -> bool {
        self.check_and_consume_at(key, limit, Instant::now()).await
    }

    /// Clock-injected variant of [`check_and_consume`](Self::check_and_consume)
    pub async fn check_and_consume_at(&self, key: &RateKey, limit: u32, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(key.clone()).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });

        if now.duration_since(window.window_start) > RATE_WINDOW {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= limit {
            return false;
        }
        window.count += 1;
        true
    }

    /// Drop every window belonging to a disconnected actor
    ///
    /// Without this the map grows without bound across a long-running
    /// process with many transient actors.
    pub async fn purge_actor(&self, actor: &ActorId) {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|key, _| !matches!(&key.actor, RateActor::Remote(a) if a == actor));
        let purged = before - windows.len();
        if purged > 0 {
            debug!("purged {} rate windows for actor '{}'", purged, actor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limit_boundary() {
        let limiter = RateLimiterService::new();
        let key = RateKey::remote("Economy", &"player-1".to_string(), "PurchaseItem");
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_and_consume_at(&key, 5, start).await);
        }
        // Sixth call in the same window is denied
        assert!(!limiter.check_and_consume_at(&key, 5, start).await);
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiterService::new();
        let key = RateKey::local("Effects", "PlaySound");
        let start = Instant::now();

        assert!(limiter.check_and_consume_at(&key, 1, start).await);
        assert!(!limiter.check_and_consume_at(&key, 1, start).await);

        // 61 seconds later the window is stale: count resets and the call
        // is admitted as the first of a fresh window
        let later = start + Duration::from_secs(61);
        assert!(limiter.check_and_consume_at(&key, 1, later).await);
        assert!(!limiter.check_and_consume_at(&key, 1, later).await);
    }

    #[tokio::test]
    async fn denial_consumes_nothing() {
        let limiter = RateLimiterService::new();
        let key = RateKey::local("Economy", "PurchaseItem");
        let start = Instant::now();

        assert!(limiter.check_and_consume_at(&key, 1, start).await);
        // Repeated denials must not push the count past the limit
        for _ in 0..10 {
            assert!(!limiter.check_and_consume_at(&key, 1, start).await);
        }
        let later = start + Duration::from_secs(61);
        assert!(limiter.check_and_consume_at(&key, 1, later).await);
    }

    #[tokio::test]
    async fn purge_forgets_actor_history() {
        let limiter = RateLimiterService::new();
        let actor = "player-2".to_string();
        let key = RateKey::remote("Economy", &actor, "PurchaseItem");
        let start = Instant::now();

        assert!(limiter.check_and_consume_at(&key, 1, start).await);
        assert!(!limiter.check_and_consume_at(&key, 1, start).await);

        limiter.purge_actor(&actor).await;

        // Behaves as if no prior history existed
        assert!(limiter.check_and_consume_at(&key, 1, start).await);
    }

    #[tokio::test]
    async fn purge_leaves_other_keys_alone() {
        let limiter = RateLimiterService::new();
        let gone = "player-gone".to_string();
        let stays = "player-stays".to_string();
        let start = Instant::now();

        let gone_key = RateKey::remote("Economy", &gone, "PurchaseItem");
        let stays_key = RateKey::remote("Economy", &stays, "PurchaseItem");
        let local_key = RateKey::local("Economy", "PurchaseItem");

        assert!(limiter.check_and_consume_at(&gone_key, 1, start).await);
        assert!(limiter.check_and_consume_at(&stays_key, 1, start).await);
        assert!(limiter.check_and_consume_at(&local_key, 1, start).await);

        limiter.purge_actor(&gone).await;

        assert!(limiter.check_and_consume_at(&gone_key, 1, start).await);
        assert!(!limiter.check_and_consume_at(&stays_key, 1, start).await);
        assert!(!limiter.check_and_consume_at(&local_key, 1, start).await);
    }

    #[tokio::test]
    async fn keys_are_independent_per_packet_type() {
        let limiter = RateLimiterService::new();
        let start = Instant::now();
        let buy = RateKey::local("Economy", "PurchaseItem");
        let sell = RateKey::local("Economy", "SellItem");

        assert!(limiter.check_and_consume_at(&buy, 1, start).await);
        assert!(!limiter.check_and_consume_at(&buy, 1, start).await);
        // Different packet type, fresh window
        assert!(limiter.check_and_consume_at(&sell, 1, start).await);
    }
}
