//! Packet definitions and per-message metadata

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Delivery priority hint carried in packet metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Payload validator. Returns false to reject a malformed payload.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Configuration for one packet type, passed to `Channel::define`
#[derive(Clone)]
pub struct PacketConfig {
    /// Max accepted messages per actor per 60-second window
    pub rate_limit: u32,
    /// Optional payload validator; absent means every payload is accepted
    pub validator: Option<Validator>,
    /// Advisory payload size above which the transport is asked to compress
    pub compression_threshold: usize,
    /// Whether loss is acceptable (hint only, the bridge never retransmits)
    pub reliable: bool,
    /// Delivery priority hint
    pub priority: Priority,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            rate_limit: 60,
            validator: None,
            compression_threshold: 1024,
            reliable: true,
            priority: Priority::Normal,
        }
    }
}

impl fmt::Debug for PacketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketConfig")
            .field("rate_limit", &self.rate_limit)
            .field("validator", &self.validator.is_some())
            .field("compression_threshold", &self.compression_threshold)
            .field("reliable", &self.reliable)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Static metadata for one packet type
///
/// Immutable once registered: a channel never redefines or mutates a
/// definition for its lifetime.
#[derive(Clone)]
pub struct PacketDefinition {
    /// Packet type name, unique within its channel
    pub type_name: String,
    pub rate_limit: u32,
    pub validator: Option<Validator>,
    pub compression_threshold: usize,
    pub reliable: bool,
    pub priority: Priority,
}

impl PacketDefinition {
    pub fn new(type_name: impl Into<String>, config: PacketConfig) -> Self {
        Self {
            type_name: type_name.into(),
            rate_limit: config.rate_limit,
            validator: config.validator,
            compression_threshold: config.compression_threshold,
            reliable: config.reliable,
            priority: config.priority,
        }
    }

    /// Run the validator if one is configured. No validator accepts everything.
    pub fn validate(&self, payload: &Value) -> bool {
        self.validator.as_ref().map_or(true, |v| v(payload))
    }
}

impl fmt::Debug for PacketDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketDefinition")
            .field("type_name", &self.type_name)
            .field("rate_limit", &self.rate_limit)
            .field("validator", &self.validator.is_some())
            .field("compression_threshold", &self.compression_threshold)
            .field("reliable", &self.reliable)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Per-message metadata delivered alongside the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketMetadata {
    /// Milliseconds since the Unix epoch at send time
    pub timestamp_ms: u64,
    pub priority: Priority,
    /// Set when the payload crossed the compression threshold; actual
    /// compression is the transport's business
    pub compressed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_validator_accepts_everything() {
        let def = PacketDefinition::new("Ping", PacketConfig::default());
        assert!(def.validate(&json!(null)));
        assert!(def.validate(&json!({"arbitrary": ["shape", 42]})));
    }

    #[test]
    fn validator_rejects() {
        let config = PacketConfig {
            validator: Some(Arc::new(|payload| payload.get("ItemId").is_some())),
            ..Default::default()
        };
        let def = PacketDefinition::new("PurchaseItem", config);

        assert!(def.validate(&json!({"ItemId": "sword"})));
        assert!(!def.validate(&json!({"Wrong": "shape"})));
    }

    #[test]
    fn debug_does_not_require_validator_debug() {
        let config = PacketConfig {
            validator: Some(Arc::new(|_| true)),
            ..Default::default()
        };
        let rendered = format!("{:?}", PacketDefinition::new("Ping", config));
        assert!(rendered.contains("Ping"));
        assert!(rendered.contains("validator: true"));
    }
}
