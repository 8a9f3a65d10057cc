//! Channel state as reported by the `channelsz` monitoring endpoint.
//!
//! A snapshot is decoded fresh on every poll and never merged with an
//! earlier one. The broker omits empty fields, so every field defaults.

use serde::{Deserialize, Serialize};

/// One channel and its subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSnapshot {
    pub name: String,
    #[serde(rename = "msgs")]
    pub msg_count: i64,
    #[serde(rename = "last_seq")]
    pub last_sequence: i64,
    #[serde(rename = "subscriptions")]
    pub subscribers: Vec<SubscriberSnapshot>,
}

/// One subscription on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberSnapshot {
    pub client_id: String,
    /// `durable:group` for durable queue subscriptions.
    pub queue_name: String,
    pub inbox: String,
    pub ack_inbox: String,
    pub is_durable: bool,
    pub is_offline: bool,
    pub is_stalled: bool,
    pub max_inflight: i64,
    pub pending_count: i64,
    pub last_sent: i64,
}

impl ChannelSnapshot {
    /// Decode a `channelsz?channel=..&subs=1` response body.
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}
