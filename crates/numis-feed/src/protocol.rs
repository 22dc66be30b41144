//! Per-exchange subscription protocol.

use crate::error::FeedResult;
use numis_core::{NormalizedEvent, RawPacket, Symbol};
use numis_ws::ConnectHook;
use serde::{Deserialize, Serialize};

/// Exchange-specific metadata needed to unsubscribe later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub symbol: Symbol,
    /// Resolved channel name (exchange default when none was requested).
    pub channel: String,
    /// Free-form protocol data, e.g. the exchange's pair notation.
    #[serde(default)]
    pub extras: serde_json::Value,
}

impl ChannelInfo {
    pub fn new(symbol: Symbol, channel: impl Into<String>) -> Self {
        Self {
            symbol,
            channel: channel.into(),
            extras: serde_json::Value::Null,
        }
    }

    pub fn with_extras(mut self, extras: serde_json::Value) -> Self {
        self.extras = extras;
        self
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A subscribe message and the channel it opens.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRequest {
    pub message: String,
    pub info: ChannelInfo,
}

/// Builds subscribe / unsubscribe requests and decodes inbound packets for
/// one exchange.
///
/// Implementations are stateless with respect to any single connection and
/// are shared between listeners.
pub trait SubscriptionProtocol: Send + Sync {
    /// Exchange name used in capture filenames, logs and events.
    fn exchange(&self) -> &str;

    fn default_endpoint(&self) -> &str;

    /// Hook run right after the handshake (authentication, initial ping).
    fn connect_hook(&self) -> Option<&dyn ConnectHook> {
        None
    }

    fn build_subscribe_request(
        &self,
        symbol: &Symbol,
        channel: Option<&str>,
    ) -> FeedResult<ChannelRequest>;

    /// `None` means unsubscribing is a no-op, considered confirmed at once.
    fn build_unsubscribe_request(&self, _info: &ChannelInfo) -> Option<String> {
        None
    }

    fn is_unsubscribe_confirmation(&self, _packet: &RawPacket, _info: &ChannelInfo) -> bool {
        true
    }

    /// Decode one packet.
    ///
    /// `Ok(None)` means the packet carries no data for `symbol` (heartbeats,
    /// acks, status). `Err` means the packet is malformed.
    fn decode(&self, packet: &RawPacket, symbol: &Symbol)
        -> FeedResult<Option<NormalizedEvent>>;

    /// Decode every event carried by one packet.
    ///
    /// Exchanges that batch several trades per frame override this; the
    /// default yields at most the single event from [`decode`](Self::decode).
    fn decode_all(&self, packet: &RawPacket, symbol: &Symbol) -> FeedResult<Vec<NormalizedEvent>> {
        Ok(self.decode(packet, symbol)?.into_iter().collect())
    }
}
