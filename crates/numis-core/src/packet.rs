//! Raw wire packets.

use std::borrow::Cow;

/// One message received over the websocket transport, before decoding.
///
/// The payload is never modified after receipt. Arrival order is implied by
/// the order in which packets are handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPacket {
    Text(String),
    Binary(Vec<u8>),
}

impl RawPacket {
    /// Packet content as text.
    ///
    /// Binary frames are rendered as lossy UTF-8.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_str()),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse the payload as JSON.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Text(text) => serde_json::from_str(text),
            Self::Binary(bytes) => serde_json::from_slice(bytes),
        }
    }
}

impl From<String> for RawPacket {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawPacket {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RawPacket {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}
