//! Construction of protocols and REST providers by name.

use crate::error::{FeedError, FeedResult};
use crate::kraken::KrakenProtocol;
use crate::protocol::SubscriptionProtocol;
use numis_rest::{CryptoCompareRest, Requester, RestApi};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Websocket protocols shipped with this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Kraken,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 1] = [ProtocolKind::Kraken];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Kraken => "kraken",
        }
    }

    pub fn build(&self) -> Arc<dyn SubscriptionProtocol> {
        match self {
            Self::Kraken => Arc::new(KrakenProtocol::new()),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| FeedError::UnknownExchange(name.to_string()))
    }
}

/// Build the protocol registered under `name` (case-insensitive).
pub fn protocol_from_name(name: &str) -> FeedResult<Arc<dyn SubscriptionProtocol>> {
    Ok(name.parse::<ProtocolKind>()?.build())
}

/// REST providers shipped with this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestProviderKind {
    CryptoCompare,
}

impl RestProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CryptoCompare => "cryptocompare",
        }
    }

    pub fn build(&self, requester: Arc<dyn Requester>) -> Arc<dyn RestApi> {
        match self {
            Self::CryptoCompare => Arc::new(CryptoCompareRest::new(requester)),
        }
    }
}

impl FromStr for RestProviderKind {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cryptocompare" => Ok(Self::CryptoCompare),
            other => Err(FeedError::UnknownExchange(other.to_string())),
        }
    }
}

/// Build the REST provider registered under `name`, using `requester`.
pub fn rest_from_name(name: &str, requester: Arc<dyn Requester>) -> FeedResult<Arc<dyn RestApi>> {
    Ok(name.parse::<RestProviderKind>()?.build(requester))
}

#[cfg(test)]
mod tests {
    use super::*;
    use numis_rest::FixtureRequester;

    #[test]
    fn test_protocol_from_name() {
        let protocol = protocol_from_name("Kraken").unwrap();
        assert_eq!(protocol.exchange(), "kraken");
        assert_eq!(protocol.default_endpoint(), "wss://ws.kraken.com/v2");
    }

    #[test]
    fn test_unknown_exchange() {
        assert!(matches!(
            protocol_from_name("mtgox"),
            Err(FeedError::UnknownExchange(name)) if name == "mtgox"
        ));
    }

    #[test]
    fn test_protocol_kind_serde() {
        let kind: ProtocolKind = serde_json::from_str(r#""kraken""#).unwrap();
        assert_eq!(kind, ProtocolKind::Kraken);
        assert_eq!(kind.to_string(), "kraken");
    }

    #[test]
    fn test_rest_from_name() {
        let rest = rest_from_name("CryptoCompare", Arc::new(FixtureRequester::default())).unwrap();
        assert_eq!(rest.name(), "cryptocompare");
        assert!(rest_from_name("nope", Arc::new(FixtureRequester::default())).is_err());
    }
}
