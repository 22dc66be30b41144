//! Normalized market-data events.
//!
//! Every exchange protocol decodes its packets into these variants so that
//! downstream consumers never see exchange-specific payloads.

use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
    Unknown,
}

impl TradeSide {
    /// Parse an exchange side tag ("buy"/"b"/"sell"/"s", any case).
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "buy" | "b" | "bid" => Self::Buy,
            "sell" | "s" | "ask" | "a" => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Decoded, exchange-independent representation of a packet's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NormalizedEvent {
    /// An executed trade.
    Trade {
        exchange: String,
        symbol: Symbol,
        price: Decimal,
        volume: Decimal,
        side: TradeSide,
        timestamp: DateTime<Utc>,
    },
    /// Top-of-book / last price snapshot.
    Ticker {
        exchange: String,
        symbol: Symbol,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
        last: Option<Decimal>,
        timestamp: DateTime<Utc>,
    },
}

impl NormalizedEvent {
    pub fn exchange(&self) -> &str {
        match self {
            Self::Trade { exchange, .. } | Self::Ticker { exchange, .. } => exchange,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Trade { symbol, .. } | Self::Ticker { symbol, .. } => symbol,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Trade { timestamp, .. } | Self::Ticker { timestamp, .. } => *timestamp,
        }
    }

    /// Short kind label, used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Trade { .. } => "trade",
            Self::Ticker { .. } => "ticker",
        }
    }

    /// Most representative price carried by the event.
    ///
    /// For tickers: last, else mid of bid/ask, else whichever side exists.
    pub fn price(&self) -> Option<Decimal> {
        match self {
            Self::Trade { price, .. } => Some(*price),
            Self::Ticker { bid, ask, last, .. } => last.or(match (bid, ask) {
                (Some(b), Some(a)) => Some((*b + *a) / Decimal::TWO),
                (Some(b), None) => Some(*b),
                (None, Some(a)) => Some(*a),
                (None, None) => None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker(bid: Option<Decimal>, ask: Option<Decimal>, last: Option<Decimal>) -> NormalizedEvent {
        NormalizedEvent::Ticker {
            exchange: "kraken".to_string(),
            symbol: Symbol::new("ETH/USD").unwrap(),
            bid,
            ask,
            last,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_trade_side_from_tag() {
        assert_eq!(TradeSide::from_tag("buy"), TradeSide::Buy);
        assert_eq!(TradeSide::from_tag("S"), TradeSide::Sell);
        assert_eq!(TradeSide::from_tag("?"), TradeSide::Unknown);
    }

    #[test]
    fn test_ticker_price_prefers_last() {
        let event = ticker(Some(dec!(99)), Some(dec!(101)), Some(dec!(100.5)));
        assert_eq!(event.price(), Some(dec!(100.5)));
    }

    #[test]
    fn test_ticker_price_falls_back_to_mid() {
        let event = ticker(Some(dec!(99)), Some(dec!(101)), None);
        assert_eq!(event.price(), Some(dec!(100)));
        assert_eq!(ticker(None, None, None).price(), None);
    }

    #[test]
    fn test_accessors() {
        let event = NormalizedEvent::Trade {
            exchange: "kraken".to_string(),
            symbol: Symbol::new("xbt/usd").unwrap(),
            price: dec!(50000),
            volume: dec!(0.1),
            side: TradeSide::Buy,
            timestamp: Utc::now(),
        };
        assert_eq!(event.exchange(), "kraken");
        assert_eq!(event.symbol().as_str(), "XBT/USD");
        assert_eq!(event.kind(), "trade");
        assert_eq!(event.price(), Some(dec!(50000)));
    }

    #[test]
    fn test_serde_tagged() {
        let event = ticker(None, None, Some(dec!(1)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "ticker");
        let back: NormalizedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
