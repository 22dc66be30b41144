//! Kraken websocket v2 protocol (`ticker` and `trade` channels).
//!
//! Message shapes:
//! - Requests: `{"method":"subscribe","params":{"channel":"trade","symbol":["BTC/USD"]}}`
//! - Acks: `{"method":"subscribe"|"unsubscribe","success":true,"result":{...}}`
//! - Data: `{"channel":"trade","type":"update","data":[{...}, ...]}`
//! - Keepalive: `{"channel":"heartbeat"}`, `{"channel":"status",...}`

use crate::error::{FeedError, FeedResult};
use crate::protocol::{ChannelInfo, ChannelRequest, SubscriptionProtocol};
use chrono::{DateTime, Utc};
use numis_core::{NormalizedEvent, RawPacket, Symbol, TradeSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{debug, warn};

pub const EXCHANGE: &str = "kraken";
pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com/v2";

const DEFAULT_CHANNEL: &str = "trade";
const SUPPORTED_CHANNELS: [&str; 2] = ["ticker", "trade"];

/// Kraken pair notation (`BASE/QUOTE`) for a symbol.
///
/// `BTC/USD`, `BTC-USD` and `BTC_USD` map to `BTC/USD`; a six letter
/// symbol such as `ETHUSD` is split 3/3. Other concatenated symbols
/// (`DOGEUSDT`) are ambiguous and passed through unchanged; Kraken rejects
/// them, which ends the listener with a decode error.
pub fn kraken_pair(symbol: &Symbol) -> String {
    let raw = symbol.as_str();
    if raw.contains('/') {
        return raw.to_string();
    }
    if let Some((base, quote)) = raw.split_once(['-', '_']) {
        return format!("{base}/{quote}");
    }
    if raw.len() == 6 && raw.is_ascii() {
        return format!("{}/{}", &raw[..3], &raw[3..]);
    }
    raw.to_string()
}

fn request_error(message: &Value) -> &str {
    message
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("unknown")
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    symbol: String,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    bid: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    ask: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    last: Option<Decimal>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TradeEntry {
    symbol: String,
    #[serde(default)]
    side: String,
    #[serde(deserialize_with = "de_decimal")]
    price: Decimal,
    #[serde(deserialize_with = "de_decimal")]
    qty: Decimal,
    timestamp: DateTime<Utc>,
}

/// Kraken sends prices as JSON numbers. Going through the number's text
/// keeps them exact.
fn decimal_from_value(value: &Value) -> Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(format!("expected a number, got {other}")),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| format!("invalid decimal {text:?}: {e}"))
}

fn de_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value).map_err(serde::de::Error::custom)
}

fn de_opt_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decimal_from_value(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Default, Clone)]
pub struct KrakenProtocol;

impl KrakenProtocol {
    pub fn new() -> Self {
        Self
    }

    fn request(method: &str, channel: &str, pair: &str) -> String {
        json!({
            "method": method,
            "params": {"channel": channel, "symbol": [pair]},
        })
        .to_string()
    }

    fn parse(&self, packet: &RawPacket) -> FeedResult<Value> {
        let value = packet
            .to_json()
            .map_err(|e| FeedError::decode(EXCHANGE, format!("invalid JSON: {e}")))?;
        if !value.is_object() {
            return Err(FeedError::decode(EXCHANGE, "expected a JSON object"));
        }
        Ok(value)
    }

    fn decode_tickers(&self, message: Value, pair: &str, symbol: &Symbol) -> FeedResult<Vec<NormalizedEvent>> {
        let envelope: DataEnvelope<TickerEntry> = serde_json::from_value(message)
            .map_err(|e| FeedError::decode(EXCHANGE, format!("ticker: {e}")))?;
        debug!(kind = ?envelope.kind, entries = envelope.data.len(), "Ticker message");

        Ok(envelope
            .data
            .into_iter()
            .filter(|entry| entry.symbol.eq_ignore_ascii_case(pair))
            .map(|entry| NormalizedEvent::Ticker {
                exchange: EXCHANGE.to_string(),
                symbol: symbol.clone(),
                bid: entry.bid,
                ask: entry.ask,
                last: entry.last,
                timestamp: entry.timestamp.unwrap_or_else(Utc::now),
            })
            .collect())
    }

    fn decode_trades(&self, message: Value, pair: &str, symbol: &Symbol) -> FeedResult<Vec<NormalizedEvent>> {
        let envelope: DataEnvelope<TradeEntry> = serde_json::from_value(message)
            .map_err(|e| FeedError::decode(EXCHANGE, format!("trade: {e}")))?;

        Ok(envelope
            .data
            .into_iter()
            .filter(|entry| entry.symbol.eq_ignore_ascii_case(pair))
            .map(|entry| NormalizedEvent::Trade {
                exchange: EXCHANGE.to_string(),
                symbol: symbol.clone(),
                price: entry.price,
                volume: entry.qty,
                side: TradeSide::from_tag(&entry.side),
                timestamp: entry.timestamp,
            })
            .collect())
    }
}

impl SubscriptionProtocol for KrakenProtocol {
    fn exchange(&self) -> &str {
        EXCHANGE
    }

    fn default_endpoint(&self) -> &str {
        KRAKEN_WS_URL
    }

    fn build_subscribe_request(
        &self,
        symbol: &Symbol,
        channel: Option<&str>,
    ) -> FeedResult<ChannelRequest> {
        let channel = channel.unwrap_or(DEFAULT_CHANNEL).trim().to_ascii_lowercase();
        if !SUPPORTED_CHANNELS.contains(&channel.as_str()) {
            return Err(FeedError::UnsupportedChannel {
                exchange: EXCHANGE.to_string(),
                channel,
            });
        }

        let pair = kraken_pair(symbol);
        let message = Self::request("subscribe", &channel, &pair);
        let info = ChannelInfo::new(symbol.clone(), channel).with_extras(json!({ "pair": pair }));
        Ok(ChannelRequest { message, info })
    }

    fn build_unsubscribe_request(&self, info: &ChannelInfo) -> Option<String> {
        let pair = info
            .extra_str("pair")
            .map(str::to_string)
            .unwrap_or_else(|| kraken_pair(&info.symbol));
        Some(Self::request("unsubscribe", &info.channel, &pair))
    }

    fn is_unsubscribe_confirmation(&self, packet: &RawPacket, info: &ChannelInfo) -> bool {
        let Ok(value) = packet.to_json() else {
            return false;
        };
        if value.get("method").and_then(Value::as_str) != Some("unsubscribe") {
            return false;
        }

        let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !success {
            // The exchange answered; the subscription is gone either way.
            let error = request_error(&value);
            warn!(
                %error,
                channel = %info.channel,
                "Kraken rejected unsubscribe"
            );
            return true;
        }

        let result = value.get("result");
        let field = |name: &str| result.and_then(|r| r.get(name)).and_then(Value::as_str);
        let channel_matches = field("channel").map_or(true, |c| c == info.channel);
        let symbol_matches = field("symbol").map_or(true, |s| {
            info.extra_str("pair")
                .map_or_else(|| info.symbol.eq_ignore_case(s), |pair| pair.eq_ignore_ascii_case(s))
        });
        channel_matches && symbol_matches
    }

    fn decode(&self, packet: &RawPacket, symbol: &Symbol) -> FeedResult<Option<NormalizedEvent>> {
        Ok(self.decode_all(packet, symbol)?.pop())
    }

    fn decode_all(&self, packet: &RawPacket, symbol: &Symbol) -> FeedResult<Vec<NormalizedEvent>> {
        let message = self.parse(packet)?;

        if let Some(method) = message.get("method").and_then(Value::as_str) {
            let success = message.get("success").and_then(Value::as_bool);
            if success == Some(false) {
                let error = request_error(&message);
                if method == "subscribe" {
                    return Err(FeedError::decode(
                        EXCHANGE,
                        format!("subscribe rejected: {error}"),
                    ));
                }
                warn!(method, %error, "Kraken request failed");
            } else {
                debug!(method, "Kraken ack");
            }
            return Ok(Vec::new());
        }

        let Some(channel) = message.get("channel").and_then(Value::as_str) else {
            return Err(FeedError::decode(
                EXCHANGE,
                "message has neither method nor channel",
            ));
        };

        let pair = kraken_pair(symbol);
        match channel {
            "ticker" => self.decode_tickers(message, &pair, symbol),
            "trade" => self.decode_trades(message, &pair, symbol),
            "heartbeat" | "status" | "pong" => Ok(Vec::new()),
            other => {
                debug!(channel = other, "Ignoring unsubscribed Kraken channel");
                Ok(Vec::new())
            }
        }
    }
}
