//! Recorder configuration.

use crate::error::{AppError, AppResult};
use numis_capture::CaptureConfig;
use numis_core::Channel;
use numis_feed::ListenerConfig;
use numis_rest::RequesterConfig;
use numis_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional REST provider queried once at startup for reference prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Provider name (e.g., "cryptocompare").
    pub provider: String,
    #[serde(default)]
    pub requester: RequesterConfig,
    /// Assets to price at startup. Empty skips the query.
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
}

fn default_currencies() -> Vec<String> {
    vec!["USD".to_string()]
}

/// Recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Exchange protocol name (e.g., "kraken").
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Symbols to listen to, one listener each.
    pub symbols: Vec<String>,
    /// Channel for every listener. `None` uses the exchange default.
    #[serde(default)]
    pub channel: Channel,
    /// Websocket endpoint override.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_capture")]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default = "default_unsubscribe_timeout_ms")]
    pub unsubscribe_timeout_ms: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub rest: Option<RestConfig>,
}

fn default_exchange() -> String {
    "kraken".to_string()
}

/// Capture is on unless the config disables it.
fn default_capture() -> CaptureConfig {
    CaptureConfig {
        enabled: true,
        ..Default::default()
    }
}

fn default_unsubscribe_timeout_ms() -> u64 {
    5_000
}

fn default_event_buffer() -> usize {
    1_024
}

impl RecorderConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.symbols.is_empty() {
            return Err(AppError::Config("At least one symbol is required".to_string()));
        }
        if let Some(blank) = self.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(AppError::Config(format!("Invalid symbol {blank:?}")));
        }
        Ok(())
    }

    /// Per-listener settings derived from this config.
    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            connection: self.connection.clone(),
            capture: self.capture.clone(),
            unsubscribe_timeout_ms: self.unsubscribe_timeout_ms,
            event_buffer: self.event_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_minimal_config_defaults() {
        let config = RecorderConfig::from_toml(r#"symbols = ["ETHUSD"]"#).unwrap();
        assert_eq!(config.exchange, "kraken");
        assert_eq!(config.symbols, vec!["ETHUSD"]);
        assert!(config.channel.is_none());
        assert!(config.endpoint.is_none());
        assert!(config.capture.enabled);
        assert_eq!(config.capture.interval_ms, 1_000);
        assert_eq!(config.connection.connect_timeout_ms, 10_000);
        assert_eq!(config.unsubscribe_timeout_ms, 5_000);
        assert!(config.rest.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = RecorderConfig::from_toml(
            r#"
            exchange = "kraken"
            symbols = ["BTC/USD", "eth-usd"]
            channel = "ticker"
            endpoint = "wss://ws.example.com/v2"
            unsubscribe_timeout_ms = 2000

            [capture]
            enabled = true
            directory = "/data/raw"
            interval_ms = 500

            [connection]
            connect_timeout_ms = 3000

            [rest]
            provider = "cryptocompare"
            assets = ["BTC", "ETH"]

            [rest.requester]
            kind = "http"
            timeout_ms = 4000
            "#,
        )
        .unwrap();

        assert_eq!(config.channel.as_deref(), Some("ticker"));
        assert_eq!(config.capture.directory, Some(PathBuf::from("/data/raw")));

        let listener = config.listener_config();
        assert_eq!(listener.unsubscribe_timeout_ms, 2_000);
        assert_eq!(listener.capture.interval_ms, 500);
        assert_eq!(listener.connection.connect_timeout_ms, 3_000);
        assert!(listener.connection.tcp_nodelay);

        let rest = config.rest.unwrap();
        assert_eq!(rest.currencies, vec!["USD"]);
        assert_eq!(
            rest.requester,
            RequesterConfig::Http {
                timeout_ms: 4_000,
                user_agent: None
            }
        );
    }

    #[test]
    fn test_empty_symbols_rejected() {
        assert!(matches!(
            RecorderConfig::from_toml("symbols = []"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            RecorderConfig::from_toml(r#"symbols = ["BTC", " "]"#),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"symbols = ["ETHUSD"]"#).unwrap();
        let config = RecorderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.symbols, vec!["ETHUSD"]);

        let missing = RecorderConfig::from_file("/nonexistent/numis.toml");
        assert!(matches!(missing, Err(AppError::Config(msg)) if msg.contains("Failed to read")));
    }
}
