//! Symbol and channel identifiers.
//!
//! A `Symbol` is normalized to upper case exactly once, when it is
//! constructed. Equality and hashing are case-sensitive on the normalized
//! form; protocols that receive exchange-cased symbols back on the wire
//! compare with [`Symbol::eq_ignore_case`].

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper-case normalized asset or trading-pair identifier (e.g. "BTC-USD").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalize `raw` into a symbol.
    ///
    /// Surrounding whitespace is trimmed and ASCII letters are upper-cased;
    /// an empty result is rejected.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a symbol as spelled by an exchange.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }

    /// Symbol rendered as a single path component.
    ///
    /// Pair separators such as `/` would otherwise create directories.
    pub fn file_component(&self) -> String {
        self.0.replace(['/', '\\'], "-")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Optional feed sub-type (e.g. "trade", "ticker"). `None` = exchange default.
pub type Channel = Option<String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_uppercases() {
        let symbol = Symbol::new("btc-usd").unwrap();
        assert_eq!(symbol.as_str(), "BTC-USD");
    }

    #[test]
    fn test_symbol_normalization_idempotent() {
        let once = Symbol::new("eth/usd").unwrap();
        let twice = Symbol::new(once.as_str()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(Symbol::new("BTC-USD").unwrap(), Symbol::new("btc-usd").unwrap());
    }

    #[test]
    fn test_symbol_rejects_empty() {
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("   ").is_err());
    }

    #[test]
    fn test_symbol_trims_whitespace() {
        assert_eq!(Symbol::new("  xbt ").unwrap().as_str(), "XBT");
    }

    #[test]
    fn test_symbol_uppercases_ascii_only() {
        let symbol = Symbol::new("straße").unwrap();
        assert_eq!(symbol.as_str(), "STRAßE");
        assert!(symbol.eq_ignore_case("straße"));
    }

    #[test]
    fn test_eq_ignore_case() {
        let symbol = Symbol::new("BTC/USD").unwrap();
        assert!(symbol.eq_ignore_case("btc/usd"));
        assert!(symbol.eq_ignore_case("BTC/USD"));
        assert!(!symbol.eq_ignore_case("ETH/USD"));
    }

    #[test]
    fn test_file_component_replaces_separators() {
        let symbol = Symbol::new("btc/usd").unwrap();
        assert_eq!(symbol.file_component(), "BTC-USD");
        assert_eq!(Symbol::new("ETHUSD").unwrap().file_component(), "ETHUSD");
    }

    #[test]
    fn test_serde_normalizes() {
        let symbol: Symbol = serde_json::from_str("\"eth\"").unwrap();
        assert_eq!(symbol.as_str(), "ETH");
        assert_eq!(serde_json::to_string(&symbol).unwrap(), "\"ETH\"");
        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }
}
