//! Core domain types for numismatic market-data feeds.
//!
//! This crate provides the types shared by every feed component:
//! - `Symbol`: Upper-case normalized asset / trading-pair identifier
//! - `RawPacket`: Opaque payload exactly as received from the wire
//! - `NormalizedEvent`: Exchange-independent decoded market data

pub mod error;
pub mod event;
pub mod packet;
pub mod symbol;

pub use error::{CoreError, Result};
pub use event::{NormalizedEvent, TradeSide};
pub use packet::RawPacket;
pub use symbol::{Channel, Symbol};
