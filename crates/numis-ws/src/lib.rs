//! WebSocket connection management for numismatic feeds.
//!
//! Provides:
//! - Handshake with a bounded timeout
//! - Optional post-connect hook (authentication, initial ping)
//! - A `Connection` that yields raw data frames and answers pings

pub mod connection;
pub mod error;

pub use connection::{ConnectHook, Connection, ConnectionConfig, ConnectionManager};
pub use error::{WsError, WsResult};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
