//! Websocket client: spawns listeners for one exchange protocol.

use crate::error::FeedResult;
use crate::listener::{FeedListener, ListenHandle, ListenerConfig};
use crate::protocol::SubscriptionProtocol;
use crate::registry::protocol_from_name;
use numis_core::{NormalizedEvent, Symbol};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Clone)]
pub struct WebsocketClient {
    protocol: Arc<dyn SubscriptionProtocol>,
    config: ListenerConfig,
}

impl WebsocketClient {
    pub fn new(protocol: Arc<dyn SubscriptionProtocol>, config: ListenerConfig) -> Self {
        Self { protocol, config }
    }

    /// Client for the protocol registered under `exchange`.
    pub fn for_exchange(exchange: &str, config: ListenerConfig) -> FeedResult<Self> {
        Ok(Self::new(protocol_from_name(exchange)?, config))
    }

    pub fn exchange(&self) -> &str {
        self.protocol.exchange()
    }

    pub fn protocol(&self) -> &Arc<dyn SubscriptionProtocol> {
        &self.protocol
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Build a listener without starting it.
    ///
    /// `symbol` is normalized to upper case.
    pub fn listener(
        &self,
        symbol: &str,
        channel: Option<&str>,
        endpoint: Option<&str>,
    ) -> FeedResult<FeedListener> {
        let symbol = Symbol::new(symbol)?;
        Ok(FeedListener::new(
            self.protocol.clone(),
            self.config.clone(),
            symbol,
            channel.map(str::to_string),
            endpoint.map(str::to_string),
        ))
    }

    /// Start listening to `symbol` on a new task.
    ///
    /// Returns the handle used to stop the listener and the stream of
    /// decoded events. Must be called inside a tokio runtime.
    pub fn listen(
        &self,
        symbol: &str,
        channel: Option<&str>,
        endpoint: Option<&str>,
    ) -> FeedResult<(ListenHandle, mpsc::Receiver<NormalizedEvent>)> {
        let listener = self.listener(symbol, channel, endpoint)?;
        info!(
            exchange = self.exchange(),
            symbol = %listener.symbol(),
            endpoint = listener.endpoint(),
            "Starting listener"
        );
        Ok(listener.spawn())
    }
}

impl std::fmt::Debug for WebsocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebsocketClient")
            .field("exchange", &self.exchange())
            .field("config", &self.config)
            .finish()
    }
}
