//! Feed listener state machine.
//!
//! One listener owns one connection and one subscription:
//!
//! ```text
//! Idle -> Connecting -> Subscribing -> Listening -> Unsubscribing -> Terminated
//! ```
//!
//! Cancellation is cooperative. It is checked at the top of every receive
//! iteration and raced against the wait for the next packet, so an in-flight
//! decode or emit always completes. The unsubscribe phase ignores the token
//! and is bounded by its own timeout.
//!
//! Connection errors and decode errors terminate the listener and are
//! returned from [`FeedListener::run`] / [`ListenHandle::join`]. There is no
//! reconnection here; a supervisor decides whether to listen again.

use crate::error::{FeedError, FeedResult};
use crate::protocol::{ChannelInfo, SubscriptionProtocol};
use numis_capture::{CaptureConfig, CaptureSession, CaptureSink, RawCapture};
use numis_core::{NormalizedEvent, RawPacket, Symbol};
use numis_telemetry::Metrics;
use numis_ws::{Connection, ConnectionConfig, ConnectionManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Upper bound on the wait for an unsubscribe confirmation.
    #[serde(default = "default_unsubscribe_timeout_ms")]
    pub unsubscribe_timeout_ms: u64,
    /// Capacity of the event channel handed to the caller.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_unsubscribe_timeout_ms() -> u64 {
    5_000
}

fn default_event_buffer() -> usize {
    1_024
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            capture: CaptureConfig::default(),
            unsubscribe_timeout_ms: default_unsubscribe_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ListenerConfig {
    pub fn unsubscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.unsubscribe_timeout_ms)
    }
}

/// Listener lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Idle,
    Connecting,
    Subscribing,
    Listening,
    Unsubscribing,
    Terminated,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Listening => "listening",
            Self::Unsubscribing => "unsubscribing",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the unsubscribe phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsubscribeOutcome {
    /// Nothing to unsubscribe: the protocol has no unsubscribe request, or
    /// the listener stopped before subscribing.
    NotRequired,
    Confirmed,
    /// No confirmation within `unsubscribe_timeout_ms`. The exchange-side
    /// subscription may linger.
    TimedOut,
    SendFailed,
    /// The connection closed while waiting for the confirmation.
    ConnectionLost,
}

impl UnsubscribeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Confirmed => "confirmed",
            Self::TimedOut => "timed_out",
            Self::SendFailed => "send_failed",
            Self::ConnectionLost => "connection_lost",
        }
    }
}

impl fmt::Display for UnsubscribeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a listener that stopped on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerSummary {
    pub exchange: String,
    pub symbol: Symbol,
    pub channel: Option<String>,
    pub packets_received: u64,
    pub events_emitted: u64,
    pub unsubscribe: UnsubscribeOutcome,
    /// Capture file, when capture was enabled.
    pub capture_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Counters {
    packets_received: u64,
    events_emitted: u64,
}

/// Why the receive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    ReceiverDropped,
}

/// Per-symbol listener.
pub struct FeedListener {
    protocol: Arc<dyn SubscriptionProtocol>,
    manager: ConnectionManager,
    config: ListenerConfig,
    symbol: Symbol,
    channel: Option<String>,
    endpoint: String,
    cancel: CancellationToken,
    state: watch::Sender<ListenerState>,
}

impl FeedListener {
    /// `endpoint` defaults to the protocol's endpoint.
    pub fn new(
        protocol: Arc<dyn SubscriptionProtocol>,
        config: ListenerConfig,
        symbol: Symbol,
        channel: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| protocol.default_endpoint().to_string());
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            manager: ConnectionManager::new(config.connection.clone()),
            protocol,
            config,
            symbol,
            channel,
            endpoint,
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Token that stops this listener when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Run the listener on a new task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(self) -> (ListenHandle, mpsc::Receiver<NormalizedEvent>) {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let span = info_span!(
            "listener",
            exchange = self.protocol.exchange(),
            symbol = %self.symbol
        );
        let handle = ListenHandle {
            symbol: self.symbol.clone(),
            cancel: self.cancel.clone(),
            state: self.state.subscribe(),
            task: tokio::spawn(self.run(events_tx).instrument(span)),
        };
        (handle, events_rx)
    }

    /// Run the listener to completion, sending decoded events on `events`.
    pub async fn run(self, events: mpsc::Sender<NormalizedEvent>) -> FeedResult<ListenerSummary> {
        let exchange = self.protocol.exchange().to_string();
        Metrics::listener_started(&exchange);

        let mut capture = None;
        let mut counters = Counters::default();
        let result = self.drive(&events, &mut capture, &mut counters).await;

        let capture_path = match capture {
            Some(sink) => Some(self.close_capture(sink).await),
            None => None,
        };

        self.set_state(ListenerState::Terminated);
        Metrics::listener_stopped(&exchange);

        match result {
            Ok(unsubscribe) => {
                Metrics::listener_terminated(&exchange, unsubscribe.as_str());
                info!(
                    packets = counters.packets_received,
                    events = counters.events_emitted,
                    %unsubscribe,
                    "Listener terminated"
                );
                Ok(ListenerSummary {
                    exchange,
                    symbol: self.symbol,
                    channel: self.channel,
                    packets_received: counters.packets_received,
                    events_emitted: counters.events_emitted,
                    unsubscribe,
                    capture_path,
                })
            }
            Err(e) => {
                Metrics::listener_terminated(&exchange, "error");
                error!(error = %e, packets = counters.packets_received, "Listener failed");
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        events: &mpsc::Sender<NormalizedEvent>,
        capture: &mut Option<CaptureSink>,
        counters: &mut Counters,
    ) -> FeedResult<UnsubscribeOutcome> {
        let exchange = self.protocol.exchange();

        self.set_state(ListenerState::Connecting);
        let started = Instant::now();
        let connect = self
            .manager
            .connect(&self.endpoint, self.protocol.connect_hook());
        let mut connection = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!(endpoint = %self.endpoint, "Cancelled while connecting");
                return Ok(UnsubscribeOutcome::NotRequired);
            }
            connected = connect => connected?,
        };
        Metrics::connect_latency(exchange, started.elapsed().as_secs_f64() * 1_000.0);

        self.set_state(ListenerState::Subscribing);
        if self.config.capture.enabled && capture.is_none() {
            let session = CaptureSession::new(exchange, self.symbol.clone());
            *capture = Some(RawCapture::open(&self.config.capture, session));
        }

        let request = match self
            .protocol
            .build_subscribe_request(&self.symbol, self.channel.as_deref())
        {
            Ok(request) => request,
            Err(e) => {
                close_quietly(&mut connection).await;
                return Err(e);
            }
        };
        connection.send_text(request.message).await?;
        let info = request.info;
        info!(channel = %info.channel, "Subscribed");

        self.set_state(ListenerState::Listening);
        let reason = 'receive: loop {
            if self.cancel.is_cancelled() {
                break 'receive StopReason::Cancelled;
            }

            let packet = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break 'receive StopReason::Cancelled,
                _ = events.closed() => break 'receive StopReason::ReceiverDropped,
                received = connection.recv() => received?,
            };
            self.record_packet(&packet, capture.as_ref(), counters);

            let decoded = match self.protocol.decode_all(&packet, &self.symbol) {
                Ok(decoded) => decoded,
                Err(e) => {
                    Metrics::decode_error(exchange);
                    error!(error = %e, packet = %packet.as_text(), "Failed to decode packet");
                    close_quietly(&mut connection).await;
                    return Err(e);
                }
            };

            for event in decoded {
                // A full channel must not hold off cancellation.
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'receive StopReason::Cancelled,
                    permit = events.reserve() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'receive StopReason::ReceiverDropped,
                    },
                };
                let kind = event.kind();
                permit.send(event);
                counters.events_emitted += 1;
                Metrics::event_emitted(exchange, kind);
            }
        };
        debug!(?reason, "Leaving receive loop");

        self.set_state(ListenerState::Unsubscribing);
        let outcome = self
            .unsubscribe(&mut connection, &info, capture.as_ref(), counters)
            .await;
        close_quietly(&mut connection).await;
        Ok(outcome)
    }

    /// Send the unsubscribe request and wait for its confirmation.
    ///
    /// Not cancellable. Packets received meanwhile are captured but not
    /// decoded.
    async fn unsubscribe(
        &self,
        connection: &mut Connection,
        info: &ChannelInfo,
        capture: Option<&CaptureSink>,
        counters: &mut Counters,
    ) -> UnsubscribeOutcome {
        let Some(request) = self.protocol.build_unsubscribe_request(info) else {
            debug!("Protocol has no unsubscribe request");
            return UnsubscribeOutcome::NotRequired;
        };

        if let Err(e) = connection.send_text(request).await {
            warn!(error = %e, "Failed to send unsubscribe request");
            return UnsubscribeOutcome::SendFailed;
        }

        let timeout = self.config.unsubscribe_timeout();
        let confirmation = async {
            loop {
                match connection.recv().await {
                    Ok(packet) => {
                        self.record_packet(&packet, capture, counters);
                        if self.protocol.is_unsubscribe_confirmation(&packet, info) {
                            return UnsubscribeOutcome::Confirmed;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Connection lost while awaiting unsubscribe confirmation");
                        return UnsubscribeOutcome::ConnectionLost;
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, confirmation).await {
            Ok(outcome) => {
                debug!(%outcome, "Unsubscribe finished");
                outcome
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.unsubscribe_timeout_ms,
                    channel = %info.channel,
                    "UnsubscribeTimeout: no confirmation, subscription may linger"
                );
                UnsubscribeOutcome::TimedOut
            }
        }
    }

    fn record_packet(&self, packet: &RawPacket, capture: Option<&CaptureSink>, counters: &mut Counters) {
        counters.packets_received += 1;
        Metrics::packet_received(self.protocol.exchange(), self.symbol.as_str());
        if let Some(sink) = capture {
            sink.accept(packet.clone());
        }
    }

    async fn close_capture(&self, sink: CaptureSink) -> PathBuf {
        let path = sink.path().to_path_buf();
        let stats = sink.stats();
        if let Err(e) = sink.close().await {
            error!(error = %e, path = %path.display(), "Failed to close capture sink");
        }
        Metrics::capture_closed(
            self.protocol.exchange(),
            stats.windows_written(),
            stats.windows_dropped(),
            stats.packets_written(),
        );
        path
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
        Metrics::listener_state_set(self.protocol.exchange(), self.symbol.as_str(), state.as_str());
        debug!(%state, "Listener state");
    }
}

impl fmt::Debug for FeedListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedListener")
            .field("exchange", &self.protocol.exchange())
            .field("symbol", &self.symbol)
            .field("channel", &self.channel)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

async fn close_quietly(connection: &mut Connection) {
    if let Err(e) = connection.close().await {
        debug!(error = %e, "Close failed");
    }
}

/// Handle to a spawned listener.
#[derive(Debug)]
pub struct ListenHandle {
    symbol: Symbol,
    cancel: CancellationToken,
    state: watch::Receiver<ListenerState>,
    task: JoinHandle<FeedResult<ListenerSummary>>,
}

impl ListenHandle {
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Request a stop. The listener unsubscribes before terminating.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Wait until the listener reaches `target` or terminates, and return the
    /// state observed.
    pub async fn wait_for_state(&mut self, target: ListenerState) -> ListenerState {
        let observed = self
            .state
            .wait_for(|state| *state == target || *state == ListenerState::Terminated)
            .await
            .map(|state| *state);
        observed.unwrap_or_else(|_| *self.state.borrow())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the listener to finish.
    pub async fn join(self) -> FeedResult<ListenerSummary> {
        self.task
            .await
            .map_err(|e| FeedError::TaskFailed(e.to_string()))?
    }

    /// Cancel and wait.
    pub async fn stop(self) -> FeedResult<ListenerSummary> {
        self.cancel();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kraken::KrakenProtocol;

    #[test]
    fn test_config_defaults() {
        let config: ListenerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.unsubscribe_timeout_ms, 5_000);
        assert_eq!(config.event_buffer, 1_024);
        assert!(!config.capture.enabled);
        assert_eq!(config.unsubscribe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_new_listener_is_idle_with_default_endpoint() {
        let listener = FeedListener::new(
            Arc::new(KrakenProtocol::new()),
            ListenerConfig::default(),
            Symbol::new("ethusd").unwrap(),
            None,
            None,
        );
        assert_eq!(listener.state(), ListenerState::Idle);
        assert_eq!(listener.endpoint(), "wss://ws.kraken.com/v2");
        assert_eq!(listener.symbol().as_str(), "ETHUSD");
    }

    #[tokio::test]
    async fn test_cancel_before_connect() {
        let listener = FeedListener::new(
            Arc::new(KrakenProtocol::new()),
            ListenerConfig::default(),
            Symbol::new("ETHUSD").unwrap(),
            None,
            // Never contacted: the token is already cancelled.
            Some("ws://127.0.0.1:1".to_string()),
        );
        listener.cancellation_token().cancel();

        let (tx, _rx) = mpsc::channel(1);
        let summary = listener.run(tx).await.unwrap();
        assert_eq!(summary.unsubscribe, UnsubscribeOutcome::NotRequired);
        assert_eq!(summary.packets_received, 0);
        assert_eq!(summary.capture_path, None);
    }

    #[tokio::test]
    async fn test_connect_failure_terminates_with_connection_error() {
        let (handle, _rx) = FeedListener::new(
            Arc::new(KrakenProtocol::new()),
            ListenerConfig::default(),
            Symbol::new("ETHUSD").unwrap(),
            None,
            Some("ws://127.0.0.1:1".to_string()),
        )
        .spawn();

        let result = handle.join().await;
        assert!(matches!(result, Err(FeedError::Connection(_))));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(UnsubscribeOutcome::TimedOut.to_string(), "timed_out");
        assert_eq!(ListenerState::Unsubscribing.to_string(), "unsubscribing");
    }
}
