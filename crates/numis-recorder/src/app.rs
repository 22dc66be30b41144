//! Recorder orchestration.
//!
//! - Builds a `Feed` from configuration (websocket protocol + optional REST)
//! - Logs reference prices once at startup when REST is configured
//! - Starts one listener per symbol and drains its event stream
//! - On shutdown, stops every listener and collects their summaries

use crate::config::RecorderConfig;
use crate::error::AppResult;
use numis_core::{NormalizedEvent, Symbol};
use numis_feed::{
    rest_from_name, Feed, FeedError, FeedResult, ListenerSummary, WebsocketClient,
};
use numis_rest::build_requester;
use numis_telemetry::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one recorder run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Listeners that stopped on request.
    pub summaries: Vec<ListenerSummary>,
    /// Listeners that terminated with an error.
    pub failures: Vec<(Symbol, String)>,
    /// Events drained from all listeners.
    pub events_consumed: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Recorder {
    config: RecorderConfig,
    feed: Feed,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> AppResult<Self> {
        let websocket = WebsocketClient::for_exchange(&config.exchange, config.listener_config())?;
        let mut feed = Feed::default().with_websocket(websocket);

        if let Some(rest) = &config.rest {
            let requester = build_requester(&rest.requester)?;
            feed = feed.with_rest(rest_from_name(&rest.provider, requester)?);
        }

        Ok(Self { config, feed })
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Run until `shutdown` is cancelled or every listener has terminated.
    pub async fn run(self, shutdown: CancellationToken) -> AppResult<RunReport> {
        info!(
            exchange = %self.config.exchange,
            symbols = ?self.config.symbols,
            channel = ?self.config.channel,
            capture = self.config.capture.enabled,
            "Starting recorder"
        );

        self.log_reference_prices().await;

        let events_consumed = Arc::new(AtomicU64::new(0));
        let mut listeners = JoinSet::new();
        let mut consumers = JoinSet::new();
        let mut tokens = Vec::with_capacity(self.config.symbols.len());

        for symbol in &self.config.symbols {
            let started = self.feed.listen(
                symbol,
                self.config.channel.as_deref(),
                self.config.endpoint.as_deref(),
            );
            let (handle, events) = match started {
                Ok(started) => started,
                Err(e) => {
                    tokens.iter().for_each(CancellationToken::cancel);
                    return Err(e.into());
                }
            };
            tokens.push(handle.cancellation_token());
            let symbol = handle.symbol().clone();
            listeners.spawn(async move { (symbol, handle.join().await) });
            consumers.spawn(consume_events(events, events_consumed.clone()));
        }

        let mut report = RunReport::default();
        let mut stopping = false;
        loop {
            tokio::select! {
                _ = shutdown.cancelled(), if !stopping => {
                    info!(listeners = tokens.len(), "Shutdown requested, stopping listeners");
                    tokens.iter().for_each(CancellationToken::cancel);
                    stopping = true;
                }
                joined = listeners.join_next() => match joined {
                    Some(Ok((symbol, result))) => record_result(&mut report, symbol, result),
                    Some(Err(e)) => error!(error = %e, "Listener join task failed"),
                    None => break,
                },
            }
        }

        while let Some(joined) = consumers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Event consumer task failed");
            }
        }
        report.events_consumed = events_consumed.load(Ordering::Relaxed);

        info!(
            stopped = report.summaries.len(),
            failed = report.failures.len(),
            events = report.events_consumed,
            "Recorder finished"
        );
        match Metrics::render() {
            Ok(metrics) => debug!(%metrics, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }

        Ok(report)
    }

    /// Query the REST provider for the configured assets. Failures are
    /// logged, not fatal.
    async fn log_reference_prices(&self) {
        let Some(rest) = &self.config.rest else {
            return;
        };
        if rest.assets.is_empty() {
            return;
        }

        match self.feed.get_prices(&rest.assets, &rest.currencies).await {
            Ok(prices) => {
                for (asset, quotes) in &prices {
                    for (currency, price) in quotes {
                        info!(%asset, %currency, %price, provider = %rest.provider, "Reference price");
                    }
                }
            }
            Err(e) => warn!(error = %e, provider = %rest.provider, "Reference price query failed"),
        }
    }
}

fn record_result(report: &mut RunReport, symbol: Symbol, result: FeedResult<ListenerSummary>) {
    match result {
        Ok(summary) => {
            info!(
                symbol = %summary.symbol,
                packets = summary.packets_received,
                events = summary.events_emitted,
                unsubscribe = %summary.unsubscribe,
                capture = ?summary.capture_path,
                "Listener stopped"
            );
            report.summaries.push(summary);
        }
        Err(e) => {
            error!(%symbol, error = %e, fatal = e.is_fatal(), "Listener failed");
            report.failures.push((symbol, e.to_string()));
        }
    }
}

async fn consume_events(mut events: mpsc::Receiver<NormalizedEvent>, counter: Arc<AtomicU64>) {
    while let Some(event) = events.recv().await {
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(
            kind = event.kind(),
            symbol = %event.symbol(),
            price = ?event.price(),
            "Event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn config(toml: &str) -> RecorderConfig {
        RecorderConfig::from_toml(toml).unwrap()
    }

    #[test]
    fn test_new_without_rest() {
        let recorder = Recorder::new(config(r#"symbols = ["ETHUSD"]"#)).unwrap();
        assert!(recorder.feed().rest().is_none());
        assert_eq!(recorder.feed().websocket().unwrap().exchange(), "kraken");
    }

    #[test]
    fn test_new_with_fixture_rest() {
        let recorder = Recorder::new(config(
            r#"
            symbols = ["ETHUSD"]
            [rest]
            provider = "cryptocompare"
            requester = { kind = "fixture" }
            "#,
        ))
        .unwrap();
        assert_eq!(recorder.feed().rest().unwrap().name(), "cryptocompare");
    }

    #[test]
    fn test_unknown_exchange() {
        let result = Recorder::new(config(
            r#"
            exchange = "mtgox"
            symbols = ["BTCUSD"]
            "#,
        ));
        assert!(matches!(
            result,
            Err(AppError::Feed(FeedError::UnknownExchange(_)))
        ));
    }

    #[test]
    fn test_record_result() {
        let mut report = RunReport::default();
        record_result(
            &mut report,
            Symbol::new("ETHUSD").unwrap(),
            Err(FeedError::decode("kraken", "bad frame")),
        );
        assert!(!report.is_success());
        assert_eq!(report.failures[0].0.as_str(), "ETHUSD");
        assert!(report.failures[0].1.contains("bad frame"));
    }
}
