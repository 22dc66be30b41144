//! Feed facade.
//!
//! A `Feed` bundles up to two capabilities, a REST client and a websocket
//! client, and forwards each operation to the one that provides it. REST
//! results and errors are returned unchanged.

use crate::client::WebsocketClient;
use crate::error::{FeedError, FeedResult};
use crate::listener::ListenHandle;
use numis_core::NormalizedEvent;
use numis_rest::{AssetList, InfoMap, PriceMap, RestApi, RestResult};
use numis_telemetry::Metrics;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone, Default)]
pub struct Feed {
    rest: Option<Arc<dyn RestApi>>,
    websocket: Option<WebsocketClient>,
}

impl Feed {
    pub fn new(rest: Option<Arc<dyn RestApi>>, websocket: Option<WebsocketClient>) -> Self {
        Self { rest, websocket }
    }

    pub fn with_rest(mut self, rest: Arc<dyn RestApi>) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn with_websocket(mut self, websocket: WebsocketClient) -> Self {
        self.websocket = Some(websocket);
        self
    }

    pub fn rest(&self) -> Option<&Arc<dyn RestApi>> {
        self.rest.as_ref()
    }

    pub fn websocket(&self) -> Option<&WebsocketClient> {
        self.websocket.as_ref()
    }

    fn rest_api(&self) -> FeedResult<&dyn RestApi> {
        self.rest
            .as_deref()
            .ok_or(FeedError::CapabilityMissing("rest"))
    }

    fn websocket_client(&self) -> FeedResult<&WebsocketClient> {
        self.websocket
            .as_ref()
            .ok_or(FeedError::CapabilityMissing("websocket"))
    }

    pub async fn get_list(&self) -> FeedResult<AssetList> {
        let rest = self.rest_api()?;
        let result = rest.get_list().await;
        record(rest, "get_list", &result);
        Ok(result?)
    }

    pub async fn get_info(&self, assets: &[String]) -> FeedResult<InfoMap> {
        let rest = self.rest_api()?;
        let result = rest.get_info(assets).await;
        record(rest, "get_info", &result);
        Ok(result?)
    }

    pub async fn get_prices(&self, assets: &[String], currencies: &[String]) -> FeedResult<PriceMap> {
        let rest = self.rest_api()?;
        let result = rest.get_prices(assets, currencies).await;
        record(rest, "get_prices", &result);
        Ok(result?)
    }

    /// Start a listener; see [`WebsocketClient::listen`].
    pub fn listen(
        &self,
        symbol: &str,
        channel: Option<&str>,
        endpoint: Option<&str>,
    ) -> FeedResult<(ListenHandle, mpsc::Receiver<NormalizedEvent>)> {
        self.websocket_client()?.listen(symbol, channel, endpoint)
    }
}

fn record<T>(rest: &dyn RestApi, operation: &str, result: &RestResult<T>) {
    Metrics::rest_request(rest.name(), operation, result.is_ok());
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("rest", &self.rest.as_ref().map(|r| r.name()))
            .field("websocket", &self.websocket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use numis_rest::RestError;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed prices, or a network error when `fail` is set.
    #[derive(Default)]
    struct MockRestApi {
        fail: bool,
        calls: AtomicUsize,
    }

    impl RestApi for MockRestApi {
        fn name(&self) -> &str {
            "mock"
        }

        fn get_list(&self) -> BoxFuture<'_, RestResult<AssetList>> {
            Box::pin(async { Ok(vec!["BTC".to_string(), "ETH".to_string()]) })
        }

        fn get_info<'a>(&'a self, assets: &'a [String]) -> BoxFuture<'a, RestResult<InfoMap>> {
            Box::pin(async move {
                Ok(assets
                    .iter()
                    .map(|a| (a.clone(), serde_json::json!({"Symbol": a})))
                    .collect())
            })
        }

        fn get_prices<'a>(
            &'a self,
            _assets: &'a [String],
            _currencies: &'a [String],
        ) -> BoxFuture<'a, RestResult<PriceMap>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    return Err(RestError::HttpClient("connection reset".to_string()));
                }
                Ok(HashMap::from([(
                    "BTC".to_string(),
                    HashMap::from([("USD".to_string(), dec!(50000))]),
                )]))
            })
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_prices_pass_through() {
        let mock = Arc::new(MockRestApi::default());
        let feed = Feed::default().with_rest(mock.clone());

        let prices = feed
            .get_prices(&strings(&["BTC"]), &strings(&["USD"]))
            .await
            .unwrap();

        let expected = HashMap::from([(
            "BTC".to_string(),
            HashMap::from([("USD".to_string(), dec!(50000))]),
        )]);
        assert_eq!(prices, expected);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_prices_error_unchanged() {
        let feed = Feed::default().with_rest(Arc::new(MockRestApi {
            fail: true,
            ..Default::default()
        }));

        match feed.get_prices(&strings(&["BTC"]), &strings(&["USD"])).await {
            Err(FeedError::Rest(RestError::HttpClient(message))) => {
                assert_eq!(message, "connection reset");
            }
            other => panic!("Expected the REST error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_list_and_info() {
        let feed = Feed::new(Some(Arc::new(MockRestApi::default())), None);
        assert_eq!(feed.get_list().await.unwrap(), strings(&["BTC", "ETH"]));

        let info = feed.get_info(&strings(&["ETH"])).await.unwrap();
        assert_eq!(info["ETH"]["Symbol"], "ETH");
    }

    #[tokio::test]
    async fn test_missing_capabilities() {
        let feed = Feed::default();
        assert!(matches!(
            feed.get_list().await,
            Err(FeedError::CapabilityMissing("rest"))
        ));
        assert!(matches!(
            feed.listen("BTC/USD", None, None),
            Err(FeedError::CapabilityMissing("websocket"))
        ));
    }
}
