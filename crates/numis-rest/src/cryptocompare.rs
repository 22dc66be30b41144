//! CryptoCompare REST API.

use crate::client::{AssetList, InfoMap, PriceMap, RestApi, RestClient};
use crate::error::{RestError, RestResult};
use crate::requester::Requester;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

const COIN_LIST_PATH: &str = "/data/all/coinlist";
const PRICE_MULTI_PATH: &str = "/data/pricemulti";

#[derive(Debug, Clone)]
pub struct CryptoCompareRest {
    client: RestClient,
    api_key: Option<String>,
}

impl CryptoCompareRest {
    pub fn new(requester: Arc<dyn Requester>) -> Self {
        Self::with_base_url(requester, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(requester: Arc<dyn Requester>, base_url: impl Into<String>) -> Self {
        Self {
            client: RestClient::new(requester, base_url),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.api_key
            .iter()
            .map(|key| ("authorization".to_string(), format!("Apikey {key}")))
            .collect()
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> RestResult<Value> {
        let body = self.client.make_request(path, params, &self.headers()).await?;
        check_response(body)
    }

    async fn coin_list(&self) -> RestResult<serde_json::Map<String, Value>> {
        let body = self.get(COIN_LIST_PATH, &[]).await?;
        match body.get("Data") {
            Some(Value::Object(data)) => Ok(data.clone()),
            _ => Err(RestError::UnexpectedResponse(
                "coinlist response has no Data object".to_string(),
            )),
        }
    }
}

/// CryptoCompare reports failures in-band with `"Response": "Error"`.
fn check_response(body: Value) -> RestResult<Value> {
    if body.get("Response").and_then(Value::as_str) == Some("Error") {
        let message = body
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        warn!(%message, "CryptoCompare returned an error response");
        return Err(RestError::UnexpectedResponse(message));
    }
    Ok(body)
}

fn join_upper(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect::<Vec<_>>()
        .join(",")
}

impl RestApi for CryptoCompareRest {
    fn name(&self) -> &str {
        "cryptocompare"
    }

    fn get_list(&self) -> BoxFuture<'_, RestResult<AssetList>> {
        Box::pin(async move {
            let data = self.coin_list().await?;
            let mut assets: AssetList = data.keys().cloned().collect();
            assets.sort();
            debug!(count = assets.len(), "Fetched asset list");
            Ok(assets)
        })
    }

    fn get_info<'a>(&'a self, assets: &'a [String]) -> BoxFuture<'a, RestResult<InfoMap>> {
        Box::pin(async move {
            let mut data = self.coin_list().await?;
            let info: InfoMap = assets
                .iter()
                .map(|asset| asset.trim().to_uppercase())
                .filter_map(|asset| data.remove(&asset).map(|entry| (asset, entry)))
                .collect();
            Ok(info)
        })
    }

    fn get_prices<'a>(
        &'a self,
        assets: &'a [String],
        currencies: &'a [String],
    ) -> BoxFuture<'a, RestResult<PriceMap>> {
        Box::pin(async move {
            let params = vec![
                ("fsyms".to_string(), join_upper(assets)),
                ("tsyms".to_string(), join_upper(currencies)),
            ];
            let body = self.get(PRICE_MULTI_PATH, &params).await?;
            let prices: PriceMap = serde_json::from_value(body)?;
            Ok(prices)
        })
    }
}
