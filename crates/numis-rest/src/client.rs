//! REST client and the `RestApi` capability.

use crate::error::RestResult;
use crate::requester::{Pairs, Requester};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Asset identifiers known to a provider.
pub type AssetList = Vec<String>;

/// Provider-specific metadata per asset.
pub type InfoMap = HashMap<String, serde_json::Value>;

/// asset -> currency -> price.
pub type PriceMap = HashMap<String, HashMap<String, Decimal>>;

/// Request/response capability of a feed.
pub trait RestApi: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    fn get_list(&self) -> BoxFuture<'_, RestResult<AssetList>>;

    fn get_info<'a>(&'a self, assets: &'a [String]) -> BoxFuture<'a, RestResult<InfoMap>>;

    fn get_prices<'a>(
        &'a self,
        assets: &'a [String],
        currencies: &'a [String],
    ) -> BoxFuture<'a, RestResult<PriceMap>>;
}

/// Thin wrapper joining a base URL with request paths.
#[derive(Clone)]
pub struct RestClient {
    requester: Arc<dyn Requester>,
    base_url: String,
}

impl RestClient {
    pub fn new(requester: Arc<dyn Requester>, base_url: impl Into<String>) -> Self {
        Self {
            requester,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` relative to the base URL and return the decoded JSON.
    pub async fn make_request(
        &self,
        path: &str,
        params: &Pairs,
        headers: &Pairs,
    ) -> RestResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let body = self.requester.get(&url, params, headers).await?;
        debug!(url = %url, "REST response received");
        Ok(body)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
