//! Request transports.
//!
//! A `Requester` performs one GET and returns the parsed JSON body. Which
//! transport is used is decided once, at construction, from a
//! [`RequesterConfig`].

use crate::error::{RestError, RestResult};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Query parameters or headers as ordered name/value pairs.
pub type Pairs = [(String, String)];

/// GET transport returning a parsed JSON body.
pub trait Requester: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        params: &'a Pairs,
        headers: &'a Pairs,
    ) -> BoxFuture<'a, RestResult<serde_json::Value>>;
}

/// Transport selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequesterConfig {
    /// Live HTTP via reqwest.
    Http {
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        user_agent: Option<String>,
    },
    /// Canned responses keyed by URL path, for offline runs.
    Fixture {
        #[serde(default)]
        responses: HashMap<String, serde_json::Value>,
    },
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self::Http {
            timeout_ms: default_timeout_ms(),
            user_agent: None,
        }
    }
}

/// Build the transport described by `config`.
pub fn build_requester(config: &RequesterConfig) -> RestResult<Arc<dyn Requester>> {
    match config {
        RequesterConfig::Http {
            timeout_ms,
            user_agent,
        } => Ok(Arc::new(HttpRequester::new(
            Duration::from_millis(*timeout_ms),
            user_agent.as_deref(),
        )?)),
        RequesterConfig::Fixture { responses } => {
            Ok(Arc::new(FixtureRequester::new(responses.clone())))
        }
    }
}

/// reqwest-backed transport.
pub struct HttpRequester {
    client: Client,
}

impl HttpRequester {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> RestResult<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder
            .build()
            .map_err(|e| RestError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Requester for HttpRequester {
    fn get<'a>(
        &'a self,
        url: &'a str,
        params: &'a Pairs,
        headers: &'a Pairs,
    ) -> BoxFuture<'a, RestResult<serde_json::Value>> {
        Box::pin(async move {
            debug!(url, ?params, "GET");

            let mut request = self.client.get(url).query(params);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request
                .send()
                .await
                .map_err(|e| RestError::HttpClient(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RestError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json()
                .await
                .map_err(|e| RestError::HttpClient(format!("Failed to parse response: {e}")))
        })
    }
}

/// Serves canned responses keyed by URL path (query string ignored).
#[derive(Debug, Default)]
pub struct FixtureRequester {
    responses: HashMap<String, serde_json::Value>,
    requests: Mutex<Vec<String>>,
}

impl FixtureRequester {
    pub fn new(responses: HashMap<String, serde_json::Value>) -> Self {
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, path: impl Into<String>, body: serde_json::Value) -> Self {
        self.responses.insert(path.into(), body);
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn path_of(url: &str) -> &str {
        let without_query = url.split('?').next().unwrap_or(url);
        match without_query.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |idx| &rest[idx..]),
            None => without_query,
        }
    }
}

impl Requester for FixtureRequester {
    fn get<'a>(
        &'a self,
        url: &'a str,
        _params: &'a Pairs,
        _headers: &'a Pairs,
    ) -> BoxFuture<'a, RestResult<serde_json::Value>> {
        Box::pin(async move {
            self.requests.lock().push(url.to_string());
            self.responses
                .get(Self::path_of(url))
                .cloned()
                .ok_or_else(|| RestError::MissingFixture(url.to_string()))
        })
    }
}
