//! REST request collaborators for numismatic feeds.
//!
//! - `Requester`: the `get(url, params, headers) -> JSON` transport contract
//! - `RequesterConfig` + `build_requester`: pick a transport by configuration
//! - `RestApi`: the list / info / prices capability consumed by `Feed`
//! - `CryptoCompareRest`: a concrete `RestApi`

pub mod client;
pub mod cryptocompare;
pub mod error;
pub mod requester;

pub use client::{AssetList, InfoMap, PriceMap, RestApi, RestClient};
pub use cryptocompare::CryptoCompareRest;
pub use error::{RestError, RestResult};
pub use requester::{build_requester, FixtureRequester, HttpRequester, Requester, RequesterConfig};
