//! Exchange feed listeners and the feed facade.
//!
//! - `SubscriptionProtocol`: per-exchange subscribe / unsubscribe / decode
//! - `FeedListener`: connect, subscribe, receive, capture, decode, unsubscribe
//! - `WebsocketClient`: spawns listeners for one protocol
//! - `Feed`: REST + websocket capabilities behind one API

pub mod client;
pub mod error;
pub mod feed;
pub mod kraken;
pub mod listener;
pub mod protocol;
pub mod registry;

pub use client::WebsocketClient;
pub use error::{FeedError, FeedResult};
pub use feed::Feed;
pub use kraken::KrakenProtocol;
pub use listener::{
    FeedListener, ListenHandle, ListenerConfig, ListenerState, ListenerSummary,
    UnsubscribeOutcome,
};
pub use protocol::{ChannelInfo, ChannelRequest, SubscriptionProtocol};
pub use registry::{protocol_from_name, rest_from_name, ProtocolKind, RestProviderKind};
