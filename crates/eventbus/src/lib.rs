//! Client SDK for the eventbus publish/subscribe message bus.
//!
//! - [`Producer`] publishes over persistent node connections, rotating
//!   round-robin with failover.
//! - [`HttpProducer`] and [`Client`] publish over the node HTTP API, trying
//!   nodes in order.
//! - [`Consumer`] subscribes to a topic/channel, sizing its in-flight window
//!   from seeker discovery, and exposes deliveries as a [`MessageStream`].
//!
//! The wire client is pluggable: backends implement [`Connector`] /
//! [`Connection`] for publishing and [`Subscriber`] / [`Subscription`] for
//! consuming.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod config;
mod consumer;
mod error;
mod handler;
mod http;
mod http_producer;
mod message;
mod nodes;
mod planner;
mod pool;
mod producer;

/// Publish connections to bus nodes.
pub mod connection;

/// Injectable logging.
pub mod log;

/// Subscriptions that push deliveries.
pub mod subscription;

pub use client::Client;
pub use config::{
    Config, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_SEEKER_POLL_INTERVAL, default_client_id,
};
pub use connection::{Connection, ConnectionError, ConnectionOptions, Connector};
pub use consumer::{Consumer, EPHEMERAL_SUFFIX};
pub use error::{BoxError, ConfigError, DiscoveryError, Error, HttpError, Result};
pub use handler::{Handler, MessageStream};
pub use http::HttpPoster;
pub use http_producer::HttpProducer;
pub use log::{LogHandle, LogLevel, Logger, NoopLogger, TracingLogger};
pub use message::{Delivery, InvalidMessageId, MESSAGE_ID_LENGTH, Message, MessageId, now_nanos};
pub use nodes::{HttpNodeResolver, NodeInfo, NodeResolver, NodesInfo};
pub use planner::{ASSUMED_CLUSTER_SIZE, ConcurrencyPlanner};
pub use pool::DeliveryPool;
pub use producer::Producer;
pub use subscription::{Endpoints, Subscriber, Subscription, SubscriptionError, SubscriptionOptions};
